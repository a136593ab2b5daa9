//! Translation between the two wire encodings and [`FeatureState`].
//!
//! Cluster scope reports `currentPerformanceAnalyzerClusterState`, an
//! integer whose bits follow [`FEATURES`]. Node scope reports one boolean
//! field per feature. Both carry `shardsPerCollection`.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::feature::{FEATURES, OTHERS};
use crate::state::FeatureState;

pub const CLUSTER_BITMASK_FIELD: &str = "currentPerformanceAnalyzerClusterState";

/// Decodes the cluster config response.
///
/// Bits outside the feature table are ignored.
pub fn decode_cluster(body: &Value) -> Result<FeatureState, DecodeError> {
    let body = body.as_object().ok_or(DecodeError::NotAnObject)?;
    let bitmask = field(body, CLUSTER_BITMASK_FIELD)?
        .as_u64()
        .ok_or_else(|| wrong_type(CLUSTER_BITMASK_FIELD, "a non-negative integer"))?;

    let features: Map<String, Value> = FEATURES
        .iter()
        .map(|spec| {
            let enabled = bitmask & spec.feature.mask() != 0;
            (spec.key.to_string(), Value::Bool(enabled))
        })
        .collect();
    FeatureState::from_maps(&features, &decode_others(body)?)
}

/// Decodes the node config response.
pub fn decode_node(body: &Value) -> Result<FeatureState, DecodeError> {
    let body = body.as_object().ok_or(DecodeError::NotAnObject)?;
    let mut features = Map::new();
    for spec in FEATURES.iter() {
        features.insert(spec.key.to_string(), field(body, spec.node_field)?.clone());
    }
    FeatureState::from_maps(&features, &decode_others(body)?).map_err(|err| match err {
        // Report the field name the node actually sent.
        DecodeError::WrongType { field, expected } => DecodeError::WrongType {
            field: node_field_for(&field).unwrap_or(field),
            expected,
        },
        other => other,
    })
}

/// Encodes the features of `state` as the cluster bitmask.
pub fn cluster_bitmask(state: &FeatureState) -> u64 {
    state
        .enabled()
        .fold(0, |bitmask, feature| bitmask | feature.mask())
}

fn decode_others(body: &Map<String, Value>) -> Result<Map<String, Value>, DecodeError> {
    let mut others = Map::new();
    for spec in OTHERS.iter() {
        let value = field(body, spec.wire_field)?;
        if value.as_i64().is_none() {
            return Err(wrong_type(spec.wire_field, "an integer"));
        }
        others.insert(spec.key.to_string(), value.clone());
    }
    Ok(others)
}

fn field<'a>(body: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, DecodeError> {
    body.get(name).ok_or(DecodeError::MissingField(name))
}

fn wrong_type(field: &str, expected: &'static str) -> DecodeError {
    DecodeError::WrongType {
        field: field.to_string(),
        expected,
    }
}

fn node_field_for(key: &str) -> Option<String> {
    FEATURES
        .iter()
        .find(|spec| spec.key == key)
        .map(|spec| spec.node_field.to_string())
}
