//! The validated on/off state of every known feature.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::{ClientError, DecodeError};
use crate::feature::{Feature, Other, FEATURES, OTHERS};

/// Feature flags plus the non-boolean attributes reported with them.
///
/// A `FeatureState` always holds exactly one entry per known feature and per
/// known attribute. Equality compares values, so two states decoded from the
/// cluster bitmask and from the node booleans can be compared directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureState {
    features: BTreeMap<Feature, bool>,
    others: BTreeMap<Other, i64>,
}

/// A single value held by a [`FeatureState`], addressed by its string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateValue {
    Flag(bool),
    Count(i64),
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Flag(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Count(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Flag(value) => write!(f, "{value}"),
            StateValue::Count(value) => write!(f, "{value}"),
        }
    }
}

impl Default for FeatureState {
    /// Baseline state: every feature off, zero shards per collection.
    fn default() -> Self {
        Self {
            features: Feature::all().map(|feature| (feature, false)).collect(),
            others: Other::all().map(|other| (other, 0)).collect(),
        }
    }
}

impl FeatureState {
    /// Builds a state from string-keyed JSON maps.
    ///
    /// Both key sets must match the known keys exactly, features must be
    /// booleans and attributes must be integers. This is the one constructor
    /// every decode path goes through.
    pub fn from_maps(
        features: &Map<String, Value>,
        others: &Map<String, Value>,
    ) -> Result<Self, DecodeError> {
        check_key_set("feature", FEATURES.iter().map(|s| s.key), features)?;
        check_key_set("attribute", OTHERS.iter().map(|s| s.key), others)?;

        let mut state = Self::default();
        for spec in FEATURES.iter() {
            let value = features[spec.key]
                .as_bool()
                .ok_or_else(|| DecodeError::WrongType {
                    field: spec.key.to_string(),
                    expected: "a boolean",
                })?;
            state.features.insert(spec.feature, value);
        }
        for spec in OTHERS.iter() {
            let value = others[spec.key]
                .as_i64()
                .ok_or_else(|| DecodeError::WrongType {
                    field: spec.key.to_string(),
                    expected: "an integer",
                })?;
            state.others.insert(spec.other, value);
        }
        Ok(state)
    }

    pub fn feature(&self, feature: Feature) -> bool {
        self.features[&feature]
    }

    pub fn set_feature(&mut self, feature: Feature, enabled: bool) {
        self.features.insert(feature, enabled);
    }

    /// Returns a copy with one feature changed.
    pub fn with(mut self, feature: Feature, enabled: bool) -> Self {
        self.set_feature(feature, enabled);
        self
    }

    pub fn shards_per_collection(&self) -> i64 {
        self.others[&Other::ShardsPerCollection]
    }

    pub fn set_shards_per_collection(&mut self, shards: i64) {
        self.others.insert(Other::ShardsPerCollection, shards);
    }

    /// Looks up a feature or attribute by its key.
    pub fn get(&self, key: &str) -> Option<StateValue> {
        if let Ok(feature) = key.parse::<Feature>() {
            return Some(StateValue::Flag(self.feature(feature)));
        }
        Other::from_key(key).map(|other| StateValue::Count(self.others[&other]))
    }

    /// Sets a feature or attribute by its key. The value type must match.
    pub fn set(&mut self, key: &str, value: impl Into<StateValue>) -> Result<(), ClientError> {
        let value = value.into();
        if let Ok(feature) = key.parse::<Feature>() {
            let StateValue::Flag(enabled) = value else {
                return Err(wrong_type(key, "a boolean"));
            };
            self.set_feature(feature, enabled);
            return Ok(());
        }
        let Some(other) = Other::from_key(key) else {
            return Err(ClientError::UnknownFeature(key.to_string()));
        };
        let StateValue::Count(count) = value else {
            return Err(wrong_type(key, "an integer"));
        };
        self.others.insert(other, count);
        Ok(())
    }

    /// Features that are switched on, in table order.
    pub fn enabled(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::all().filter(|feature| self.feature(*feature))
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ClientError {
    DecodeError::WrongType {
        field: key.to_string(),
        expected,
    }
    .into()
}

fn check_key_set(
    kind: &'static str,
    known: impl Iterator<Item = &'static str>,
    actual: &Map<String, Value>,
) -> Result<(), DecodeError> {
    let mut expected: Vec<&'static str> = known.collect();
    expected.sort_unstable();
    let mut keys: Vec<String> = actual.keys().cloned().collect();
    keys.sort_unstable();
    if keys.iter().map(String::as_str).ne(expected.iter().copied()) {
        return Err(DecodeError::KeySet {
            kind,
            expected,
            actual: keys,
        });
    }
    Ok(())
}

impl Serialize for FeatureState {
    /// Flat object: features in table order, then the attributes.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURES.len() + OTHERS.len()))?;
        for spec in FEATURES.iter() {
            map.serialize_entry(spec.key, &self.features[&spec.feature])?;
        }
        for spec in OTHERS.iter() {
            map.serialize_entry(spec.key, &self.others[&spec.other])?;
        }
        map.end()
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn baseline_features() -> Map<String, Value> {
        object(json!({"pa": false, "rca": false, "logging": false, "batch": false}))
    }

    fn baseline_others() -> Map<String, Value> {
        object(json!({"shards_per_collection": 0}))
    }

    fn hash_of(state: &FeatureState) -> u64 {
        let mut hasher = DefaultHasher::new();
        state.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn default_is_the_baseline() {
        let state = FeatureState::from_maps(&baseline_features(), &baseline_others())
            .expect("baseline maps are valid");
        assert_eq!(state, FeatureState::default());
        assert_eq!(state.enabled().count(), 0);
        assert_eq!(state.shards_per_collection(), 0);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let forward = FeatureState::from_maps(
            &object(json!({"pa": true, "rca": false, "logging": true, "batch": false})),
            &object(json!({"shards_per_collection": 3})),
        )
        .unwrap();
        let reversed = FeatureState::from_maps(
            &object(json!({"batch": false, "logging": true, "rca": false, "pa": true})),
            &object(json!({"shards_per_collection": 3})),
        )
        .unwrap();

        assert_eq!(forward, forward.clone());
        assert_eq!(forward, reversed);
        assert_eq!(reversed, forward);
        assert_eq!(hash_of(&forward), hash_of(&reversed));
        assert_ne!(forward, FeatureState::default());
    }

    #[test]
    fn added_feature_key_is_rejected() {
        let mut features = baseline_features();
        features.insert("extra".into(), json!(false));
        let err = FeatureState::from_maps(&features, &baseline_others()).unwrap_err();
        assert!(matches!(err, DecodeError::KeySet { kind: "feature", .. }));
    }

    #[test]
    fn omitted_feature_key_is_rejected() {
        let mut features = baseline_features();
        features.remove("batch");
        let err = FeatureState::from_maps(&features, &baseline_others()).unwrap_err();
        assert!(matches!(err, DecodeError::KeySet { kind: "feature", .. }));
    }

    #[test]
    fn renamed_feature_key_is_rejected() {
        let mut features = baseline_features();
        features.remove("batch");
        features.insert("batchMetricsEnabled".into(), json!(false));
        let err = FeatureState::from_maps(&features, &baseline_others()).unwrap_err();
        match err {
            DecodeError::KeySet { kind, actual, .. } => {
                assert_eq!(kind, "feature");
                assert!(actual.iter().any(|key| key == "batchMetricsEnabled"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn renamed_attribute_key_is_rejected() {
        let others = object(json!({"shardsPerCollection": 0}));
        let err = FeatureState::from_maps(&baseline_features(), &others).unwrap_err();
        assert!(matches!(err, DecodeError::KeySet { kind: "attribute", .. }));
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let mut features = baseline_features();
        features.insert("rca".into(), json!(1));
        let err = FeatureState::from_maps(&features, &baseline_others()).unwrap_err();
        assert!(matches!(err, DecodeError::WrongType { ref field, .. } if field == "rca"));

        let others = object(json!({"shards_per_collection": "0"}));
        let err = FeatureState::from_maps(&baseline_features(), &others).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::WrongType { ref field, .. } if field == "shards_per_collection"
        ));
    }

    #[test]
    fn keyed_access() {
        let mut state = FeatureState::default();
        state.set("pa", true).unwrap();
        state.set("shards_per_collection", 5i64).unwrap();

        assert_eq!(state.get("pa"), Some(StateValue::Flag(true)));
        assert_eq!(state.get("shards_per_collection"), Some(StateValue::Count(5)));
        assert_eq!(state.get("nope"), None);
        let mut expected = FeatureState::default().with(Feature::Pa, true);
        expected.set_shards_per_collection(5);
        assert_eq!(state, expected);

        assert!(matches!(
            state.set("nope", true),
            Err(ClientError::UnknownFeature(_))
        ));
        assert!(matches!(
            state.set("pa", 1i64),
            Err(ClientError::Decode(DecodeError::WrongType { .. }))
        ));
        assert!(matches!(
            state.set("shards_per_collection", false),
            Err(ClientError::Decode(DecodeError::WrongType { .. }))
        ));
    }

    #[test]
    fn renders_as_flat_json() {
        let state = FeatureState::default().with(Feature::Rca, true);
        assert_eq!(
            state.to_string(),
            r#"{"pa":false,"rca":true,"logging":false,"batch":false,"shards_per_collection":0}"#
        );
    }
}
