//! Known features and their wire representations.
//!
//! The remote plugin encodes the same features twice: as bits of the
//! cluster bitmask and as booleans in the node config response. Both
//! encodings, plus the URL segment used to toggle each feature, live in
//! [`FEATURES`] so they cannot drift apart. Bit positions are part of the
//! remote contract and must never be reassigned.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    /// Performance analyzer itself. Every other feature depends on it.
    Pa,
    /// Root cause analysis.
    Rca,
    Logging,
    /// Batch metrics collection.
    Batch,
}

/// One row of the feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub feature: Feature,
    pub key: &'static str,
    pub bit: u32,
    pub node_field: &'static str,
    /// Path segment for the toggle endpoints. The primary feature is served
    /// from the bare config path and has none.
    pub path_segment: Option<&'static str>,
}

/// Rows are ordered like the [`Feature`] variants.
pub static FEATURES: [FeatureSpec; 4] = [
    FeatureSpec {
        feature: Feature::Pa,
        key: "pa",
        bit: 0,
        node_field: "performanceAnalyzerEnabled",
        path_segment: None,
    },
    FeatureSpec {
        feature: Feature::Rca,
        key: "rca",
        bit: 1,
        node_field: "rcaEnabled",
        path_segment: Some("rca"),
    },
    FeatureSpec {
        feature: Feature::Logging,
        key: "logging",
        bit: 2,
        node_field: "loggingEnabled",
        path_segment: Some("logging"),
    },
    FeatureSpec {
        feature: Feature::Batch,
        key: "batch",
        bit: 3,
        node_field: "batchMetricsEnabled",
        path_segment: Some("batch"),
    },
];

/// Non-boolean attributes reported next to the feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Other {
    ShardsPerCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherSpec {
    pub other: Other,
    pub key: &'static str,
    /// Field name in both the cluster and the node responses.
    pub wire_field: &'static str,
}

pub static OTHERS: [OtherSpec; 1] = [OtherSpec {
    other: Other::ShardsPerCollection,
    key: "shards_per_collection",
    wire_field: "shardsPerCollection",
}];

impl Feature {
    pub fn all() -> impl Iterator<Item = Feature> {
        FEATURES.iter().map(|spec| spec.feature)
    }

    pub fn spec(self) -> &'static FeatureSpec {
        &FEATURES[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn mask(self) -> u64 {
        1 << self.spec().bit
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Feature {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FEATURES
            .iter()
            .find(|spec| spec.key == s)
            .map(|spec| spec.feature)
            .ok_or_else(|| ClientError::UnknownFeature(s.to_string()))
    }
}

impl Other {
    pub fn all() -> impl Iterator<Item = Other> {
        OTHERS.iter().map(|spec| spec.other)
    }

    pub fn spec(self) -> &'static OtherSpec {
        &OTHERS[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn from_key(key: &str) -> Option<Other> {
        OTHERS
            .iter()
            .find(|spec| spec.key == key)
            .map(|spec| spec.other)
    }
}
