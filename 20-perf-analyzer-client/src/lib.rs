//! Command-line client for the performance analyzer admin API of an
//! Elasticsearch-compatible cluster.
//!
//! The analyzer exposes the same set of feature flags in two shapes: the
//! cluster-wide endpoint reports them as one integer bitmask, while the
//! node endpoint reports one JSON boolean per feature. This crate decodes
//! both into a single [`state::FeatureState`] so callers can compare them.
//!
//! - [`feature`] holds the table of known features: bit position, node JSON
//!   field and URL path segment for each one.
//! - [`state`] is the validated feature-state value type.
//! - [`codec`] translates the two wire encodings to and from that type.
//! - [`config`] carries the host address and the expected cluster topology.
//! - [`host`] issues the HTTP calls.
//! - [`settle`] covers the delay between a write and the read that should
//!   observe it.
//! - [`cli`] parses the command-line interface used by the binary.
//!
//! Every call is a single awaited request. Nothing is retried and nothing
//! runs concurrently.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod feature;
pub mod host;
pub mod settle;
pub mod state;

pub use error::{ClientError, ConfigMismatch, DecodeError, Result};
