//! Error types for the performance analyzer client.

use std::time::Duration;

use thiserror::Error;

use crate::state::FeatureState;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Top-level error returned by every client operation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cluster config mismatch: {0}")]
    ConfigMismatch(#[from] ConfigMismatch),

    #[error("state did not converge within {waited:?}, last observed {last}")]
    NotConverged { waited: Duration, last: FeatureState },
}

impl ClientError {
    /// HTTP status of a rejected request, if the remote answered at all.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ClientError::Http(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Http(err) if err.is_timeout())
    }
}

/// A response body that does not have the shape we expect.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("invalid {kind} key set: expected {expected:?}, got {actual:?}")]
    KeySet {
        kind: &'static str,
        expected: Vec<&'static str>,
        actual: Vec<String>,
    },
}

/// Which cluster verification check failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigMismatch {
    #[error("version mismatch: expected {expected}, cluster reports {actual}")]
    Version { expected: String, actual: String },

    #[error("unexpected node '{0}' answered the root request")]
    UnexpectedNode(String),

    #[error("node '{0}' missing from _cat/nodes")]
    MissingNode(String),

    #[error("performance analyzer plugin missing on node '{0}'")]
    MissingPlugin(String),
}
