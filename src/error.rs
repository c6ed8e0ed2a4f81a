//! Error types for scenario decoding and runner execution.
//!
//! Decode-time problems (bad frequency strings, missing fields, unknown
//! handler names) are reported before any runner starts. Client failures
//! surface while a runner executes and only fail that runner.

use std::path::PathBuf;
use thiserror::Error;

/// A frequency string could not be turned into an interval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrequencyError {
    /// The count before `per` is missing, not a number, or zero
    #[error("could not parse frequency \"{0}\" or frequency of 0")]
    InvalidCount(String),

    /// The unit after `per` is neither `minute` nor `second`
    #[error("frequency \"{0}\" is not a valid frequency value")]
    InvalidUnit(String),
}

/// A runner declaration failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field was missing or had the wrong JSON type
    #[error("runner '{runner}' has an invalid declaration: {source}")]
    InvalidDeclaration {
        runner: String,
        #[source]
        source: serde_json::Error,
    },

    /// The `frequency` field did not parse
    #[error("runner '{runner}': {source}")]
    Frequency {
        runner: String,
        #[source]
        source: FrequencyError,
    },

    /// `on-event` named a handler that does not exist
    #[error("runner '{runner}': could not find event handler for \"{handler}\"")]
    UnknownHandler { runner: String, handler: String },

    /// A field parsed but its value is out of range
    #[error("runner '{runner}': field '{field}' {reason}")]
    InvalidValue {
        runner: String,
        field: &'static str,
        reason: String,
    },

    /// `type` is missing or unrecognized and unknown types are rejected
    #[error("runner '{runner}' has unknown type {kind:?}")]
    UnknownType {
        runner: String,
        kind: Option<String>,
    },
}

/// The scenario file could not be loaded.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or its top level is not an object
    #[error("'{path}' does not seem to be a valid JSON scenario: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Two declarations resolve to the same runner name
    #[error("runner name '{0}' is declared more than once")]
    DuplicateRunner(String),
}

/// The pub/sub client rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// An operation was attempted before `login` completed
    #[error("client is not logged in")]
    NotLoggedIn,

    #[error("client connection is closed")]
    Closed,

    #[error("invalid event name \"{0}\"")]
    InvalidEventName(String),

    #[error("no subscription {id} for event \"{event}\"")]
    UnknownSubscription { event: String, id: u64 },
}
