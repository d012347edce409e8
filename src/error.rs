//! ==============================================================================
//! error.rs - failure taxonomy for the reporting pipeline
//! ==============================================================================
//!
//! purpose:
//!     one error type per failure class. none of them is fatal to the process:
//!     - SensorError: a collaborator could not produce a reading this cycle
//!     - ExtractionFailure: a path was absent/malformed or a value could not
//!       be converted while projecting a payload tree
//!     - SinkError: a display/broker/cloud call failed
//!
//! relationships:
//!     - raised by: sensors.rs, rain.rs, conversion.rs, projector.rs, sinks/
//!     - caught by: assembler.rs (sensor), sinks/ (extraction), scheduler.rs (sink)
//!
//! ==============================================================================

use thiserror::Error;

/// a conversion could not be applied to a leaf value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("unknown compass direction '{0}'")]
    UnknownDirection(String),
}

/// a sensor collaborator failed to produce a reading
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("sensor '{sensor}' unavailable: {reason}")]
    Unavailable { sensor: &'static str, reason: String },
}

impl SensorError {
    pub fn unavailable(sensor: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable { sensor, reason: reason.into() }
    }

    /// name of the sensor that failed
    pub fn sensor(&self) -> &'static str {
        match self {
            Self::Unavailable { sensor, .. } => *sensor,
        }
    }
}

/// why a path could not be projected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionCause {
    #[error("bad index '{0}'")]
    MissingSegment(String),
    #[error("'{0}' is a value, not a tree")]
    NotATree(String),
    #[error("path ends on a tree, not a value")]
    NotALeaf,
    #[error("'{0}' is not numeric")]
    NotNumeric(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// a projection of one path out of a payload tree failed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("extraction of '{path}' failed: {cause}")]
pub struct ExtractionFailure {
    pub path: String,
    pub cause: ExtractionCause,
}

impl ExtractionFailure {
    pub fn new(path: impl Into<String>, cause: impl Into<ExtractionCause>) -> Self {
        Self { path: path.into(), cause: cause.into() }
    }
}

/// a sink could not deliver its output
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("display unavailable: {0}")]
    DisplayUnavailable(String),
    #[error("broker unreachable: {0}")]
    BrokerUnreachable(String),
    #[error("cloud endpoint unavailable: {0}")]
    CloudUnavailable(String),
    #[error("query incomplete, {} field(s) failed: {}", .0.len(), join_paths(.0))]
    IncompleteQuery(Vec<ExtractionFailure>),
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

fn join_paths(failures: &[ExtractionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
