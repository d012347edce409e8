//! ==============================================================================
//! projector.rs - path-addressed reads with conversion
//! ==============================================================================
//!
//! purpose:
//!     reads one leaf out of a payload tree by a `/`-delimited path
//!     ("wind/average") and applies a ConversionSpec to it.
//!
//!     two layers:
//!     - try_project: pure, returns Result<Scalar, ExtractionFailure>
//!     - Projector: what the sinks use. keeps each failure for the caller to
//!       inspect (and report once per sink call), and hands back
//!       Projected::Unavailable so one bad field never stops the rest of a
//!       sink's output.
//!
//! relationships:
//!     - reads: payload.rs (PayloadTree)
//!     - uses: conversion.rs (ConversionSpec)
//!     - used by: sinks/display.rs, sinks/cloud.rs
//!
//! ==============================================================================

use crate::conversion::ConversionSpec;
use crate::error::{ExtractionCause, ExtractionFailure};
use crate::payload::{PayloadTree, PayloadValue, Scalar};
use std::fmt;

/// walk `path` from the root of `tree` and convert the leaf found there
pub fn try_project(
    tree: &PayloadTree,
    path: &str,
    conversion: ConversionSpec,
) -> Result<Scalar, ExtractionFailure> {
    let leaf = walk(tree, path)?;
    convert(leaf, conversion).map_err(|cause| ExtractionFailure::new(path, cause))
}

fn walk(tree: &PayloadTree, path: &str) -> Result<Scalar, ExtractionFailure> {
    let fail = |cause: ExtractionCause| ExtractionFailure::new(path, cause);
    let mut segments = path.split('/').peekable();
    let mut current = tree;

    while let Some(segment) = segments.next() {
        let value = current
            .get(segment)
            .ok_or_else(|| fail(ExtractionCause::MissingSegment(segment.to_string())))?;
        let last = segments.peek().is_none();

        match (value, last) {
            (PayloadValue::Tree(next), false) => current = next,
            (PayloadValue::Tree(_), true) => return Err(fail(ExtractionCause::NotALeaf)),
            (_, false) => return Err(fail(ExtractionCause::NotATree(segment.to_string()))),
            (leaf, true) => return leaf.as_scalar().ok_or_else(|| fail(ExtractionCause::NotALeaf)),
        }
    }
    Err(fail(ExtractionCause::NotALeaf))
}

fn convert(leaf: Scalar, conversion: ConversionSpec) -> Result<Scalar, ExtractionCause> {
    if conversion == ConversionSpec::Identity {
        return Ok(leaf);
    }
    if conversion.takes_text() {
        return match &leaf {
            Scalar::Text(label) => Ok(Scalar::Number(conversion.apply_text(label)?)),
            Scalar::Number(v) => Ok(Scalar::Number(conversion.apply_number(*v)?)),
        };
    }
    let v = leaf
        .as_f64()
        .ok_or_else(|| ExtractionCause::NotNumeric(leaf.to_string()))?;
    Ok(Scalar::Number(conversion.apply_number(v)?))
}

/// result of a projection through a Projector
#[derive(Debug, Clone, PartialEq)]
pub enum Projected {
    Value(Scalar),
    Unavailable,
}

impl Projected {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Projected::Value(s) => s.as_f64(),
            Projected::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Projected::Unavailable)
    }
}

impl fmt::Display for Projected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projected::Value(s) => write!(f, "{}", s),
            Projected::Unavailable => f.write_str("--"),
        }
    }
}

/// projects fields out of one tree, recording every failure
///
/// one Projector is created per sink call, so the failure list covers exactly
/// that call.
#[derive(Debug)]
pub struct Projector<'a> {
    tree: &'a PayloadTree,
    sink: &'static str,
    failures: Vec<ExtractionFailure>,
}

impl<'a> Projector<'a> {
    pub fn new(tree: &'a PayloadTree, sink: &'static str) -> Self {
        Self { tree, sink, failures: Vec::new() }
    }

    pub fn project(&mut self, path: &str, conversion: ConversionSpec) -> Projected {
        match try_project(self.tree, path, conversion) {
            Ok(value) => Projected::Value(value),
            Err(failure) => {
                tracing::debug!(sink = self.sink, path = %failure.path, "{}", failure);
                self.failures.push(failure);
                Projected::Unavailable
            }
        }
    }

    /// like `project`, but a leaf that is not a number also counts as a failure
    pub fn project_number(&mut self, path: &str, conversion: ConversionSpec) -> Projected {
        match self.project(path, conversion) {
            Projected::Value(value) if value.as_f64().is_none() => {
                let failure = ExtractionFailure::new(path, ExtractionCause::NotNumeric(value.to_string()));
                tracing::debug!(sink = self.sink, path = %failure.path, "{}", failure);
                self.failures.push(failure);
                Projected::Unavailable
            }
            projected => projected,
        }
    }

    pub fn failures(&self) -> &[ExtractionFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ExtractionFailure> {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;

    fn sample() -> PayloadTree {
        PayloadTree::new()
            .with(
                "wind",
                PayloadTree::new()
                    .with("direction", "WSW")
                    .with("average", 10.0)
                    .with("gust", "not a number"),
            )
            .with("temperature", PayloadTree::measurement(100.0, "C"))
            .with("rain_day", 0.5)
    }

    #[test]
    fn converts_speed_at_read_time() {
        let tree = PayloadTree::new().with("wind", PayloadTree::new().with("average", 10.0));
        let value = try_project(&tree, "wind/average", ConversionSpec::Speed).unwrap();
        assert_eq!(value, Scalar::Number(10.0 * 0.621371));
    }

    #[test]
    fn identity_returns_text_untouched() {
        let value = try_project(&sample(), "wind/direction", ConversionSpec::Identity).unwrap();
        assert_eq!(value, Scalar::Text("WSW".into()));
    }

    #[test]
    fn compass_label_becomes_degrees() {
        let value = try_project(&sample(), "wind/direction", ConversionSpec::CompassToDegrees).unwrap();
        assert_eq!(value, Scalar::Number(247.5));
    }

    #[test]
    fn missing_segment_is_reported() {
        let err = try_project(&sample(), "wind/speed", ConversionSpec::Identity).unwrap_err();
        assert_eq!(err.path, "wind/speed");
        assert_eq!(err.cause, ExtractionCause::MissingSegment("speed".into()));
    }

    #[test]
    fn descending_into_a_value_is_reported() {
        let err = try_project(&sample(), "rain_day/measurement", ConversionSpec::Identity).unwrap_err();
        assert_eq!(err.cause, ExtractionCause::NotATree("rain_day".into()));
    }

    #[test]
    fn stopping_on_a_tree_is_reported() {
        let err = try_project(&sample(), "temperature", ConversionSpec::Identity).unwrap_err();
        assert_eq!(err.cause, ExtractionCause::NotALeaf);
    }

    #[test]
    fn conversion_failures_become_extraction_failures() {
        let tree = PayloadTree::new().with("wind", PayloadTree::new().with("direction", "NORTHISH"));
        let err = try_project(&tree, "wind/direction", ConversionSpec::CompassToDegrees).unwrap_err();
        assert_eq!(
            err.cause,
            ExtractionCause::Conversion(ConversionError::UnknownDirection("NORTHISH".into()))
        );

        let err = try_project(&sample(), "wind/gust", ConversionSpec::Speed).unwrap_err();
        assert_eq!(err.cause, ExtractionCause::NotNumeric("not a number".into()));
    }

    #[test]
    fn projector_yields_sentinel_and_records_once() {
        let tree = sample();
        let mut projector = Projector::new(&tree, "test");

        let missing = projector.project("missing/path", ConversionSpec::Identity);
        let temp = projector.project("temperature/measurement", ConversionSpec::Temperature);

        assert_eq!(missing, Projected::Unavailable);
        assert_eq!(missing.to_string(), "--");
        assert_eq!(temp.as_f64(), Some(212.0));
        assert_eq!(projector.failures().len(), 1);
        assert_eq!(projector.failures()[0].path, "missing/path");
        assert_eq!(
            projector.failures()[0].cause,
            ExtractionCause::MissingSegment("missing".into())
        );
    }

    #[test]
    fn numeric_projection_records_text_leaves() {
        let tree = PayloadTree::new()
            .with("humidity", PayloadTree::new().with("measurement", "n/a"))
            .with("pressure", PayloadTree::new().with("measurement", "1013.25"));
        let mut projector = Projector::new(&tree, "test");

        let hum = projector.project_number("humidity/measurement", ConversionSpec::Identity);
        let bp = projector.project_number("pressure/measurement", ConversionSpec::Identity);

        assert!(hum.is_unavailable());
        assert_eq!(bp.as_f64(), Some(1013.25));
        assert_eq!(projector.failures().len(), 1);
        assert_eq!(projector.failures()[0].path, "humidity/measurement");
        assert_eq!(projector.failures()[0].cause, ExtractionCause::NotNumeric("n/a".into()));
    }

    #[test]
    fn projection_never_mutates_the_tree() {
        let tree = sample();
        let before = tree.clone();
        let mut projector = Projector::new(&tree, "test");
        projector.project("wind/average", ConversionSpec::Speed);
        projector.project("nope", ConversionSpec::Identity);
        assert_eq!(tree, before);
    }
}
