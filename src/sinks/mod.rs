//! ==============================================================================
//! sinks - the three consumers of a payload tree
//! ==============================================================================
//!
//! purpose:
//!     every sink reads the same immutable tree and turns it into its own
//!     output format:
//!     - telemetry: the tree as json, native units, every base tick
//!     - display:   fixed human readable lines, imperial units
//!     - cloud:     weather underground query string, imperial units
//!
//!     a sink only side-effects through its own collaborator handle
//!     (DisplaySurface, BrokerClient, CloudEndpoint) and reports failure as a
//!     SinkError. it never panics into the scheduler.
//!
//! relationships:
//!     - used by: scheduler.rs (dispatches a Sink per due SinkKind)
//!     - uses: projector.rs, conversion.rs
//!
//! ==============================================================================

pub mod cloud;
pub mod display;
pub mod telemetry;

use crate::error::SinkError;
use crate::payload::PayloadTree;
use async_trait::async_trait;
use std::fmt;

pub use cloud::{CloudEndpoint, CloudResponse, CloudUploadSink, FieldSpec, HttpEndpoint};
pub use display::{ConsoleDisplay, DisplayLayout, DisplaySink, DisplaySurface, TextLine};
pub use telemetry::{
    BrokerClient, HttpBridgeBroker, LifecycleStatus, LogBroker, MqttBroker, TelemetrySink,
};

/// which sink a dispatch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Telemetry,
    Display,
    Cloud,
}

impl SinkKind {
    pub const ALL: [SinkKind; 3] = [SinkKind::Telemetry, SinkKind::Display, SinkKind::Cloud];

    pub fn name(self) -> &'static str {
        match self {
            SinkKind::Telemetry => "telemetry",
            SinkKind::Display => "display",
            SinkKind::Cloud => "cloud",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// project `tree` into this sink's format and deliver it
    async fn publish(&self, tree: &PayloadTree) -> Result<(), SinkError>;
}
