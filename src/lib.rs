//! ==============================================================================
//! castle_weather - multi-cadence weather station pipeline
//! ==============================================================================
//!
//! one base tick samples every sensor into a PayloadTree; the tree then fans
//! out to three sinks, each on its own multiple of the base tick:
//!
//!     ┌─────────────┐   ┌──────────────┐   ┌───────────────────────────┐
//!     │  sensors    │──>│  assembler   │──>│  scheduler (base tick)    │
//!     │ thp / wind  │   │ PayloadTree  │   │                           │
//!     │ vane / rain │   └──────────────┘   │  every tick ─> telemetry  │
//!     └─────────────┘                      │  every 6th  ─> display    │
//!                                          │  every 60th ─> cloud (WU) │
//!                                          └───────────────────────────┘
//!
//! sinks read the tree through the projector, which converts native units
//! (km/h, °C, hPa, compass labels) at read time.
//!
//! ==============================================================================

pub mod assembler;
pub mod config;
pub mod conversion;
pub mod error;
pub mod logging;
pub mod network;
pub mod payload;
pub mod projector;
pub mod rain;
pub mod scheduler;
pub mod sensors;
pub mod sinks;

pub use assembler::ReportAssembler;
pub use payload::{PayloadTree, PayloadValue, Scalar};
pub use scheduler::{CadenceScheduler, SchedulerConfig, Sinks, StationState};
