//! ==============================================================================
//! sensors.rs - sensor collaborator boundary
//! ==============================================================================
//!
//! purpose:
//!     the station reads four collaborators every base tick:
//!     - bme280 style temperature / humidity / pressure
//!     - anemometer (average + gust speed)
//!     - wind vane (compass label)
//!     - rain gauge (see rain.rs)
//!
//!     each is a zero-argument "read current state" call that either returns a
//!     small record or fails with SensorError::Unavailable. drivers themselves
//!     live outside this crate; what ships here are simulated implementations
//!     so the station runs on a development machine.
//!
//! relationships:
//!     - used by: assembler.rs (reads every collaborator once per tick)
//!     - created by: main.rs (simulated set)
//!
//! ==============================================================================

use crate::conversion::CompassPoint;
use crate::error::SensorError;
use crate::payload::PayloadTree;
use std::time::Instant;

/// temperature (°C), relative humidity (%) and pressure (hPa)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThpReading {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
}

impl ThpReading {
    /// three top-level sections: temperature, humidity, pressure
    pub fn to_tree(&self) -> PayloadTree {
        PayloadTree::new()
            .with("temperature", PayloadTree::measurement(self.temperature_c, "C"))
            .with("humidity", PayloadTree::measurement(self.humidity_pct, "%"))
            .with("pressure", PayloadTree::measurement(self.pressure_hpa, "hPa"))
    }
}

/// wind speed in km/h
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSpeedReading {
    pub average_kmh: f64,
    pub gust_kmh: f64,
}

/// wind vane position as a compass label ("NNE")
#[derive(Debug, Clone, PartialEq)]
pub struct WindDirectionReading {
    pub label: String,
}

pub trait ThpSensor: Send + Sync {
    fn read(&self) -> Result<ThpReading, SensorError>;
}

pub trait WindSpeedSensor: Send + Sync {
    fn read(&self) -> Result<WindSpeedReading, SensorError>;
}

pub trait WindDirectionSensor: Send + Sync {
    fn read(&self) -> Result<WindDirectionReading, SensorError>;
}

// ==============================================================================
// SIMULATED IMPLEMENTATIONS (no hardware attached)
// ==============================================================================
// slowly varying values derived from the time since start, so consecutive
// ticks look like weather rather than noise.

fn wave(started: Instant, period_secs: f64, phase: f64) -> f64 {
    let t = started.elapsed().as_secs_f64();
    (std::f64::consts::TAU * t / period_secs + phase).sin()
}

pub struct SimulatedThp {
    started: Instant,
}

impl SimulatedThp {
    pub fn new() -> Self {
        tracing::info!("Using SIMULATED bme280 (no hardware access)");
        Self { started: Instant::now() }
    }
}

impl Default for SimulatedThp {
    fn default() -> Self {
        Self::new()
    }
}

impl ThpSensor for SimulatedThp {
    fn read(&self) -> Result<ThpReading, SensorError> {
        let day = wave(self.started, 86_400.0, 0.0);
        Ok(ThpReading {
            temperature_c: 16.0 + 6.0 * day,
            humidity_pct: (65.0 - 20.0 * day).clamp(0.0, 100.0),
            pressure_hpa: 1013.0 + 4.0 * wave(self.started, 43_200.0, 1.0),
        })
    }
}

pub struct SimulatedWindSpeed {
    started: Instant,
}

impl SimulatedWindSpeed {
    pub fn new() -> Self {
        tracing::info!("Using SIMULATED anemometer (no hardware access)");
        Self { started: Instant::now() }
    }
}

impl Default for SimulatedWindSpeed {
    fn default() -> Self {
        Self::new()
    }
}

impl WindSpeedSensor for SimulatedWindSpeed {
    fn read(&self) -> Result<WindSpeedReading, SensorError> {
        let average = (8.0 + 6.0 * wave(self.started, 1_800.0, 0.3)).max(0.0);
        let gust = average * (1.4 + 0.2 * wave(self.started, 120.0, 0.0));
        Ok(WindSpeedReading { average_kmh: average, gust_kmh: gust })
    }
}

pub struct SimulatedWindDirection {
    started: Instant,
}

impl SimulatedWindDirection {
    pub fn new() -> Self {
        tracing::info!("Using SIMULATED wind vane (no hardware access)");
        Self { started: Instant::now() }
    }
}

impl Default for SimulatedWindDirection {
    fn default() -> Self {
        Self::new()
    }
}

impl WindDirectionSensor for SimulatedWindDirection {
    fn read(&self) -> Result<WindDirectionReading, SensorError> {
        // prevailing west-south-west, swinging about 45°
        let bearing = 247.5 + 45.0 * wave(self.started, 3_600.0, 0.0);
        Ok(WindDirectionReading {
            label: CompassPoint::from_degrees(bearing).label().to_string(),
        })
    }
}
