//! ==============================================================================
//! assembler.rs - merges sensor snapshots into one payload tree
//! ==============================================================================
//!
//! purpose:
//!     once per base tick every sensor collaborator is read once, and the
//!     results are merged into a fresh PayloadTree:
//!
//!         thp          -> temperature, humidity, pressure
//!         wind speed   -> wind/average, wind/gust, wind/units
//!         wind vane    -> wind/direction
//!         rain (hour)  -> rain_hr
//!         rain (day)   -> rain_day
//!
//!     a failed read drops only the keys that collaborator owns; the rest of
//!     the tree is still built.
//!
//! relationships:
//!     - reads: sensors.rs, rain.rs
//!     - builds: payload.rs (PayloadTree)
//!     - used by: scheduler.rs (once per tick, before any sink fires)
//!
//! ==============================================================================

use crate::error::SensorError;
use crate::payload::PayloadTree;
use crate::rain::{RainReading, RainSensor, RainWindow};
use crate::sensors::{
    ThpReading, ThpSensor, WindDirectionReading, WindDirectionSensor, WindSpeedReading,
    WindSpeedSensor,
};
use std::sync::Arc;

/// one read of every collaborator
#[derive(Debug)]
pub struct SensorSnapshots {
    pub thp: Result<ThpReading, SensorError>,
    pub wind_speed: Result<WindSpeedReading, SensorError>,
    pub wind_direction: Result<WindDirectionReading, SensorError>,
    pub rain_hour: Result<RainReading, SensorError>,
    pub rain_day: Result<RainReading, SensorError>,
}

impl SensorSnapshots {
    pub fn failures(&self) -> Vec<&SensorError> {
        [
            self.thp.as_ref().err(),
            self.wind_speed.as_ref().err(),
            self.wind_direction.as_ref().err(),
            self.rain_hour.as_ref().err(),
            self.rain_day.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// merge snapshots into a tree, skipping the sections of failed sensors
pub fn assemble(snapshots: &SensorSnapshots) -> PayloadTree {
    let mut payload = PayloadTree::new();

    for err in snapshots.failures() {
        tracing::warn!(sensor = err.sensor(), "{}; section omitted this cycle", err);
    }

    if let Ok(thp) = &snapshots.thp {
        payload.merge(thp.to_tree());
    }

    let mut wind = PayloadTree::new();
    if let Ok(direction) = &snapshots.wind_direction {
        wind.insert("direction", direction.label.as_str());
    }
    if let Ok(speed) = &snapshots.wind_speed {
        wind.insert("average", speed.average_kmh);
        wind.insert("gust", speed.gust_kmh);
        wind.insert("units", "km/h");
    }
    if !wind.is_empty() {
        payload.insert("wind", wind);
    }

    for rain in [&snapshots.rain_hour, &snapshots.rain_day].into_iter().flatten() {
        payload.merge(rain.to_tree());
    }

    payload
}

/// the sensor collaborators, read together once per tick
#[derive(Clone)]
pub struct ReportAssembler {
    thp: Arc<dyn ThpSensor>,
    wind_speed: Arc<dyn WindSpeedSensor>,
    wind_direction: Arc<dyn WindDirectionSensor>,
    rain: Arc<dyn RainSensor>,
}

impl ReportAssembler {
    pub fn new(
        thp: Arc<dyn ThpSensor>,
        wind_speed: Arc<dyn WindSpeedSensor>,
        wind_direction: Arc<dyn WindDirectionSensor>,
        rain: Arc<dyn RainSensor>,
    ) -> Self {
        Self { thp, wind_speed, wind_direction, rain }
    }

    pub fn sample(&self) -> SensorSnapshots {
        SensorSnapshots {
            thp: self.thp.read(),
            wind_speed: self.wind_speed.read(),
            wind_direction: self.wind_direction.read(),
            rain_hour: self.rain.recent(RainWindow::Hour),
            rain_day: self.rain.recent(RainWindow::Day),
        }
    }

    /// sample every collaborator and merge the results
    pub fn build(&self) -> PayloadTree {
        assemble(&self.sample())
    }
}
