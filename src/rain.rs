//! ==============================================================================
//! rain.rs - tipping bucket rain accumulator
//! ==============================================================================
//!
//! purpose:
//!     a tipping bucket gauge reports one tip per 0.011 in of rain. the
//!     accumulator keeps tip times for the last day and answers "how much rain
//!     in the last hour / the last day". that window is the only history the
//!     station keeps; nothing is persisted.
//!
//! relationships:
//!     - used by: assembler.rs (queries both windows every tick)
//!     - fed by: the gauge driver (record_tip) or SimulatedRain
//!
//! ==============================================================================

use crate::error::SensorError;
use crate::payload::PayloadTree;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// rain per bucket tip, inches
pub const INCHES_PER_TIP: f64 = 0.011;

/// rolling windows the accumulator can be queried for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainWindow {
    Hour,
    Day,
}

impl RainWindow {
    pub fn duration(self) -> Duration {
        match self {
            RainWindow::Hour => Duration::from_secs(3_600),
            RainWindow::Day => Duration::from_secs(86_400),
        }
    }

    /// top-level payload key for this window
    pub fn payload_key(self) -> &'static str {
        match self {
            RainWindow::Hour => "rain_hr",
            RainWindow::Day => "rain_day",
        }
    }
}

/// accumulated rain over one window, inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainReading {
    pub window: RainWindow,
    pub measurement_in: f64,
}

impl RainReading {
    pub fn to_tree(&self) -> PayloadTree {
        PayloadTree::new().with(
            self.window.payload_key(),
            PayloadTree::measurement(self.measurement_in, "in"),
        )
    }
}

pub trait RainSensor: Send + Sync {
    fn recent(&self, window: RainWindow) -> Result<RainReading, SensorError>;
}

#[derive(Debug, Default)]
pub struct RainGauge {
    tips: Mutex<VecDeque<Instant>>,
}

impl RainGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tip(&self) -> Result<(), SensorError> {
        self.record_tip_at(Instant::now())
    }

    /// tips must be recorded in time order
    pub fn record_tip_at(&self, at: Instant) -> Result<(), SensorError> {
        let mut tips = self.lock()?;
        tips.push_back(at);
        prune(&mut tips, at);
        Ok(())
    }

    pub fn recent_at(&self, window: RainWindow, now: Instant) -> Result<RainReading, SensorError> {
        let mut tips = self.lock()?;
        prune(&mut tips, now);
        let count = tips
            .iter()
            .rev()
            .take_while(|t| now.saturating_duration_since(**t) < window.duration())
            .count();
        Ok(RainReading { window, measurement_in: count as f64 * INCHES_PER_TIP })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<Instant>>, SensorError> {
        self.tips
            .lock()
            .map_err(|_| SensorError::unavailable("rain", "tip log lock poisoned"))
    }
}

fn prune(tips: &mut VecDeque<Instant>, now: Instant) {
    let keep = RainWindow::Day.duration();
    while let Some(oldest) = tips.front() {
        if now.saturating_duration_since(*oldest) >= keep {
            tips.pop_front();
        } else {
            break;
        }
    }
}

impl RainSensor for RainGauge {
    fn recent(&self, window: RainWindow) -> Result<RainReading, SensorError> {
        self.recent_at(window, Instant::now())
    }
}

// ==============================================================================
// SIMULATED GAUGE
// ==============================================================================
// a shower every few hours; while it rains, one tip per `tip_every`.

pub struct SimulatedRain {
    gauge: RainGauge,
    started: Instant,
    fed_until: Mutex<Instant>,
    tip_every: Duration,
}

impl SimulatedRain {
    pub fn new() -> Self {
        tracing::info!("Using SIMULATED rain gauge (no hardware access)");
        let now = Instant::now();
        Self {
            gauge: RainGauge::new(),
            started: now,
            fed_until: Mutex::new(now),
            tip_every: Duration::from_secs(90),
        }
    }

    fn raining_at(&self, at: Instant) -> bool {
        let t = at.saturating_duration_since(self.started).as_secs_f64();
        (std::f64::consts::TAU * t / 14_400.0).sin() > 0.8
    }

    fn feed(&self, now: Instant) -> Result<(), SensorError> {
        let mut fed_until = self
            .fed_until
            .lock()
            .map_err(|_| SensorError::unavailable("rain", "simulation lock poisoned"))?;
        while *fed_until + self.tip_every <= now {
            *fed_until += self.tip_every;
            if self.raining_at(*fed_until) {
                self.gauge.record_tip_at(*fed_until)?;
            }
        }
        Ok(())
    }
}

impl Default for SimulatedRain {
    fn default() -> Self {
        Self::new()
    }
}

impl RainSensor for SimulatedRain {
    fn recent(&self, window: RainWindow) -> Result<RainReading, SensorError> {
        let now = Instant::now();
        self.feed(now)?;
        self.gauge.recent_at(window, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_count_only_recent_tips() {
        let gauge = RainGauge::new();
        let t0 = Instant::now();

        gauge.record_tip_at(t0).unwrap();
        gauge.record_tip_at(t0 + Duration::from_secs(7_000)).unwrap();
        gauge.record_tip_at(t0 + Duration::from_secs(7_100)).unwrap();

        let now = t0 + Duration::from_secs(7_200);
        let hour = gauge.recent_at(RainWindow::Hour, now).unwrap();
        let day = gauge.recent_at(RainWindow::Day, now).unwrap();

        assert!((hour.measurement_in - 2.0 * INCHES_PER_TIP).abs() < 1e-12);
        assert!((day.measurement_in - 3.0 * INCHES_PER_TIP).abs() < 1e-12);
    }

    #[test]
    fn tips_older_than_a_day_are_dropped() {
        let gauge = RainGauge::new();
        let t0 = Instant::now();
        gauge.record_tip_at(t0).unwrap();

        let later = t0 + Duration::from_secs(86_400 + 1);
        let day = gauge.recent_at(RainWindow::Day, later).unwrap();
        assert_eq!(day.measurement_in, 0.0);
        assert!(gauge.lock().unwrap().is_empty());
    }

    #[test]
    fn reading_lands_under_its_window_key() {
        let reading = RainReading { window: RainWindow::Hour, measurement_in: 0.022 };
        let json = serde_json::to_value(reading.to_tree()).unwrap();
        assert_eq!(json["rain_hr"]["measurement"], 0.022);
        assert_eq!(json["rain_hr"]["units"], "in");
    }

    #[test]
    fn simulated_gauge_starts_dry() {
        let rain = SimulatedRain::new();
        assert_eq!(rain.recent(RainWindow::Day).unwrap().measurement_in, 0.0);
    }
}
