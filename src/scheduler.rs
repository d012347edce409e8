//! ==============================================================================
//! scheduler.rs - base tick + per-sink cadences
//! ==============================================================================
//!
//! purpose:
//!     drives the whole station. one timer fires every base interval; each
//!     tick:
//!
//!         1. advance the tick counter (starts at 1)
//!         2. sample every sensor into a fresh PayloadTree
//!         3. telemetry: every tick
//!         4. display:   when tick % display_cadence == 0
//!         5. cloud:     when tick % cloud_cadence == 0
//!
//!     sampling is serialized; fan-out is not. each due sink gets its own task
//!     with a shared Arc<PayloadTree>, a timeout, and a one-permit semaphore:
//!     if the previous call of that sink is still running, this tick's call is
//!     skipped rather than queued. the next tick never waits on a sink.
//!
//! state machine:
//!
//!     Booting ──(display " Booting...", status Bootstrap,
//!                build sensors, status Online, display " Online")──> Online
//!
//!     Online is terminal; the process is stopped from outside.
//!
//! relationships:
//!     - uses: assembler.rs (sampling), sinks/ (fan-out)
//!     - created by: main.rs
//!
//! ==============================================================================

use crate::assembler::ReportAssembler;
use crate::error::SinkError;
use crate::payload::PayloadTree;
use crate::sinks::{CloudUploadSink, DisplaySink, LifecycleStatus, Sink, SinkKind, TelemetrySink};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

// ==============================================================================
// cadence
// ==============================================================================

/// how many base ticks between firings of the slower sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub display: u64,
    pub cloud: u64,
}

impl Default for Cadence {
    fn default() -> Self {
        Self { display: 6, cloud: 60 }
    }
}

impl Cadence {
    /// sinks due on `tick`, telemetry first
    pub fn due(&self, tick: u64) -> Vec<SinkKind> {
        let mut due = vec![SinkKind::Telemetry];
        if self.display != 0 && tick % self.display == 0 {
            due.push(SinkKind::Display);
        }
        if self.cloud != 0 && tick % self.cloud == 0 {
            due.push(SinkKind::Cloud);
        }
        due
    }
}

/// monotonically increasing tick counter, reset only by a restart
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CadenceState {
    tick: u64,
}

impl CadenceState {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// move to the next tick and return it; the first tick is 1
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

// ==============================================================================
// scheduler
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    Booting,
    Online,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub base_interval: Duration,
    pub cadence: Cadence,
    /// upper bound on any single sink call
    pub sink_timeout: Duration,
    /// log every assembled payload at info instead of debug
    pub show_sensor_data: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(10),
            cadence: Cadence::default(),
            sink_timeout: Duration::from_secs(5),
            show_sensor_data: false,
        }
    }
}

/// the sink handles the scheduler fans out to; display and cloud may be off
pub struct Sinks {
    pub telemetry: Arc<TelemetrySink>,
    pub display: Option<Arc<DisplaySink>>,
    pub cloud: Option<Arc<CloudUploadSink>>,
}

/// per-sink counters
#[derive(Debug, Default)]
pub struct SinkStats {
    pub published: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
}

impl SinkStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.published.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
        )
    }
}

struct Lane {
    sink: Arc<dyn Sink>,
    permit: Arc<Semaphore>,
    stats: Arc<SinkStats>,
}

impl Lane {
    fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink, permit: Arc::new(Semaphore::new(1)), stats: Arc::default() }
    }
}

/// what one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub dispatched: Vec<SinkKind>,
    /// due but still busy from an earlier tick
    pub skipped: Vec<SinkKind>,
}

pub struct CadenceScheduler {
    config: SchedulerConfig,
    telemetry: Arc<TelemetrySink>,
    display: Option<Arc<DisplaySink>>,
    lanes: Vec<(SinkKind, Lane)>,
    assembler: Option<ReportAssembler>,
    cadence_state: CadenceState,
    in_flight: JoinSet<()>,
}

impl CadenceScheduler {
    pub fn new(config: SchedulerConfig, sinks: Sinks) -> Self {
        let mut lanes = vec![(SinkKind::Telemetry, Lane::new(sinks.telemetry.clone()))];
        if let Some(display) = &sinks.display {
            lanes.push((SinkKind::Display, Lane::new(display.clone())));
        }
        if let Some(cloud) = sinks.cloud {
            lanes.push((SinkKind::Cloud, Lane::new(cloud)));
        }

        Self {
            config,
            telemetry: sinks.telemetry,
            display: sinks.display,
            lanes,
            assembler: None,
            cadence_state: CadenceState::default(),
            in_flight: JoinSet::new(),
        }
    }

    pub fn state(&self) -> StationState {
        if self.assembler.is_some() {
            StationState::Online
        } else {
            StationState::Booting
        }
    }

    pub fn cadence_state(&self) -> CadenceState {
        self.cadence_state
    }

    pub fn stats(&self, kind: SinkKind) -> Option<Arc<SinkStats>> {
        self.lanes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, lane)| lane.stats.clone())
    }

    /// announce boot, build the sensors, announce online
    ///
    /// announcement failures are logged; boot always completes.
    pub async fn boot<F>(&mut self, sensors: F)
    where
        F: FnOnce() -> ReportAssembler,
    {
        if self.state() == StationState::Online {
            return;
        }
        tracing::info!(target: "boot", "station booting");

        self.announce_display(" Booting...").await;
        self.announce_status(LifecycleStatus::Bootstrap).await;

        self.assembler = Some(sensors());

        self.announce_status(LifecycleStatus::Online).await;
        self.announce_display(" Online").await;
        tracing::info!(target: "boot", "station online");
    }

    async fn announce_display(&self, message: &str) {
        if let Some(display) = &self.display {
            let result = bounded(self.config.sink_timeout, display.announce(message)).await;
            if let Err(e) = result {
                tracing::warn!(sink = "display", "boot screen failed: {}", e);
            }
        }
    }

    async fn announce_status(&self, status: LifecycleStatus) {
        let result = bounded(self.config.sink_timeout, self.telemetry.announce(status)).await;
        if let Err(e) = result {
            tracing::warn!(sink = "telemetry", ?status, "status announcement failed: {}", e);
        }
    }

    /// run one base tick: sample, then dispatch every due sink
    ///
    /// returns None while still booting.
    pub async fn tick(&mut self) -> Option<TickReport> {
        let Some(assembler) = self.assembler.clone() else {
            tracing::warn!("tick requested before boot finished");
            return None;
        };
        self.reap();

        let tick = self.cadence_state.advance();
        let tree = Arc::new(sample(assembler).await);

        if self.config.show_sensor_data {
            tracing::info!(target: "sensors", tick, "{}", summarize(&tree));
        } else {
            tracing::debug!(target: "sensors", tick, "{}", summarize(&tree));
        }

        let mut report = TickReport { tick, dispatched: Vec::new(), skipped: Vec::new() };
        for kind in self.config.cadence.due(tick) {
            match self.dispatch(kind, tree.clone(), tick) {
                Some(true) => report.dispatched.push(kind),
                Some(false) => report.skipped.push(kind),
                None => {} // sink disabled
            }
        }
        Some(report)
    }

    /// Some(true) dispatched, Some(false) skipped as busy, None not configured
    fn dispatch(&mut self, kind: SinkKind, tree: Arc<PayloadTree>, tick: u64) -> Option<bool> {
        let (_, lane) = self.lanes.iter().find(|(k, _)| *k == kind)?;

        let permit = match lane.permit.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                lane.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(sink = %kind, tick, "previous call still in flight; skipping this cycle");
                return Some(false);
            }
        };

        let sink = lane.sink.clone();
        let stats = lane.stats.clone();
        let timeout = self.config.sink_timeout;

        self.in_flight.spawn(async move {
            let _permit = permit;
            match bounded(timeout, sink.publish(&tree)).await {
                Ok(()) => {
                    stats.published.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(sink = %kind, tick, "published");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(sink = %kind, tick, "{}", e);
                }
            }
        });
        Some(true)
    }

    /// drop finished sink tasks
    fn reap(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Err(e) = result {
                tracing::error!("sink task aborted: {}", e);
            }
        }
    }

    /// wait for every in-flight sink call to finish
    pub async fn drain(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                tracing::error!("sink task aborted: {}", e);
            }
        }
    }

    /// tick forever at the base interval
    pub async fn run(&mut self) {
        self.drive(None).await
    }

    /// tick `count` times at the base interval, then return
    pub async fn run_ticks(&mut self, count: u64) {
        self.drive(Some(count)).await
    }

    async fn drive(&mut self, limit: Option<u64>) {
        let period = self.config.base_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        // a slow sample shifts the schedule instead of bursting to catch up
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut done = 0u64;
        while limit.map_or(true, |limit| done < limit) {
            interval.tick().await;
            self.tick().await;
            done += 1;
        }
    }
}

async fn bounded<F>(timeout: Duration, fut: F) -> Result<(), SinkError>
where
    F: Future<Output = Result<(), SinkError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(SinkError::TimedOut(timeout)))
}

/// sensor reads may block on the bus, so they run off the async workers
async fn sample(assembler: ReportAssembler) -> PayloadTree {
    match tokio::task::spawn_blocking(move || assembler.build()).await {
        Ok(tree) => tree,
        Err(e) => {
            tracing::error!("sensor sampling aborted: {}", e);
            PayloadTree::new()
        }
    }
}

fn summarize(tree: &PayloadTree) -> String {
    serde_json::to_string(tree).unwrap_or_else(|e| format!("<unserializable payload: {}>", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_one() {
        let mut state = CadenceState::default();
        assert_eq!(state.tick(), 0);
        assert_eq!(state.advance(), 1);
        assert_eq!(state.advance(), 2);
        assert_eq!(state.tick(), 2);
    }

    #[test]
    fn cadence_multiples() {
        let cadence = Cadence { display: 6, cloud: 60 };
        assert_eq!(cadence.due(1), [SinkKind::Telemetry]);
        assert_eq!(cadence.due(6), [SinkKind::Telemetry, SinkKind::Display]);
        assert_eq!(
            cadence.due(60),
            [SinkKind::Telemetry, SinkKind::Display, SinkKind::Cloud]
        );
        assert_eq!(cadence.due(61), [SinkKind::Telemetry]);
    }

    #[test]
    fn firing_counts_over_61_ticks() {
        let cadence = Cadence::default();
        let mut state = CadenceState::default();
        let mut display = Vec::new();
        let mut cloud = Vec::new();
        let mut telemetry = 0;

        for _ in 0..61 {
            let tick = state.advance();
            for kind in cadence.due(tick) {
                match kind {
                    SinkKind::Telemetry => telemetry += 1,
                    SinkKind::Display => display.push(tick),
                    SinkKind::Cloud => cloud.push(tick),
                }
            }
        }

        assert_eq!(telemetry, 61);
        assert_eq!(display, (1..=10).map(|n| n * 6).collect::<Vec<u64>>());
        assert_eq!(cloud, [60]);
    }

    #[test]
    fn zero_cadence_never_fires() {
        let cadence = Cadence { display: 0, cloud: 0 };
        assert_eq!(cadence.due(60), [SinkKind::Telemetry]);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<(), SinkError>(())
        };
        let err = bounded(Duration::from_secs(5), slow).await.unwrap_err();
        assert!(matches!(err, SinkError::TimedOut(d) if d == Duration::from_secs(5)));
    }
}
