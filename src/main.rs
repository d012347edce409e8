//! ==============================================================================
//! main.rs - weather station entry point
//! ==============================================================================
//!
//! purpose:
//!     wires the collaborators together and hands them to the scheduler.
//!
//! responsibilities:
//!     - load station.toml and start logging
//!     - discover the local address (shown on the display, sent as hostname)
//!     - build the sink transports (display panel, broker, weather underground)
//!     - boot the scheduler (announcements + sensor construction)
//!     - tick until the process is stopped
//!
//! relationships:
//!     - uses: config.rs, logging.rs, network.rs
//!     - builds: sensors.rs / rain.rs (simulated), sinks/
//!     - runs: scheduler.rs
//!
//! ==============================================================================

use anyhow::Result;
use castle_weather::config::{BrokerTransport, StationConfig};
use castle_weather::rain::SimulatedRain;
use castle_weather::sensors::{SimulatedThp, SimulatedWindDirection, SimulatedWindSpeed};
use castle_weather::sinks::{
    BrokerClient, CloudUploadSink, ConsoleDisplay, DisplaySink, HttpBridgeBroker, HttpEndpoint,
    LogBroker, MqttBroker, TelemetrySink,
};
use castle_weather::{logging, network, CadenceScheduler, ReportAssembler, Sinks};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config = StationConfig::load_or_default();
    logging::init(&config.logging.level);
    config.log_summary();

    // step 2: network identity
    let host = network::local_ip().to_string();
    let scheduler_config = config.scheduler();

    // step 3: sink transports
    let broker: Arc<dyn BrokerClient> = match config.broker.transport() {
        BrokerTransport::Mqtt { host, port, client_id } => {
            Arc::new(MqttBroker::connect(MqttBroker::options(&host, port, &client_id)))
        }
        BrokerTransport::HttpBridge { url } => {
            Arc::new(HttpBridgeBroker::new(url, scheduler_config.sink_timeout)?)
        }
        BrokerTransport::Log => Arc::new(LogBroker),
    };
    let telemetry = Arc::new(TelemetrySink::new(
        broker,
        config.broker.data_topic.as_str(),
        config.broker.status_topic.as_str(),
        config.station.name.as_str(),
        host.as_str(),
    ));

    let display = config.display.enabled.then(|| {
        Arc::new(DisplaySink::new(
            Arc::new(ConsoleDisplay),
            config.station.name.as_str(),
            host.as_str(),
            config.display_layout(),
        ))
    });

    let cloud = if config.cloud.enabled {
        let endpoint = HttpEndpoint::new(scheduler_config.sink_timeout)?;
        Some(Arc::new(CloudUploadSink::new(
            Arc::new(endpoint),
            config.cloud.base_url.as_str(),
            config.cloud.station_id.as_str(),
            config.cloud.password.as_str(),
        )))
    } else {
        None
    };

    // step 4: boot
    let mut scheduler = CadenceScheduler::new(scheduler_config, Sinks { telemetry, display, cloud });
    scheduler
        .boot(|| {
            ReportAssembler::new(
                Arc::new(SimulatedThp::new()),
                Arc::new(SimulatedWindSpeed::new()),
                Arc::new(SimulatedWindDirection::new()),
                Arc::new(SimulatedRain::new()),
            )
        })
        .await;

    // step 5: tick until stopped
    tracing::info!("sampling every {}s", scheduler_config.base_interval.as_secs());
    tokio::select! {
        _ = scheduler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupted, shutting down");
        }
    }
    Ok(())
}
