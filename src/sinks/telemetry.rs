//! ==============================================================================
//! telemetry.rs - telemetry broker sink
//! ==============================================================================
//!
//! purpose:
//!     publishes every payload tree, as-is and in native units, on the data
//!     topic. a separate status topic carries the two lifecycle announcements
//!     made at boot:
//!
//!         { "CastleWeather": { "status": "Bootstrap", "hostname": "192.168.0.42" } }
//!         { "CastleWeather": { "status": "Online",    "hostname": "192.168.0.42" } }
//!
//!     data always goes out on the data topic; the status topic is only for
//!     lifecycle messages.
//!
//! transports:
//!     - MqttBroker: mqtt publish (QoS 0) to the station broker, port 1883
//!     - HttpBridgeBroker: POST {url}/{topic} with a json body (http ingest bridge)
//!     - LogBroker: logs the message (no broker configured)
//!
//! relationships:
//!     - implements: sinks::Sink
//!     - used by: scheduler.rs (every tick + boot announcements)
//!
//! ==============================================================================

use super::{Sink, SinkKind};
use crate::error::SinkError;
use crate::payload::PayloadTree;
use anyhow::Context;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// best-effort publish to a message broker
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), SinkError>;
}

/// requests the mqtt client buffers before publishes start failing
const MQTT_QUEUE: usize = 10;
const MQTT_RETRY: Duration = Duration::from_secs(5);

/// publishes to an mqtt broker
///
/// publishes are queued on the client and never wait on the network. a
/// background task drives the connection and reconnects after errors, so a
/// broker outage shows up as BrokerUnreachable once the queue is full.
pub struct MqttBroker {
    client: AsyncClient,
}

impl MqttBroker {
    pub fn options(host: &str, port: u16, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));
        options
    }

    /// start the connection task; must be called inside a tokio runtime
    pub fn connect(options: MqttOptions) -> Self {
        let (host, port) = options.broker_address();
        let (client, eventloop) = AsyncClient::new(options, MQTT_QUEUE);
        tokio::spawn(drive(eventloop, format!("{}:{}", host, port)));
        Self { client }
    }
}

async fn drive(mut eventloop: EventLoop, addr: String) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!(target: "broker", %addr, "mqtt connected")
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(target: "broker", %addr, "mqtt connection error: {}", e);
                tokio::time::sleep(MQTT_RETRY).await;
            }
        }
    }
}

#[async_trait]
impl BrokerClient for MqttBroker {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&payload)?;
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, body)
            .map_err(|e| SinkError::BrokerUnreachable(e.to_string()))
    }
}

/// publishes through an http ingest bridge
pub struct HttpBridgeBroker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBridgeBroker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build broker http client")?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), topic)
    }
}

#[async_trait]
impl BrokerClient for HttpBridgeBroker {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.topic_url(topic))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SinkError::BrokerUnreachable(e.to_string()))?;

        response
            .error_for_status()
            .map(|_| ())
            .map_err(|e| SinkError::BrokerUnreachable(e.to_string()))
    }
}

/// logs each message instead of sending it
#[derive(Debug, Default)]
pub struct LogBroker;

#[async_trait]
impl BrokerClient for LogBroker {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), SinkError> {
        tracing::info!(target: "broker", topic, "{}", payload);
        Ok(())
    }
}

/// lifecycle states announced on the status topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleStatus {
    Bootstrap,
    Online,
}

pub struct TelemetrySink {
    broker: Arc<dyn BrokerClient>,
    data_topic: String,
    status_topic: String,
    station_name: String,
    host: String,
}

impl TelemetrySink {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        data_topic: impl Into<String>,
        status_topic: impl Into<String>,
        station_name: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            data_topic: data_topic.into(),
            status_topic: status_topic.into(),
            station_name: station_name.into(),
            host: host.into(),
        }
    }

    pub fn status_payload(&self, status: LifecycleStatus) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(
            self.station_name.clone(),
            json!({ "status": status, "hostname": self.host }),
        );
        Value::Object(body)
    }

    /// publish a lifecycle message on the status topic
    pub async fn announce(&self, status: LifecycleStatus) -> Result<(), SinkError> {
        self.broker
            .publish(&self.status_topic, self.status_payload(status))
            .await
    }
}

#[async_trait]
impl Sink for TelemetrySink {
    fn kind(&self) -> SinkKind {
        SinkKind::Telemetry
    }

    async fn publish(&self, tree: &PayloadTree) -> Result<(), SinkError> {
        let payload = serde_json::to_value(tree)?;
        self.broker.publish(&self.data_topic, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBroker {
        sent: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl BrokerClient for RecordingBroker {
        async fn publish(&self, topic: &str, payload: Value) -> Result<(), SinkError> {
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    fn sink(broker: Arc<RecordingBroker>) -> TelemetrySink {
        TelemetrySink::new(broker, "weather/data", "weather/status", "CastleWeather", "10.0.0.7")
    }

    #[tokio::test]
    async fn data_goes_to_the_data_topic_in_native_units() {
        let broker = Arc::new(RecordingBroker::default());
        let tree = PayloadTree::new()
            .with("temperature", PayloadTree::measurement(21.0, "C"))
            .with("wind", PayloadTree::new().with("direction", "N").with("average", 12.0));

        sink(broker.clone()).publish(&tree).await.unwrap();

        let sent = broker.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "weather/data");
        assert_eq!(
            sent[0].1,
            json!({
                "temperature": { "measurement": 21.0, "units": "C" },
                "wind": { "direction": "N", "average": 12.0 }
            })
        );
    }

    #[tokio::test]
    async fn lifecycle_messages_go_to_the_status_topic() {
        let broker = Arc::new(RecordingBroker::default());
        let sink = sink(broker.clone());

        sink.announce(LifecycleStatus::Bootstrap).await.unwrap();
        sink.announce(LifecycleStatus::Online).await.unwrap();

        let sent = broker.sent.lock().unwrap();
        assert_eq!(sent[0].0, "weather/status");
        assert_eq!(
            sent[0].1,
            json!({ "CastleWeather": { "status": "Bootstrap", "hostname": "10.0.0.7" } })
        );
        assert_eq!(sent[1].1["CastleWeather"]["status"], "Online");
    }

    #[test]
    fn mqtt_options_target_the_configured_broker() {
        let options = MqttBroker::options("192.168.0.105", 1883, "CastleWeather");
        assert_eq!(options.broker_address(), ("192.168.0.105".to_string(), 1883));
        assert_eq!(options.client_id(), "CastleWeather");
    }

    #[tokio::test]
    async fn mqtt_publish_fails_once_the_queue_backs_up() {
        // event loop kept alive but never polled: nothing drains the queue
        let (client, _eventloop) =
            AsyncClient::new(MqttBroker::options("127.0.0.1", 1883, "test"), MQTT_QUEUE);
        let broker = MqttBroker { client };

        broker.publish("weather/data", json!({ "rain_day": 0.0 })).await.unwrap();

        let mut failed = None;
        for _ in 0..(MQTT_QUEUE * 4) {
            if let Err(e) = broker.publish("weather/data", json!({})).await {
                failed = Some(e);
                break;
            }
        }
        assert!(matches!(failed, Some(SinkError::BrokerUnreachable(_))));
    }

    #[test]
    fn bridge_url_joins_topic() {
        let broker = HttpBridgeBroker::new("http://192.168.0.105:8080/ingest/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            broker.topic_url("weather/data"),
            "http://192.168.0.105:8080/ingest/weather/data"
        );
    }
}
