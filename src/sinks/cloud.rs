//! ==============================================================================
//! cloud.rs - weather underground upload sink
//! ==============================================================================
//!
//! purpose:
//!     projects the payload tree through an ordered list of FieldSpecs and
//!     sends one GET to the weather underground "updateraw" endpoint:
//!
//!         {base}?ID=..&PASSWORD=..&dateutc=now&action=updateraw
//!               &winddir=..&windspeedmph=..&windgustmph=..&humidity=..
//!               &tempf=..&rainin=..&dailyrainin=..&baromin=..
//!
//!     names and order are weather underground's contract. adding a field is
//!     one more entry in WUNDERGROUND_FIELDS.
//!
//!     every field is required: if any projection fails the upload for that
//!     cycle is skipped and reported as one IncompleteQuery error.
//!
//! relationships:
//!     - implements: sinks::Sink
//!     - uses: projector.rs, CloudEndpoint (reqwest in production)
//!
//! ==============================================================================

use super::{Sink, SinkKind};
use crate::conversion::ConversionSpec;
use crate::error::SinkError;
use crate::payload::PayloadTree;
use crate::projector::{Projected, Projector};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// one outbound query parameter: name, where to read it, how to convert it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub path: &'static str,
    pub conversion: ConversionSpec,
}

impl FieldSpec {
    pub const fn new(name: &'static str, path: &'static str, conversion: ConversionSpec) -> Self {
        Self { name, path, conversion }
    }
}

pub const WUNDERGROUND_FIELDS: [FieldSpec; 8] = [
    // [0-360 instantaneous wind direction]
    FieldSpec::new("winddir", "wind/direction", ConversionSpec::CompassToDegrees),
    FieldSpec::new("windspeedmph", "wind/average", ConversionSpec::Speed),
    FieldSpec::new("windgustmph", "wind/gust", ConversionSpec::Speed),
    // [% outdoor humidity 0-100%]
    FieldSpec::new("humidity", "humidity/measurement", ConversionSpec::Identity),
    FieldSpec::new("tempf", "temperature/measurement", ConversionSpec::Temperature),
    // rain over the past 60 min
    FieldSpec::new("rainin", "rain_hr/measurement", ConversionSpec::Identity),
    FieldSpec::new("dailyrainin", "rain_day/measurement", ConversionSpec::Identity),
    FieldSpec::new("baromin", "pressure/measurement", ConversionSpec::Pressure),
];

/// what came back from the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudResponse {
    pub status: u16,
    pub body: String,
}

/// one http GET; any response counts as delivered
#[async_trait]
pub trait CloudEndpoint: Send + Sync {
    async fn get(&self, url: &Url) -> Result<CloudResponse, SinkError>;
}

pub struct HttpEndpoint {
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build cloud http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CloudEndpoint for HttpEndpoint {
    async fn get(&self, url: &Url) -> Result<CloudResponse, SinkError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SinkError::CloudUnavailable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::CloudUnavailable(e.to_string()))?;
        Ok(CloudResponse { status, body })
    }
}

pub struct CloudUploadSink {
    endpoint: Arc<dyn CloudEndpoint>,
    base_url: String,
    station_id: String,
    password: String,
    fields: Vec<FieldSpec>,
}

impl CloudUploadSink {
    pub fn new(
        endpoint: Arc<dyn CloudEndpoint>,
        base_url: impl Into<String>,
        station_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            base_url: base_url.into(),
            station_id: station_id.into(),
            password: password.into(),
            fields: WUNDERGROUND_FIELDS.to_vec(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }

    /// the full upload url for `tree`
    pub fn build_url(&self, tree: &PayloadTree) -> Result<Url, SinkError> {
        let mut projector = Projector::new(tree, SinkKind::Cloud.name());
        let values: Vec<(&str, Projected)> = self
            .fields
            .iter()
            .map(|f| (f.name, projector.project(f.path, f.conversion)))
            .collect();

        let failures = projector.into_failures();
        if !failures.is_empty() {
            return Err(SinkError::IncompleteQuery(failures));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SinkError::CloudUnavailable(format!("bad base url '{}': {}", self.base_url, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("ID", &self.station_id)
                .append_pair("PASSWORD", &self.password)
                .append_pair("dateutc", "now")
                .append_pair("action", "updateraw");
            for (name, value) in &values {
                query.append_pair(name, &value.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Sink for CloudUploadSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Cloud
    }

    async fn publish(&self, tree: &PayloadTree) -> Result<(), SinkError> {
        let url = self.build_url(tree)?;
        tracing::debug!(target: "cloud", "sending {}", url);

        let response = self.endpoint.get(&url).await?;
        if (200..300).contains(&response.status) {
            tracing::info!(target: "cloud", status = response.status, "{}", response.body.trim());
        } else {
            tracing::warn!(target: "cloud", status = response.status, "{}", response.body.trim());
        }
        Ok(())
    }
}
