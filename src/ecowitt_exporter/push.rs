// ecowitt_exporter - Push Ecowitt weather station readings as Prometheus metrics
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::config::{redact_url, PushConfig, PushFormat};
use crate::metrics::StationMetrics;
use crate::remote_write::{self, WriteRequest};
use crate::resolve::ResolvedMetric;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use reqwest::{Body, Client, StatusCode, Url};
use std::error;
use std::fmt;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug)]
pub enum PushError {
    Internal(reqwest::Error),
    Encode(fmt::Error),
    Compress(snap::Error),
    /// Non-success status from the push endpoint. The URL never includes credentials.
    Unexpected(StatusCode, Url),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::Encode(e) => write!(f, "unable to encode metrics: {}", e),
            Self::Compress(e) => write!(f, "unable to compress metrics: {}", e),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for PushError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Compress(e) => Some(e),
            _ => None,
        }
    }
}

/// Sends metrics to a remote endpoint, optionally using basic auth.
///
/// Metrics are sent either as a `POST` of the Prometheus text format (compatible with the
/// Pushgateway and similar ingestion endpoints) or as a Prometheus remote write request
/// (compatible with Grafana Cloud, Mimir, and Prometheus itself).
#[derive(Debug)]
pub struct MetricsPusher {
    client: Client,
    config: PushConfig,
}

impl MetricsPusher {
    const USER_AGENT: &'static str = "Ecowitt Prometheus Exporter (https://github.com/56quarters/ecowitt_exporter)";

    pub fn new(client: Client, config: PushConfig) -> Self {
        MetricsPusher { client, config }
    }

    pub fn format(&self) -> PushFormat {
        self.config.format
    }

    /// Push the contents of a registry in the Prometheus text format.
    pub async fn push_text(&self, reg: &Registry) -> Result<usize, PushError> {
        let mut body = String::new();
        encode(&mut body, reg).map_err(PushError::Encode)?;
        self.send(body, &[(CONTENT_TYPE.as_str(), TEXT_FORMAT)]).await
    }

    /// Push a remote write request, protobuf encoded and snappy compressed.
    pub async fn push_remote_write(&self, req: &WriteRequest) -> Result<usize, PushError> {
        let body = remote_write::encode(req).map_err(PushError::Compress)?;
        self.send(
            body,
            &[
                (CONTENT_TYPE.as_str(), remote_write::CONTENT_TYPE),
                (CONTENT_ENCODING.as_str(), remote_write::CONTENT_ENCODING),
                (remote_write::VERSION_HEADER, remote_write::VERSION),
            ],
        )
        .await
    }

    async fn send<B>(&self, body: B, headers: &[(&str, &str)]) -> Result<usize, PushError>
    where
        B: Into<Body> + AsRef<[u8]>,
    {
        let num_bytes = body.as_ref().len();
        let url = redact_url(&self.config.url);
        tracing::debug!(
            message = "pushing metrics",
            url = %url,
            format = %self.config.format,
            num_bytes = num_bytes,
        );

        let mut req = self
            .client
            .post(self.config.url.clone())
            .timeout(self.config.timeout)
            .header(USER_AGENT, Self::USER_AGENT);

        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        if let Some(username) = &self.config.username {
            req = req.basic_auth(username, self.config.password.as_ref());
        }

        let res = req
            .body(body)
            .send()
            .await
            .map_err(|e| PushError::Internal(e.without_url()))?;
        let status = res.status();
        if status.is_success() {
            Ok(num_bytes)
        } else {
            Err(PushError::Unexpected(status, url))
        }
    }
}

/// Metrics for a station along with the means to send them somewhere.
///
/// Gauges set via `record` are buffered in memory until `flush` is called. Since a
/// `Publisher` is used for a single run, `flush` consumes it.
#[derive(Debug)]
pub struct Publisher {
    registry: Registry,
    metrics: StationMetrics,
    recorded: Vec<ResolvedMetric>,
    station_mac: String,
    pusher: MetricsPusher,
}

impl Publisher {
    pub fn open(pusher: MetricsPusher, station_mac: &str) -> Self {
        let mut registry = Registry::default();
        let metrics = StationMetrics::new(&mut registry, station_mac);

        Publisher {
            registry,
            metrics,
            recorded: Vec::new(),
            station_mac: station_mac.to_owned(),
            pusher,
        }
    }

    /// Set the gauge for `resolved`, returning `true` if it had a value.
    pub fn record(&mut self, resolved: &ResolvedMetric) -> bool {
        let present = self.metrics.observe(resolved);
        if present {
            self.recorded.push(resolved.clone());
        }
        present
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Push everything recorded so far and close this publisher.
    pub async fn flush(self) -> Result<usize, PushError> {
        match self.pusher.format() {
            PushFormat::Text => self.pusher.push_text(&self.registry).await,
            PushFormat::RemoteWrite => {
                let req = remote_write::write_request(&self.recorded, &self.station_mac, remote_write::now_millis());
                self.pusher.push_remote_write(&req).await
            }
        }
    }
}
