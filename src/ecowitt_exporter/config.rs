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

use reqwest::{Client, Url};
use std::error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const REDACTED: &str = "<redacted>";

#[derive(Debug)]
pub enum ConfigError {
    InvalidUrl(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(name, e) => write!(f, "invalid {} URL: {}", name, e),
        }
    }
}

impl error::Error for ConfigError {}

/// How many times to attempt a request and how long to wait after each failure.
///
/// The wait after attempt `n` (starting at 1) is `n * base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 4,
            base: Duration::from_secs(5),
        }
    }
}

/// Everything needed to request readings for a single station.
#[derive(Clone)]
pub struct StationConfig {
    pub api_url: Url,
    pub application_key: String,
    pub api_key: String,
    pub mac: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
}

impl StationConfig {
    pub fn new(api_url: &str, application_key: &str, api_key: &str, mac: &str) -> Result<Self, ConfigError> {
        Ok(StationConfig {
            api_url: Url::parse(api_url).map_err(|e| ConfigError::InvalidUrl("API", e.to_string()))?,
            application_key: application_key.to_owned(),
            api_key: api_key.to_owned(),
            mac: mac.to_owned(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        })
    }

    /// HTTP client for the Ecowitt API with separate connect and read timeouts.
    ///
    /// Stations can be slow to respond so the read timeout is usually much longer
    /// than the connect timeout.
    pub fn http_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .build()
    }
}

impl fmt::Debug for StationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationConfig")
            .field("api_url", &self.api_url.as_str())
            .field("application_key", &REDACTED)
            .field("api_key", &REDACTED)
            .field("mac", &self.mac)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Wire format used to push metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFormat {
    /// Prometheus text format, e.g. for a Pushgateway.
    Text,
    /// Prometheus remote write (snappy compressed protobuf), e.g. for Grafana Cloud.
    RemoteWrite,
}

impl FromStr for PushFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "remote-write" | "remote_write" => Ok(Self::RemoteWrite),
            other => Err(format!("unknown push format '{}', expected 'text' or 'remote-write'", other)),
        }
    }
}

impl fmt::Display for PushFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::RemoteWrite => f.write_str("remote-write"),
        }
    }
}

/// Where and how to push metrics after each run.
#[derive(Clone)]
pub struct PushConfig {
    pub url: Url,
    pub format: PushFormat,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl PushConfig {
    pub fn new(
        url: &str,
        format: PushFormat,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(PushConfig {
            url: Url::parse(url).map_err(|e| ConfigError::InvalidUrl("push", e.to_string()))?,
            format,
            username,
            password,
            timeout: Duration::from_secs(10),
        })
    }

    /// HTTP client for pushing metrics, bounded by the push timeout.
    pub fn http_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder().timeout(self.timeout).build()
    }
}

impl fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushConfig")
            .field("url", &redact_url(&self.url).as_str())
            .field("format", &self.format)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Copy of `url` without any `user:password@` credentials, safe for logs and errors.
pub fn redact_url(url: &Url) -> Url {
    let mut out = url.clone();
    // Only fails for URLs that can't have credentials in the first place
    let _ = out.set_username("");
    let _ = out.set_password(None);
    out
}

/// Treat a missing `.env` file as nothing to load, keeping any other error (a file
/// that exists but can't be read or parsed).
pub fn ignore_missing_dotenv(res: Result<PathBuf, dotenvy::Error>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match res {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
