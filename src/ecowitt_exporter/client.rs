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

use crate::config::{RetryPolicy, StationConfig};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::error;
use std::fmt;
use std::future::Future;
use std::time::Duration;

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    Unexpected(StatusCode),
    Application(i64, String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::Unexpected(status) => write!(f, "unexpected status {}", status),
            Self::Application(code, msg) => write!(f, "application error code {}: {}", code, msg),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Decoded body of a real time response.
///
/// A `code` of zero indicates success, anything else is an error described by `msg`
/// even if the HTTP request itself succeeded. Bodies without a `code` are not valid
/// responses and fail to decode.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Station data, or an error if the API reported a non-zero code.
    pub fn into_data(self) -> Result<Value, ClientError> {
        if self.code == 0 {
            Ok(self.data)
        } else {
            Err(ClientError::Application(self.code, self.msg.unwrap_or_default()))
        }
    }
}

/// Result of fetching the latest readings after all retries.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Payload(Envelope),
    Unavailable,
}

#[derive(Debug)]
pub struct EcowittClient {
    client: Client,
    url: Url,
    retry: RetryPolicy,
}

impl EcowittClient {
    const USER_AGENT: &'static str = "Ecowitt Prometheus Exporter (https://github.com/56quarters/ecowitt_exporter)";
    const JSON_RESPONSE: &'static str = "application/json";

    /// Create a new client for the station described by `config`.
    ///
    /// The HTTP client should have the connect and read timeouts of `config`, see
    /// `StationConfig::http_client()`.
    pub fn new(client: Client, config: &StationConfig) -> Self {
        let mut url = config.api_url.clone();
        url.query_pairs_mut()
            .append_pair("application_key", &config.application_key)
            .append_pair("api_key", &config.api_key)
            .append_pair("mac", &config.mac)
            .append_pair("call_back", "all");

        EcowittClient {
            client,
            url,
            retry: config.retry.clone(),
        }
    }

    /// Fetch the latest readings, retrying failures according to the retry policy.
    ///
    /// Errors are logged but never returned: `Fetched::Unavailable` indicates that every
    /// attempt failed. The application level `code` of the response is not checked here.
    pub async fn fetch(&self) -> Fetched {
        match with_retries(&self.retry, |attempt| self.real_time(attempt), tokio::time::sleep).await {
            Some(envelope) => Fetched::Payload(envelope),
            None => Fetched::Unavailable,
        }
    }

    async fn real_time(&self, attempt: u32) -> Result<Envelope, ClientError> {
        tracing::debug!(
            message = "making real time request",
            url = %self.url.path(),
            attempt = attempt,
        );

        let res = self
            .client
            .get(self.url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(internal)?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(ClientError::Unexpected(status));
        }

        res.json::<Envelope>().await.map_err(internal)
    }
}

// Request URLs carry API keys in the query string so they must not end up in errors or logs
fn internal(e: reqwest::Error) -> ClientError {
    ClientError::Internal(e.without_url())
}

/// Run `op` until it succeeds or the policy runs out of attempts.
///
/// After each failed attempt `sleep` is awaited for the policy delay of that attempt
/// (1-based attempt number times the base delay). `None` is returned after the final
/// attempt fails.
pub async fn with_retries<T, E, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    mut op: Op,
    mut sleep: Sleep,
) -> Option<T>
where
    E: fmt::Display,
    Op: FnMut(u32) -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    for attempt in 1..=policy.attempts {
        match op(attempt).await {
            Ok(v) => return Some(v),
            Err(e) => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    message = "request attempt failed",
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                );
                sleep(delay).await;
            }
        }
    }

    tracing::error!(message = "giving up after all attempts failed", attempts = policy.attempts);
    None
}
