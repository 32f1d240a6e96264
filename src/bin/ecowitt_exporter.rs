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

use clap::Parser;
use ecowitt_exporter::client::EcowittClient;
use ecowitt_exporter::config::{self, PushConfig, PushFormat, RetryPolicy, StationConfig};
use ecowitt_exporter::push::{MetricsPusher, Publisher};
use ecowitt_exporter::run::{self, RunOutcome};
use std::error::Error;
use std::process;
use std::time::Duration;
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_CONNECT_TIMEOUT_MILLIS: u64 = 10_000;
const DEFAULT_READ_TIMEOUT_MILLIS: u64 = 60_000;
const DEFAULT_PUSH_TIMEOUT_MILLIS: u64 = 10_000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 4;
const DEFAULT_RETRY_BASE_MILLIS: u64 = 5_000;
const DEFAULT_API_URL: &str = "https://api.ecowitt.net/api/v3/device/real_time";

#[derive(Debug, Parser)]
#[clap(name = "ecowitt_exporter", version = clap::crate_version!())]
struct EcowittExporterApplication {
    /// Ecowitt application key
    #[clap(long, env = "ECOWITT_APP_KEY", hide_env_values = true)]
    application_key: String,

    /// Ecowitt API key
    #[clap(long, env = "ECOWITT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// MAC address of the station to fetch readings for. Also used as the value of
    /// the "station_mac" label on all metrics
    #[clap(long, env = "ECOWITT_MAC")]
    mac: String,

    /// URL of the Ecowitt real time API
    #[clap(long, env = "ECOWITT_API_URL", default_value_t = DEFAULT_API_URL.into())]
    api_url: String,

    /// URL to push metrics to (e.g. a Pushgateway job URL or a Prometheus remote write URL)
    #[clap(long, env = "PUSH_URL")]
    push_url: Option<String>,

    /// Username for basic auth when pushing metrics
    #[clap(long, env = "PUSH_USERNAME")]
    push_username: Option<String>,

    /// Password or token for basic auth when pushing metrics
    #[clap(long, env = "PUSH_PASSWORD", hide_env_values = true)]
    push_password: Option<String>,

    /// Format to push metrics in. Allowed values are 'text' and 'remote-write'. Defaults to
    /// 'remote-write' when the URL comes from GRAFANA_RW_URL and 'text' otherwise
    #[clap(long, env = "PUSH_FORMAT")]
    push_format: Option<PushFormat>,

    #[clap(long, env = "GRAFANA_RW_URL", hide = true)]
    grafana_rw_url: Option<String>,

    #[clap(long, env = "GRAFANA_RW_USERNAME", hide = true)]
    grafana_rw_username: Option<String>,

    #[clap(long, env = "GRAFANA_RW_PASSWORD", hide = true, hide_env_values = true)]
    grafana_rw_password: Option<String>,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for connecting to the Ecowitt API, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_MILLIS)]
    connect_timeout_millis: u64,

    /// Timeout for each request to the Ecowitt API, in milliseconds. Stations can be slow
    /// to respond so this is much longer than the connect timeout by default.
    #[clap(long, default_value_t = DEFAULT_READ_TIMEOUT_MILLIS)]
    read_timeout_millis: u64,

    /// Total number of attempts to fetch readings before skipping the run.
    #[clap(long, default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    retry_attempts: u32,

    /// Base delay between attempts to fetch readings, in milliseconds. The delay after
    /// each failed attempt is the attempt number times this value.
    #[clap(long, default_value_t = DEFAULT_RETRY_BASE_MILLIS)]
    retry_base_millis: u64,

    /// Timeout for pushing metrics, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_PUSH_TIMEOUT_MILLIS)]
    push_timeout_millis: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // A missing .env file is fine, everything can come from the environment or flags.
    let dotenv = config::ignore_missing_dotenv(dotenvy::dotenv());
    let opts = EcowittExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    match dotenv {
        Ok(Some(path)) => tracing::debug!(message = "loaded environment file", path = %path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!(message = "unable to load environment file", error = %e),
    }

    let mut station = StationConfig::new(&opts.api_url, &opts.application_key, &opts.api_key, &opts.mac)
        .unwrap_or_else(|e| {
            tracing::error!(message = "invalid station configuration", error = %e);
            process::exit(1)
        });
    station.connect_timeout = Duration::from_millis(opts.connect_timeout_millis);
    station.read_timeout = Duration::from_millis(opts.read_timeout_millis);
    station.retry = RetryPolicy {
        attempts: opts.retry_attempts,
        base: Duration::from_millis(opts.retry_base_millis),
    };

    // GRAFANA_RW_* are aliases for the PUSH_* settings, which take precedence
    let (push_url, default_format) = match (opts.push_url, opts.grafana_rw_url) {
        (Some(url), _) => (url, PushFormat::Text),
        (None, Some(url)) => (url, PushFormat::RemoteWrite),
        (None, None) => {
            tracing::error!(message = "no push URL, set --push-url, PUSH_URL, or GRAFANA_RW_URL");
            process::exit(1)
        }
    };
    let push_format = opts.push_format.unwrap_or(default_format);
    let push_username = opts.push_username.or(opts.grafana_rw_username);
    let push_password = opts.push_password.or(opts.grafana_rw_password);

    let mut push = PushConfig::new(&push_url, push_format, push_username, push_password).unwrap_or_else(|e| {
        tracing::error!(message = "invalid push configuration", error = %e);
        process::exit(1)
    });
    push.timeout = Duration::from_millis(opts.push_timeout_millis);

    tracing::debug!(message = "loaded configuration", station = ?station, push = ?push);

    let station_client = station.http_client().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let push_client = push.http_client().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = EcowittClient::new(station_client, &station);
    let publisher = Publisher::open(MetricsPusher::new(push_client, push), &station.mac);

    tracing::info!(message = "run started", api_url = %station.api_url, station = %station.mac);
    match run::run(&client, publisher).await {
        Ok(RunOutcome::Skipped) => {
            tracing::info!(message = "run skipped, no station data available");
        }
        Ok(RunOutcome::Completed { published, .. }) => {
            tracing::info!(message = "run completed", num_metrics = published.len());
        }
        Err(e) => {
            tracing::error!(message = "failed to push metrics", error = %e);
            process::exit(1)
        }
    }

    Ok(())
}
