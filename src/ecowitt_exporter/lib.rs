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

//! Push Ecowitt weather station readings as Prometheus metrics
//!
//! ## Features
//!
//! `ecowitt_exporter` fetches the latest readings for a weather station using the [Ecowitt API]
//! and pushes them as Prometheus metrics to a remote endpoint: either using Prometheus remote
//! write (e.g. Grafana Cloud) or as a `POST` of the Prometheus text format (e.g. a Pushgateway).
//! It makes a single attempt to fetch and push
//! each time it runs and is meant to be invoked on a schedule (cron, a Systemd timer, or a CI
//! workflow). The following metrics are emitted when available. Readings are converted from
//! imperial units when the station reports them that way.
//!
//! * `temperature_c{station_mac=$MAC}` - Outdoor temperature, in degrees celsius.
//! * `humidity_pct{station_mac=$MAC}` - Outdoor relative humidity (0-100).
//! * `pressure_hpa{station_mac=$MAC}` - Barometric pressure, in hectopascals.
//! * `wind_speed_ms{station_mac=$MAC}` - Wind speed, in meters per second.
//! * `wind_gust_ms{station_mac=$MAC}` - Wind gust speed, in meters per second.
//! * `precipitation_rate_mm{station_mac=$MAC}` - Rain rate, in millimeters per hour.
//!
//! Depending on the account, device, and firmware, the Ecowitt API returns readings in
//! different shapes and under different names. Metrics that can't be found in a response
//! are left out of what gets pushed instead of being reported as zero.
//!
//! [Ecowitt API]: https://doc.ecowitt.net/web/#/apiv3en
//!
//! ## Build
//!
//! `ecowitt_exporter` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/ecowitt_exporter.git && cd ecowitt_exporter
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! Credentials and the station MAC address can be supplied as flags or environment variables
//! (optionally from a `.env` file in the working directory).
//!
//! ```text
//! export ECOWITT_APP_KEY=...
//! export ECOWITT_API_KEY=...
//! export ECOWITT_MAC=AA:BB:CC:DD:EE:FF
//! export PUSH_URL=https://pushgateway.example.com/metrics/job/ecowitt
//! ./ecowitt_exporter
//! ```
//!
//! To push to a Prometheus remote write endpoint such as Grafana Cloud, use `--push-format
//! remote-write` or set the `GRAFANA_RW_*` variables instead of `PUSH_*`. Remote write is the
//! default when the URL comes from `GRAFANA_RW_URL`.
//!
//! ```text
//! export GRAFANA_RW_URL=https://prometheus-prod-01-eu-west-0.grafana.net/api/prom/push
//! export GRAFANA_RW_USERNAME=123456
//! export GRAFANA_RW_PASSWORD=glc_...
//! ./ecowitt_exporter
//! ```
//!
//! If the Ecowitt API can't be reached after several attempts, or it returns an error, the run
//! is skipped and `ecowitt_exporter` exits successfully. Failing to push metrics results in
//! a non-zero exit code.
//!

pub mod client;
pub mod config;
pub mod metrics;
pub mod payload;
pub mod push;
pub mod remote_write;
pub mod resolve;
pub mod run;
pub mod units;
