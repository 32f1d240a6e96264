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

use crate::client::{EcowittClient, Fetched};
use crate::payload::{normalize, CanonicalBlock};
use crate::push::{PushError, Publisher};
use crate::resolve::{resolve, Metric, ResolvedMetric};

/// Blocks some stations send that are only logged, never published.
const DIAGNOSTIC_BLOCKS: [&str; 2] = ["solar_and_uvi", "battery"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Fetched,
    Normalized,
    Resolved,
    Published,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No data was available from the station, nothing was published.
    Skipped,
    /// Metrics that had values were pushed, possibly none of them.
    Completed { published: Vec<ResolvedMetric>, num_bytes: usize },
}

/// Resolve every metric from a normalized payload, converted to canonical units.
pub fn resolve_all(root: &CanonicalBlock) -> Vec<ResolvedMetric> {
    Metric::ALL
        .iter()
        .map(|m| ResolvedMetric::from_reading(*m, resolve(root, *m)))
        .collect()
}

/// Fetch, resolve, and publish the latest readings of a station.
///
/// Unavailable data from the station is not an error: the run is skipped. The only
/// error returned is a failure to push metrics.
pub async fn run(client: &EcowittClient, mut publisher: Publisher) -> Result<RunOutcome, PushError> {
    let mut state = RunState::Start;

    let envelope = match client.fetch().await {
        Fetched::Payload(envelope) => envelope,
        Fetched::Unavailable => {
            tracing::warn!(message = "station data unavailable, skipping run");
            advance(&mut state, RunState::Done);
            return Ok(RunOutcome::Skipped);
        }
    };
    advance(&mut state, RunState::Fetched);

    let data = match envelope.into_data() {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(message = "station API returned an error, skipping run", error = %e);
            advance(&mut state, RunState::Done);
            return Ok(RunOutcome::Skipped);
        }
    };

    let root = normalize(&data);
    log_blocks(&root);
    advance(&mut state, RunState::Normalized);

    let resolved = resolve_all(&root);
    advance(&mut state, RunState::Resolved);

    let mut published = Vec::with_capacity(resolved.len());
    for r in resolved {
        if publisher.record(&r) {
            tracing::debug!(message = "set metric", metric = %r.metric, value = ?r.value);
            published.push(r);
        } else {
            tracing::info!(message = "metric not found in station data", metric = %r.metric);
        }
    }
    advance(&mut state, RunState::Published);

    let num_bytes = publisher.flush().await?;
    advance(&mut state, RunState::Done);

    tracing::info!(message = "pushed metrics", num_metrics = published.len(), num_bytes = num_bytes);
    Ok(RunOutcome::Completed { published, num_bytes })
}

fn advance(state: &mut RunState, next: RunState) {
    tracing::trace!(message = "run state change", from = ?state, to = ?next);
    *state = next;
}

fn log_blocks(root: &CanonicalBlock) {
    tracing::debug!(
        message = "normalized station data",
        blocks = ?root.names().collect::<Vec<_>>(),
    );

    for name in DIAGNOSTIC_BLOCKS {
        let block = root.block(name);
        if !block.is_empty() {
            tracing::debug!(
                message = "unpublished block",
                block = name,
                fields = ?block.names().collect::<Vec<_>>(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_all;
    use crate::metrics::StationMetrics;
    use crate::payload::normalize;
    use crate::resolve::Metric;
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;
    use serde_json::json;

    #[test]
    fn test_resolve_all_partial_payload() {
        let root = normalize(&json!({
            "outdoor": {
                "temperature": {"value": "68", "unit": "°F"},
                "humidity": {"value": "55", "unit": "%"},
            }
        }));
        let resolved = resolve_all(&root);

        assert_eq!(Metric::ALL.len(), resolved.len());
        for r in &resolved {
            match r.metric {
                Metric::Temperature => assert!((r.value.unwrap() - 20.0).abs() < 0.05),
                Metric::Humidity => assert_eq!(Some(55.0), r.value),
                _ => assert!(!r.is_present(), "expected {} to be absent", r.metric),
            }
        }
    }

    #[test]
    fn test_resolve_all_full_payload() {
        let root = normalize(&json!({
            "outdoor": {
                "temperature": {"time": "1700000000", "unit": "ºF", "value": "50.0"},
                "feels_like": {"time": "1700000000", "unit": "ºF", "value": "48.2"},
                "humidity": {"time": "1700000000", "unit": "%", "value": "81"},
            },
            "wind": {
                "wind_speed": {"time": "1700000000", "unit": "mph", "value": "10.0"},
                "wind_gust": {"time": "1700000000", "unit": "mph", "value": "20.0"},
                "wind_direction": {"time": "1700000000", "unit": "º", "value": "270"},
            },
            "pressure": {
                "relative": {"time": "1700000000", "unit": "inHg", "value": "29.92"},
                "absolute": {"time": "1700000000", "unit": "inHg", "value": "29.10"},
            },
            "rainfall": {
                "rain_rate": {"time": "1700000000", "unit": "in/hr", "value": "0.10"},
                "daily": {"time": "1700000000", "unit": "in", "value": "0.30"},
            },
            "battery": {"console": {"unit": "V", "value": "4.1"}},
        }));
        let values: Vec<f64> = resolve_all(&root).into_iter().map(|r| r.value.unwrap()).collect();

        assert!((values[0] - 10.0).abs() < 0.05);
        assert_eq!(81.0, values[1]);
        assert!((values[2] - 1013.2).abs() < 0.05);
        assert!((values[3] - 4.4704).abs() < 1e-6);
        assert!((values[4] - 8.9408).abs() < 1e-6);
        assert!((values[5] - 2.54).abs() < 1e-6);
    }

    #[test]
    fn test_resolve_all_publishes_only_present() {
        let root = normalize(&json!({
            "outdoor": {
                "temperature": {"value": "68", "unit": "°F"},
                "humidity": {"value": "55", "unit": "%"},
            }
        }));
        let mut reg = Registry::default();
        let metrics = StationMetrics::new(&mut reg, "AA:BB");
        for r in resolve_all(&root) {
            metrics.observe(&r);
        }

        let mut out = String::new();
        encode(&mut out, &reg).unwrap();

        assert!(out.contains("temperature_c{station_mac=\"AA:BB\"} 20"), "{}", out);
        assert!(out.contains("humidity_pct{station_mac=\"AA:BB\"} 55"), "{}", out);
        for metric in [Metric::Pressure, Metric::WindSpeed, Metric::WindGust, Metric::PrecipitationRate] {
            assert!(!out.contains(&format!("{}{{", metric.name())), "{}", out);
        }
    }
}
