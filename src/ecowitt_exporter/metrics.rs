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

use crate::resolve::{Metric, ResolvedMetric};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

/// Name of the label identifying the station on every metric.
pub const STATION_MAC_LABEL: &str = "station_mac";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StationLabels {
    pub station_mac: String,
}

type GaugeFamily = Family<StationLabels, Gauge<f64, AtomicU64>>;

/// Holder for metrics that can be set from readings of a single station.
///
/// All metrics are created and registered upon call to `StationMetrics::new()`. Each
/// has a "station_mac" label set to the MAC address of the station. Metrics that are
/// never set for a run have no samples and are not part of what gets pushed.
#[derive(Debug)]
pub struct StationMetrics {
    labels: StationLabels,
    temperature: GaugeFamily,
    humidity: GaugeFamily,
    pressure: GaugeFamily,
    wind_speed: GaugeFamily,
    wind_gust: GaugeFamily,
    precipitation_rate: GaugeFamily,
}

impl StationMetrics {
    /// Create a new `StationMetrics` and register each metric with the provided `Registry`.
    pub fn new(reg: &mut Registry, station_mac: &str) -> Self {
        let metrics = Self {
            labels: StationLabels {
                station_mac: station_mac.to_owned(),
            },
            temperature: GaugeFamily::default(),
            humidity: GaugeFamily::default(),
            pressure: GaugeFamily::default(),
            wind_speed: GaugeFamily::default(),
            wind_gust: GaugeFamily::default(),
            precipitation_rate: GaugeFamily::default(),
        };

        for metric in Metric::ALL {
            reg.register(metric.name(), metric.help(), metrics.gauge(metric).clone());
        }

        metrics
    }

    /// Set the gauge for a resolved metric if it has a value.
    ///
    /// If the metric wasn't found in the payload, the gauge will not be updated. Returns
    /// `true` if the gauge was set.
    pub fn observe(&self, resolved: &ResolvedMetric) -> bool {
        match resolved.value {
            Some(v) => {
                self.gauge(resolved.metric).get_or_create(&self.labels).set(v);
                true
            }
            None => false,
        }
    }

    fn gauge(&self, metric: Metric) -> &GaugeFamily {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
            Metric::Pressure => &self.pressure,
            Metric::WindSpeed => &self.wind_speed,
            Metric::WindGust => &self.wind_gust,
            Metric::PrecipitationRate => &self.precipitation_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StationMetrics;
    use crate::resolve::{Metric, ResolvedMetric};
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;

    fn render(reg: &Registry) -> String {
        let mut out = String::new();
        encode(&mut out, reg).unwrap();
        out
    }

    #[test]
    fn test_observe_present_metric() {
        let mut reg = Registry::default();
        let metrics = StationMetrics::new(&mut reg, "AA:BB:CC:DD:EE:FF");

        assert!(metrics.observe(&ResolvedMetric {
            metric: Metric::Pressure,
            value: Some(1013.5),
        }));

        let out = render(&reg);
        assert!(out.contains("pressure_hpa{station_mac=\"AA:BB:CC:DD:EE:FF\"} 1013.5"), "{}", out);
    }

    #[test]
    fn test_observe_absent_metric_not_exported() {
        let mut reg = Registry::default();
        let metrics = StationMetrics::new(&mut reg, "AA:BB:CC:DD:EE:FF");

        assert!(!metrics.observe(&ResolvedMetric {
            metric: Metric::WindGust,
            value: None,
        }));

        let out = render(&reg);
        for metric in Metric::ALL {
            assert!(!out.contains(&format!("{}{{", metric.name())), "{}", out);
        }
    }
}
