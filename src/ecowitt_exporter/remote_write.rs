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

//! Prometheus remote write (version 0.1.0) encoding of resolved metrics.
//!
//! Only the subset of the `prometheus.WriteRequest` protobuf needed for gauge samples
//! is declared here. The encoded request is compressed with the snappy block format.

use crate::metrics::STATION_MAC_LABEL;
use crate::resolve::ResolvedMetric;
use prost::Message;
use std::time::{SystemTime, UNIX_EPOCH};

pub const CONTENT_TYPE: &str = "application/x-protobuf";
pub const CONTENT_ENCODING: &str = "snappy";
pub const VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
pub const VERSION: &str = "0.1.0";

const NAME_LABEL: &str = "__name__";

#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    /// Milliseconds since the unix epoch.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// Build a write request with one series per present metric, all sharing `timestamp`.
///
/// Labels within each series are sorted by name as receivers expect.
pub fn write_request(metrics: &[ResolvedMetric], station_mac: &str, timestamp: i64) -> WriteRequest {
    let timeseries = metrics
        .iter()
        .filter_map(|r| r.value.map(|v| (r.metric, v)))
        .map(|(metric, value)| TimeSeries {
            labels: vec![
                Label {
                    name: NAME_LABEL.to_owned(),
                    value: metric.name().to_owned(),
                },
                Label {
                    name: STATION_MAC_LABEL.to_owned(),
                    value: station_mac.to_owned(),
                },
            ],
            samples: vec![Sample { value, timestamp }],
        })
        .collect();

    WriteRequest { timeseries }
}

/// Protobuf encode and snappy compress a write request.
pub fn encode(req: &WriteRequest) -> Result<Vec<u8>, snap::Error> {
    snap::raw::Encoder::new().compress_vec(&req.encode_to_vec())
}

/// Current time in milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{encode, write_request, WriteRequest};
    use crate::resolve::{Metric, ResolvedMetric};
    use prost::Message;

    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    #[test]
    fn test_write_request_only_present_metrics() {
        let metrics = vec![
            ResolvedMetric {
                metric: Metric::Temperature,
                value: Some(20.5),
            },
            ResolvedMetric {
                metric: Metric::Pressure,
                value: None,
            },
        ];

        let req = write_request(&metrics, MAC, 1_700_000_000_000);

        assert_eq!(1, req.timeseries.len());
        let series = &req.timeseries[0];
        let labels: Vec<(&str, &str)> = series
            .labels
            .iter()
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect();
        assert_eq!(vec![("__name__", "temperature_c"), ("station_mac", MAC)], labels);
        assert_eq!(1, series.samples.len());
        assert_eq!(20.5, series.samples[0].value);
        assert_eq!(1_700_000_000_000, series.samples[0].timestamp);
    }

    #[test]
    fn test_encode_is_snappy_compressed_protobuf() {
        let metrics = vec![ResolvedMetric {
            metric: Metric::WindSpeed,
            value: Some(3.0),
        }];
        let req = write_request(&metrics, MAC, 42);

        let body = encode(&req).unwrap();
        let raw = snap::raw::Decoder::new().decompress_vec(&body).unwrap();
        let decoded = WriteRequest::decode(raw.as_slice()).unwrap();

        assert_eq!(req, decoded);
    }

    #[test]
    fn test_write_request_no_metrics() {
        let req = write_request(&[], MAC, 42);
        assert!(req.timeseries.is_empty());
    }
}
