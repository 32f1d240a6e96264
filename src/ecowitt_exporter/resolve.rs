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

use crate::payload::{CanonicalBlock, RawReading, Reading};
use crate::units::{self, Quantity};
use std::fmt;

/// Where to look for a metric within a normalized payload.
///
/// Exact field names in `block` are tried first, in order. If none of them hold a
/// numeric reading, every field of `block` is scanned in order and the first one whose
/// name contains one of `keywords` (case-insensitive) with a numeric reading is used.
#[derive(Debug)]
pub struct Candidates {
    pub block: &'static str,
    pub fields: &'static [&'static str],
    pub keywords: &'static [&'static str],
}

const TEMPERATURE: Candidates = Candidates {
    block: "outdoor",
    fields: &["temperature", "temp"],
    keywords: &["temp"],
};

const HUMIDITY: Candidates = Candidates {
    block: "outdoor",
    fields: &["humidity", "humi"],
    keywords: &["hum"],
};

const PRESSURE: Candidates = Candidates {
    block: "pressure",
    fields: &["relative", "rel", "absolute", "abs"],
    keywords: &["rel", "relative", "abs", "absolute", "press", "pressure"],
};

const WIND_SPEED: Candidates = Candidates {
    block: "wind",
    fields: &["wind_speed", "speed"],
    keywords: &["wind_speed", "speed", "avg", "wind"],
};

const WIND_GUST: Candidates = Candidates {
    block: "wind",
    fields: &["wind_gust", "gust"],
    keywords: &["gust", "wind_gust", "max"],
};

const PRECIPITATION_RATE: Candidates = Candidates {
    block: "rainfall",
    fields: &["rain_rate", "rainrate", "rate"],
    keywords: &["rain_rate", "rate"],
};

/// Weather readings published for a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindGust,
    PrecipitationRate,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Pressure,
        Metric::WindSpeed,
        Metric::WindGust,
        Metric::PrecipitationRate,
    ];

    /// Name of the gauge this metric is published as.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature_c",
            Self::Humidity => "humidity_pct",
            Self::Pressure => "pressure_hpa",
            Self::WindSpeed => "wind_speed_ms",
            Self::WindGust => "wind_gust_ms",
            Self::PrecipitationRate => "precipitation_rate_mm",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Self::Temperature => "Outdoor temperature in celsius",
            Self::Humidity => "Outdoor relative humidity (0-100)",
            Self::Pressure => "Barometric pressure in hectopascals",
            Self::WindSpeed => "Wind speed in meters per second",
            Self::WindGust => "Wind gust speed in meters per second",
            Self::PrecipitationRate => "Rain rate in millimeters per hour",
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Self::Temperature => Quantity::Temperature,
            Self::Humidity => Quantity::Humidity,
            Self::Pressure => Quantity::Pressure,
            Self::WindSpeed | Self::WindGust => Quantity::Speed,
            Self::PrecipitationRate => Quantity::PrecipitationRate,
        }
    }

    pub fn candidates(&self) -> &'static Candidates {
        match self {
            Self::Temperature => &TEMPERATURE,
            Self::Humidity => &HUMIDITY,
            Self::Pressure => &PRESSURE,
            Self::WindSpeed => &WIND_SPEED,
            Self::WindGust => &WIND_GUST,
            Self::PrecipitationRate => &PRECIPITATION_RATE,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric value in canonical units, `None` if the payload didn't contain it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetric {
    pub metric: Metric,
    pub value: Option<f64>,
}

impl ResolvedMetric {
    /// Convert a reading found for `metric` (if any) to the canonical unit of the metric.
    pub fn from_reading(metric: Metric, reading: Option<Reading>) -> Self {
        let value = reading.map(|r| units::to_canonical(metric.quantity(), r.value, r.unit.as_deref()));
        ResolvedMetric { metric, value }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// Find the reading for `metric` in a normalized payload.
pub fn resolve(root: &CanonicalBlock, metric: Metric) -> Option<Reading> {
    let candidates = metric.candidates();
    let paths: Vec<(&str, &str)> = candidates.fields.iter().map(|f| (candidates.block, *f)).collect();

    lookup_exact(root, &paths).or_else(|| lookup_keyword(&root.block(candidates.block), candidates.keywords))
}

/// Return the first numeric reading at any of the `(block, field)` paths, in order.
pub fn lookup_exact(root: &CanonicalBlock, paths: &[(&str, &str)]) -> Option<Reading> {
    paths.iter().find_map(|(block, field)| {
        root.block(block)
            .get(field)
            .and_then(RawReading::from_value)
            .and_then(|r| r.parse())
    })
}

/// Return the first numeric reading in `block` whose field name contains any of `keywords`.
pub fn lookup_keyword(block: &CanonicalBlock, keywords: &[&str]) -> Option<Reading> {
    block.iter().find_map(|(name, value)| {
        let name = name.to_lowercase();
        if !keywords.iter().any(|k| name.contains(&k.to_lowercase())) {
            return None;
        }

        RawReading::from_value(value).and_then(|r| r.parse())
    })
}
