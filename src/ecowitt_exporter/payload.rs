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

//! Normalization of station payloads into a consistent shape.
//!
//! The `data` section of a real time response is usually a mapping of block names
//! (`outdoor`, `wind`, ...) to mappings of field names to readings. Some accounts and
//! firmware versions instead send sequences of `[name, value]` pairs, sequences of
//! objects carrying their own name, or sequences of single entry objects. Everything
//! here turns those into a [`CanonicalBlock`] and never fails: anything unrecognized
//! becomes an empty block.

use serde_json::{Map, Value};

const NAME_ATTRIBUTES: [&str; 3] = ["key", "name", "field"];
const VALUE_ATTRIBUTES: [&str; 2] = ["value", "val"];
const UNIT_ATTRIBUTE: &str = "unit";

/// Strategy for rebuilding a mapping from a sequence. An empty result means "not this shape".
type Strategy = fn(&[Value]) -> Map<String, Value>;

/// Strategies tried in order for sequences, the first non-empty result wins.
const SEQUENCE_STRATEGIES: [Strategy; 3] = [from_pairs, from_keyed_entries, from_single_entries];

/// Mapping of field names to raw readings, in the order the station sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalBlock(Map<String, Value>);

impl CanonicalBlock {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Normalized nested block with the given name, empty if it doesn't exist.
    pub fn block(&self, name: &str) -> CanonicalBlock {
        self.get(name).map(normalize).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CanonicalBlock {
    fn from(m: Map<String, Value>) -> Self {
        CanonicalBlock(m)
    }
}

/// Turn any segment of a payload into a `CanonicalBlock`.
///
/// Mappings are returned as-is. Sequences are rebuilt using the first strategy that
/// produces a non-empty mapping. Anything else results in an empty block.
pub fn normalize(raw: &Value) -> CanonicalBlock {
    match raw {
        Value::Object(m) => CanonicalBlock(m.clone()),
        Value::Array(items) => SEQUENCE_STRATEGIES
            .iter()
            .map(|strategy| strategy(items))
            .find(|m| !m.is_empty())
            .map(CanonicalBlock)
            .unwrap_or_default(),
        _ => CanonicalBlock::default(),
    }
}

/// `[["temperature", "68"], ["humidity", "55"]]`
pub fn from_pairs(items: &[Value]) -> Map<String, Value> {
    items
        .iter()
        .filter_map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(name), value]) => Some((name.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

/// `[{"name": "temperature", "value": "68", "unit": "°F"}]`
pub fn from_keyed_entries(items: &[Value]) -> Map<String, Value> {
    items
        .iter()
        .filter_map(|item| {
            let entry = item.as_object()?;
            let name = NAME_ATTRIBUTES
                .iter()
                .find_map(|attr| entry.get(*attr).and_then(Value::as_str))?;
            Some((name.to_owned(), item.clone()))
        })
        .collect()
}

/// `[{"temperature": "68"}, {"humidity": "55"}]`
pub fn from_single_entries(items: &[Value]) -> Map<String, Value> {
    items
        .iter()
        .filter_map(|item| {
            let entry = item.as_object().filter(|e| e.len() == 1)?;
            entry.iter().next().map(|(k, v)| (k.clone(), v.clone()))
        })
        .collect()
}

/// A reading as the station sent it: either a bare scalar or a value tagged with a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReading {
    Bare(Value),
    Tagged { value: Value, unit: Option<String> },
}

impl RawReading {
    /// Unwrap a stored field into a reading. Mappings must carry a `value` (or `val`)
    /// entry and sequences or nulls are never readings.
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Object(m) => {
                let value = VALUE_ATTRIBUTES.iter().find_map(|attr| m.get(*attr))?;
                let unit = m.get(UNIT_ATTRIBUTE).and_then(Value::as_str).map(str::to_owned);
                Some(RawReading::Tagged {
                    value: value.clone(),
                    unit,
                })
            }
            Value::Array(_) | Value::Null => None,
            other => Some(RawReading::Bare(other.clone())),
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Self::Bare(v) => v,
            Self::Tagged { value, .. } => value,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Bare(_) => None,
            Self::Tagged { unit, .. } => unit.as_deref(),
        }
    }

    /// Typed version of this reading if the value is numeric.
    pub fn parse(&self) -> Option<Reading> {
        parse_number(self.value()).map(|value| Reading {
            value,
            unit: self.unit().map(str::to_owned),
        })
    }
}

/// A reading with a numeric value and the unit the station reported for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: Option<String>,
}

/// Parse JSON numbers and numeric strings as finite floats.
pub fn parse_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if n.is_finite() {
        Some(n)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{from_keyed_entries, from_pairs, from_single_entries, normalize, parse_number, RawReading, Reading};
    use serde_json::{json, Value};

    #[test]
    fn test_normalize_mapping_is_identity() {
        let raw = json!({"outdoor": {"temperature": "68"}, "wind": [["speed", "3"]]});
        let block = normalize(&raw);

        assert_eq!(raw, Value::Object(block.0.clone()));
    }

    #[test]
    fn test_normalize_preserves_order() {
        let raw = json!({"zeta": 1, "alpha": 2, "mid": 3});
        let block = normalize(&raw);

        assert_eq!(vec!["zeta", "alpha", "mid"], block.names().collect::<Vec<_>>());
    }

    #[test]
    fn test_normalize_pairs_last_write_wins() {
        let raw = json!([["temperature", "68"], ["humidity", "55"], ["temperature", "70"]]);
        let block = normalize(&raw);

        assert_eq!(2, block.len());
        assert_eq!(Some(&json!("70")), block.get("temperature"));
        assert_eq!(Some(&json!("55")), block.get("humidity"));
    }

    #[test]
    fn test_normalize_pairs_drops_malformed() {
        let raw = json!([["temperature", "68"], ["lonely"], [1, "2"], "junk", null, ["a", "b", "c"]]);
        let block = normalize(&raw);

        assert_eq!(1, block.len());
        assert_eq!(Some(&json!("68")), block.get("temperature"));
    }

    #[test]
    fn test_normalize_keyed_entries() {
        let raw = json!([
            {"name": "temperature", "value": "68", "unit": "°F"},
            {"key": "humidity", "value": "55"},
            {"field": "gust", "val": 4},
            {"value": "no name"},
        ]);
        let block = normalize(&raw);

        assert_eq!(vec!["temperature", "humidity", "gust"], block.names().collect::<Vec<_>>());
        assert_eq!(
            Some(&json!({"name": "temperature", "value": "68", "unit": "°F"})),
            block.get("temperature")
        );
    }

    #[test]
    fn test_normalize_single_entries_merged() {
        let raw = json!([{"temperature": "68"}, {"humidity": "55"}, {"a": 1, "b": 2}, 7]);
        let block = normalize(&raw);

        assert_eq!(2, block.len());
        assert_eq!(Some(&json!("68")), block.get("temperature"));
        assert_eq!(Some(&json!("55")), block.get("humidity"));
    }

    #[test]
    fn test_normalize_other_shapes_empty() {
        for raw in [json!(null), json!("text"), json!(12), json!(true), json!([]), json!([1, 2, 3])] {
            assert!(normalize(&raw).is_empty(), "expected empty block for {}", raw);
        }
    }

    #[test]
    fn test_strategies_reject_other_shapes() {
        let singles = [json!({"temperature": "68"})];
        let pairs = [json!(["temperature", "68"])];

        assert!(from_pairs(&singles).is_empty());
        assert!(from_keyed_entries(&pairs).is_empty());
        assert!(from_single_entries(&pairs).is_empty());
    }

    #[test]
    fn test_block_normalizes_nested() {
        let block = normalize(&json!({"wind": [["wind_speed", "3"]], "outdoor": 5}));

        assert_eq!(Some(&json!("3")), block.block("wind").get("wind_speed"));
        assert!(block.block("outdoor").is_empty());
        assert!(block.block("rainfall").is_empty());
    }

    #[test]
    fn test_raw_reading_tagged() {
        let reading = RawReading::from_value(&json!({"time": "1", "unit": "°F", "value": "68"})).unwrap();

        assert_eq!(Some("°F"), reading.unit());
        assert_eq!(
            Some(Reading {
                value: 68.0,
                unit: Some("°F".to_owned())
            }),
            reading.parse()
        );
    }

    #[test]
    fn test_raw_reading_val_alias() {
        let reading = RawReading::from_value(&json!({"val": 3.5})).unwrap();

        assert_eq!(None, reading.unit());
        assert_eq!(Some(3.5), reading.parse().map(|r| r.value));
    }

    #[test]
    fn test_raw_reading_bare_and_invalid() {
        assert_eq!(
            Some(RawReading::Bare(json!("12.5"))),
            RawReading::from_value(&json!("12.5"))
        );
        assert_eq!(None, RawReading::from_value(&json!({"unit": "mph"})));
        assert_eq!(None, RawReading::from_value(&json!([1, 2])));
        assert_eq!(None, RawReading::from_value(&json!(null)));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(Some(12.5), parse_number(&json!(12.5)));
        assert_eq!(Some(-3.0), parse_number(&json!(" -3 ")));
        assert_eq!(None, parse_number(&json!("--")));
        assert_eq!(None, parse_number(&json!("NaN")));
        assert_eq!(None, parse_number(&json!("inf")));
        assert_eq!(None, parse_number(&json!(true)));
        assert_eq!(None, parse_number(&json!(null)));
    }
}
