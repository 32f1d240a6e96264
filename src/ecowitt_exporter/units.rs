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

//! Conversion of station readings into the units metrics are published in.

const HPA_PER_INHG: f64 = 33.8638866667;
const MS_PER_MPH: f64 = 0.44704;
const MM_PER_IN: f64 = 25.4;

/// Kind of physical quantity a reading measures.
///
/// Each kind has a single canonical unit: degrees celsius, percent, hectopascals,
/// meters per second, or millimeters per hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Humidity,
    Pressure,
    Speed,
    PrecipitationRate,
}

pub fn f_to_c(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn c_to_f(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn inhg_to_hpa(inhg: f64) -> f64 {
    inhg * HPA_PER_INHG
}

pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa / HPA_PER_INHG
}

pub fn mph_to_ms(mph: f64) -> f64 {
    mph * MS_PER_MPH
}

pub fn ms_to_mph(ms: f64) -> f64 {
    ms / MS_PER_MPH
}

pub fn inph_to_mmph(inph: f64) -> f64 {
    inph * MM_PER_IN
}

pub fn mmph_to_inph(mmph: f64) -> f64 {
    mmph / MM_PER_IN
}

/// Convert a value to the canonical unit for `quantity` based on the unit the station reported.
///
/// The unit is matched case-insensitively by marker: anything containing "f" is Fahrenheit,
/// "inhg" is inches of mercury, "mph" is miles per hour, and "in", "in/..." or anything
/// containing "inch" is inches per hour. Values with no unit or a unit without a known
/// marker are assumed to already be canonical and are returned unchanged. Humidity is
/// always returned unchanged.
pub fn to_canonical(quantity: Quantity, value: f64, unit: Option<&str>) -> f64 {
    let unit = match unit {
        Some(u) => u.to_lowercase(),
        None => return value,
    };

    match quantity {
        Quantity::Temperature if unit.contains('f') => f_to_c(value),
        Quantity::Pressure if unit.contains("inhg") => inhg_to_hpa(value),
        Quantity::Speed if unit.contains("mph") => mph_to_ms(value),
        Quantity::PrecipitationRate if is_inches(&unit) => inph_to_mmph(value),
        _ => value,
    }
}

// Plain substring matching on "in" would also catch units like "mm/min"
fn is_inches(unit: &str) -> bool {
    let unit = unit.trim();
    unit == "in" || unit.starts_with("in/") || unit.contains("inch")
}

#[cfg(test)]
mod tests {
    use super::{
        c_to_f, f_to_c, hpa_to_inhg, inhg_to_hpa, inph_to_mmph, mmph_to_inph, mph_to_ms, ms_to_mph, to_canonical,
        Quantity,
    };

    const EPSILON: f64 = 1e-9;

    fn assert_close(expected: f64, actual: f64, tolerance: f64) {
        assert!(
            (expected - actual).abs() <= tolerance,
            "expected {} got {} (tolerance {})",
            expected,
            actual,
            tolerance
        );
    }

    #[test]
    fn test_f_to_c_fixed_points() {
        assert_close(0.0, f_to_c(32.0), EPSILON);
        assert_close(100.0, f_to_c(212.0), EPSILON);
        assert_close(-40.0, f_to_c(-40.0), EPSILON);
    }

    #[test]
    fn test_zero_is_zero() {
        assert_eq!(0.0, mph_to_ms(0.0));
        assert_eq!(0.0, inhg_to_hpa(0.0));
        assert_eq!(0.0, inph_to_mmph(0.0));
    }

    #[test]
    fn test_known_values() {
        assert_close(1013.2, inhg_to_hpa(29.92), 0.05);
        assert_close(4.4704, mph_to_ms(10.0), EPSILON);
        assert_close(25.4, inph_to_mmph(1.0), EPSILON);
    }

    #[test]
    fn test_conversions_invertible() {
        for v in [-40.0, -3.5, 0.0, 0.01, 12.25, 68.0, 1013.25] {
            assert_close(v, c_to_f(f_to_c(v)), EPSILON);
            assert_close(v, hpa_to_inhg(inhg_to_hpa(v)), EPSILON);
            assert_close(v, ms_to_mph(mph_to_ms(v)), EPSILON);
            assert_close(v, mmph_to_inph(inph_to_mmph(v)), EPSILON);
        }
    }

    #[test]
    fn test_conversions_monotonic() {
        let inputs = [-10.0, 0.0, 0.5, 1.0, 30.0, 100.0];
        for pair in inputs.windows(2) {
            assert!(f_to_c(pair[0]) < f_to_c(pair[1]));
            assert!(inhg_to_hpa(pair[0]) < inhg_to_hpa(pair[1]));
            assert!(mph_to_ms(pair[0]) < mph_to_ms(pair[1]));
            assert!(inph_to_mmph(pair[0]) < inph_to_mmph(pair[1]));
        }
    }

    #[test]
    fn test_to_canonical_marked_units() {
        assert_close(20.0, to_canonical(Quantity::Temperature, 68.0, Some("°F")), 0.05);
        assert_close(20.0, to_canonical(Quantity::Temperature, 68.0, Some("ºF")), 0.05);
        assert_close(1013.2, to_canonical(Quantity::Pressure, 29.92, Some("inHg")), 0.05);
        assert_close(4.4704, to_canonical(Quantity::Speed, 10.0, Some("MPH")), EPSILON);
        assert_close(2.54, to_canonical(Quantity::PrecipitationRate, 0.1, Some("in/hr")), EPSILON);
    }

    #[test]
    fn test_to_canonical_unmarked_passes_through() {
        assert_eq!(21.5, to_canonical(Quantity::Temperature, 21.5, None));
        assert_eq!(21.5, to_canonical(Quantity::Temperature, 21.5, Some("℃")));
        assert_eq!(21.5, to_canonical(Quantity::Temperature, 21.5, Some("")));
        assert_eq!(1013.0, to_canonical(Quantity::Pressure, 1013.0, Some("hPa")));
        assert_eq!(3.0, to_canonical(Quantity::Speed, 3.0, Some("m/s")));
        assert_eq!(1.2, to_canonical(Quantity::PrecipitationRate, 1.2, Some("mm/hr")));
    }

    #[test]
    fn test_to_canonical_precipitation_inch_markers() {
        assert_close(2.54, to_canonical(Quantity::PrecipitationRate, 0.1, Some("in")), EPSILON);
        assert_close(2.54, to_canonical(Quantity::PrecipitationRate, 0.1, Some("IN/H")), EPSILON);
        assert_close(2.54, to_canonical(Quantity::PrecipitationRate, 0.1, Some("inches/hour")), EPSILON);
        assert_eq!(0.1, to_canonical(Quantity::PrecipitationRate, 0.1, Some("mm/min")));
        assert_eq!(0.1, to_canonical(Quantity::PrecipitationRate, 0.1, Some("mm/h")));
    }

    #[test]
    fn test_to_canonical_humidity_never_converted() {
        assert_eq!(55.0, to_canonical(Quantity::Humidity, 55.0, Some("%")));
        assert_eq!(55.0, to_canonical(Quantity::Humidity, 55.0, Some("f")));
    }
}
