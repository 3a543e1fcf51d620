//! Coordinate normalization, rounding keys, and great-circle distance

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Mean Earth radius in meters (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Scale divisors tried, in order, for values stored as scaled integers.
const SCALE_DIVISORS: [f64; 4] = [1e3, 1e4, 1e5, 1e6];

pub const LAT_LIMIT: f64 = 90.0;
pub const LNG_LIMIT: f64 = 180.0;

/// A normalized geographic coordinate in decimal degrees.
///
/// Invariant: `|latitude| <= 90` and `|longitude| <= 180`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Why a raw value could not be normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizationError {
    /// Value was missing or not parseable as a decimal number.
    Parse(String),
    /// Value stayed out of range through every scale divisor.
    OutOfRange(f64),
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(raw) => write!(f, "not a decimal number: '{}'", raw),
            Self::OutOfRange(v) => write!(f, "out of range at every scale: {}", v),
        }
    }
}

impl std::error::Error for NormalizationError {}

/// Parse a raw JSON value (number or numeric string) as a decimal.
fn parse_decimal(raw: &Value) -> Result<f64, NormalizationError> {
    match raw {
        Value::Number(n) => {
            n.as_f64().ok_or_else(|| NormalizationError::Parse(n.to_string()))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<f64>()
                .map_err(|_| NormalizationError::Parse(trimmed.to_string()))
        }
        other => Err(NormalizationError::Parse(other.to_string())),
    }
}

/// Normalize one raw value against a degree limit.
///
/// In-range values pass through unchanged. Out-of-range values are divided
/// by 10^3..10^6 in order; the first in-range quotient wins. Feeds that
/// store coordinates as scaled integers land here.
pub fn normalize_value(raw: &Value, limit: f64) -> Result<f64, NormalizationError> {
    let v = parse_decimal(raw)?;
    if !v.is_finite() {
        return Err(NormalizationError::Parse(v.to_string()));
    }
    if v.abs() <= limit {
        return Ok(v);
    }
    for divisor in SCALE_DIVISORS {
        let scaled = v / divisor;
        if scaled.abs() <= limit {
            return Ok(scaled);
        }
    }
    Err(NormalizationError::OutOfRange(v))
}

/// Normalize a raw (lat, lng) pair. Both sides must succeed.
pub fn normalize_pair(raw_lat: &Value, raw_lng: &Value) -> Result<Coordinate, NormalizationError> {
    let latitude = normalize_value(raw_lat, LAT_LIMIT)?;
    let longitude = normalize_value(raw_lng, LNG_LIMIT)?;
    Ok(Coordinate { latitude, longitude })
}

/// Deduplication key from a coordinate rounded to `precision` decimals.
pub fn resolution_key(coord: &Coordinate, precision: u32) -> String {
    let p = precision as usize;
    format!(
        "{:.p$},{:.p$}",
        round_to(coord.latitude, precision),
        round_to(coord.longitude, precision),
        p = p
    )
}

/// Round to a fixed number of decimal places.
pub fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (v * factor).round() / factor
}

/// Great-circle distance in meters (haversine).
pub fn haversine_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_range_is_identity() {
        assert_eq!(normalize_value(&json!(-22.90277), LAT_LIMIT).unwrap(), -22.90277);
        assert_eq!(normalize_value(&json!(179.9), LNG_LIMIT).unwrap(), 179.9);
        assert_eq!(normalize_value(&json!(90.0), LAT_LIMIT).unwrap(), 90.0);
    }

    #[test]
    fn test_scaled_integer_feed() {
        // Coordinates stored as micro-degrees recover via /10^6
        let lat = normalize_value(&json!(-22902770), LAT_LIMIT).unwrap();
        let lng = normalize_value(&json!(-43132720), LNG_LIMIT).unwrap();
        assert!((lat - (-22.90277)).abs() < 1e-9);
        assert!((lng - (-43.13272)).abs() < 1e-9);
    }

    #[test]
    fn test_first_in_range_divisor_wins() {
        // 123456 / 10^3 = 123.456 fits the longitude limit before 10^4 is tried
        let lng = normalize_value(&json!(123456), LNG_LIMIT).unwrap();
        assert!((lng - 123.456).abs() < 1e-9);
    }

    #[test]
    fn test_string_input_parses() {
        let lat = normalize_value(&json!("  -7.12509 "), LAT_LIMIT).unwrap();
        assert!((lat - (-7.12509)).abs() < 1e-12);
    }

    #[test]
    fn test_non_numeric_is_parse_error() {
        assert!(matches!(
            normalize_value(&json!("north-ish"), LAT_LIMIT),
            Err(NormalizationError::Parse(_))
        ));
        assert!(matches!(
            normalize_value(&Value::Null, LAT_LIMIT),
            Err(NormalizationError::Parse(_))
        ));
    }

    #[test]
    fn test_no_divisor_fits_is_out_of_range() {
        // 91 * 10^6 scaled down ends at 91.0, still beyond the latitude limit
        assert!(matches!(
            normalize_value(&json!(91_000_000.0f64 * 1000.0), LAT_LIMIT),
            Err(NormalizationError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_normalize_pair_requires_both() {
        assert!(normalize_pair(&json!(10.0), &json!("bad")).is_err());
        assert!(normalize_pair(&json!("bad"), &json!(10.0)).is_err());
        let c = normalize_pair(&json!(-22902770), &json!(-43132720)).unwrap();
        assert!((c.latitude - (-22.90277)).abs() < 1e-9);
        assert!((c.longitude - (-43.13272)).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_key_rounding() {
        let a = Coordinate::new(-7.1250904, -34.8387896);
        let b = Coordinate::new(-7.1250896, -34.8387904);
        assert_eq!(resolution_key(&a, 6), resolution_key(&b, 6));
        assert_eq!(resolution_key(&a, 6), "-7.125090,-34.838790");
    }

    #[test]
    fn test_resolution_key_precision_knob() {
        // One micro-degree apart: distinct at 6 decimals, merged at 5
        let a = Coordinate::new(-7.125090, -34.838783);
        let b = Coordinate::new(-7.125091, -34.838784);
        assert_ne!(resolution_key(&a, 6), resolution_key(&b, 6));
        assert_eq!(resolution_key(&a, 5), resolution_key(&b, 5));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Paris to London, roughly 343 km
        let paris = Coordinate::new(48.8566, 2.3522);
        let london = Coordinate::new(51.5074, -0.1278);
        let d = haversine_m(&paris, &london);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {}", d);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = Coordinate::new(-7.12509, -34.838783);
        assert_eq!(haversine_m(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_small_offset_magnitude() {
        // 0.001 deg of latitude is ~111 m anywhere
        let a = Coordinate::new(-7.125, -34.838);
        let b = Coordinate::new(-7.124, -34.838);
        let d = haversine_m(&a, &b);
        assert!((d - 111.0).abs() < 2.0, "got {}", d);
    }
}
