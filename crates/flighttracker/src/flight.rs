//! Core flight types for flighttracker.
//!
//! A [`FlightRecord`] is one observation of one aircraft at fetch time. Records
//! live only for the duration of a pipeline cycle; persistence is entirely up
//! to the sink that receives them.

use serde::{Deserialize, Serialize};

/// Metres per foot.
pub const FEET_TO_METERS: f64 = 0.3048;

/// Kilometres per hour per knot.
pub const KNOTS_TO_KMH: f64 = 1.852;

/// One aircraft observation decoded from the feed.
///
/// Every field that could not be decoded holds its zero value (`0`, `0.0` or
/// an empty string).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Feed key for this flight; unique within a batch.
    pub flight_id: String,
    /// 24-bit ICAO transponder address, hex encoded.
    pub transponder_address: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Track over ground in degrees.
    pub heading: i64,
    /// Altitude in feet.
    pub altitude: i64,
    /// Ground speed in knots.
    pub ground_speed: i64,
    /// Undocumented feed flag at position 6.
    pub reserved_1: String,
    /// Transponder / receiver type.
    pub transponder_type: String,
    /// ICAO aircraft type designator.
    pub aircraft_type: String,
    /// Primary registration.
    pub registration_1: String,
    /// Feed timestamp, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Origin airport code.
    pub origin: String,
    /// Destination airport code.
    pub destination: String,
    /// Undocumented feed flag at position 13.
    pub reserved_2: String,
    /// Vertical speed in feet per minute.
    pub vertical_speed: i64,
    /// Secondary registration / callsign.
    pub registration_2: String,
    /// Free-text hint.
    pub hint: String,
    /// Operating company.
    pub company: String,
}

impl FlightRecord {
    /// Create an empty record for the given flight id.
    #[must_use]
    pub fn new(flight_id: impl Into<String>) -> Self {
        Self {
            flight_id: flight_id.into(),
            ..Self::default()
        }
    }

    /// Altitude converted to metres.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn altitude_meters(&self) -> f64 {
        self.altitude as f64 * FEET_TO_METERS
    }

    /// Ground speed converted to km/h.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ground_speed_kmh(&self) -> f64 {
        self.ground_speed as f64 * KNOTS_TO_KMH
    }

    /// The position as a WKT point literal, `POINT(lon lat)`.
    #[must_use]
    pub fn wkt_point(&self) -> String {
        format!("POINT({:.6} {:.6})", self.longitude, self.latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults_everything_but_id() {
        let record = FlightRecord::new("abc123");
        assert_eq!(record.flight_id, "abc123");
        assert_eq!(record.altitude, 0);
        assert!(record.company.is_empty());
    }

    #[test]
    fn test_unit_conversions() {
        let mut record = FlightRecord::new("x");
        record.altitude = 1000;
        record.ground_speed = 100;

        assert!((record.altitude_meters() - 304.8).abs() < 1e-9);
        assert!((record.ground_speed_kmh() - 185.2).abs() < 1e-9);
    }

    #[test]
    fn test_wkt_point_is_lon_lat() {
        let mut record = FlightRecord::new("x");
        record.latitude = 43.6;
        record.longitude = 1.4;
        assert_eq!(record.wkt_point(), "POINT(1.400000 43.600000)");
    }

    #[test]
    fn test_serialization_field_names() {
        let record = FlightRecord::new("abc123");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["flight_id"], "abc123");
        assert!(json.get("ground_speed").is_some());
        assert!(json.get("registration_2").is_some());
    }
}
