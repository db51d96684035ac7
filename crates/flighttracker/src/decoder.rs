//! Tolerant decoder for the feed's positional JSON payload.
//!
//! The feed answers with one JSON object. Every key is either a flight id
//! mapping to a positional array, or one of the metadata keys in
//! [`METADATA_KEYS`]. Metadata keys are skipped by name; any other value that
//! is not an array is skipped by shape. Inside an array each field is decoded
//! on its own: a field that fails to decode keeps its zero value and is
//! reported as a [`FieldError`], the record is still emitted.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::flight::FlightRecord;

/// Top-level keys that carry feed metadata rather than flights.
pub const METADATA_KEYS: [&str; 3] = ["full_count", "version", "stats"];

/// A field of [`FlightRecord`] sourced from the positional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Position 0.
    TransponderAddress,
    /// Position 1.
    Latitude,
    /// Position 2.
    Longitude,
    /// Position 3.
    Heading,
    /// Position 4.
    Altitude,
    /// Position 5.
    GroundSpeed,
    /// Position 6.
    Reserved1,
    /// Position 7.
    TransponderType,
    /// Position 8.
    AircraftType,
    /// Position 9.
    Registration1,
    /// Position 10.
    Timestamp,
    /// Position 11.
    Origin,
    /// Position 12.
    Destination,
    /// Position 13.
    Reserved2,
    /// Position 14.
    VerticalSpeed,
    /// Position 15.
    Registration2,
    /// Position 16.
    Hint,
    /// Position 17.
    Company,
}

/// Array position of every field, as dictated by the feed.
pub const LAYOUT: [(usize, Field); 18] = [
    (0, Field::TransponderAddress),
    (1, Field::Latitude),
    (2, Field::Longitude),
    (3, Field::Heading),
    (4, Field::Altitude),
    (5, Field::GroundSpeed),
    (6, Field::Reserved1),
    (7, Field::TransponderType),
    (8, Field::AircraftType),
    (9, Field::Registration1),
    (10, Field::Timestamp),
    (11, Field::Origin),
    (12, Field::Destination),
    (13, Field::Reserved2),
    (14, Field::VerticalSpeed),
    (15, Field::Registration2),
    (16, Field::Hint),
    (17, Field::Company),
];

impl Field {
    /// Column-style name of the field.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TransponderAddress => "transponder_address",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Heading => "heading",
            Self::Altitude => "altitude",
            Self::GroundSpeed => "ground_speed",
            Self::Reserved1 => "reserved_1",
            Self::TransponderType => "transponder_type",
            Self::AircraftType => "aircraft_type",
            Self::Registration1 => "registration_1",
            Self::Timestamp => "timestamp",
            Self::Origin => "origin",
            Self::Destination => "destination",
            Self::Reserved2 => "reserved_2",
            Self::VerticalSpeed => "vertical_speed",
            Self::Registration2 => "registration_2",
            Self::Hint => "hint",
            Self::Company => "company",
        }
    }

    /// Decode `value` into the matching slot of `record`.
    ///
    /// Text fields never fail. Numeric fields fail on anything that is not a
    /// number or a numeric string, leaving the slot untouched.
    fn apply(self, record: &mut FlightRecord, value: Option<&Value>) -> std::result::Result<(), ()> {
        match self {
            Self::Latitude => record.latitude = float(value)?,
            Self::Longitude => record.longitude = float(value)?,
            Self::Heading => record.heading = integer(value)?,
            Self::Altitude => record.altitude = integer(value)?,
            Self::GroundSpeed => record.ground_speed = integer(value)?,
            Self::Timestamp => record.timestamp = integer(value)?,
            Self::VerticalSpeed => record.vertical_speed = integer(value)?,
            Self::TransponderAddress => record.transponder_address = text(value),
            Self::Reserved1 => record.reserved_1 = text(value),
            Self::TransponderType => record.transponder_type = text(value),
            Self::AircraftType => record.aircraft_type = text(value),
            Self::Registration1 => record.registration_1 = text(value),
            Self::Origin => record.origin = text(value),
            Self::Destination => record.destination = text(value),
            Self::Reserved2 => record.reserved_2 = text(value),
            Self::Registration2 => record.registration_2 = text(value),
            Self::Hint => record.hint = text(value),
            Self::Company => record.company = text(value),
        }
        Ok(())
    }
}

/// A numeric field that could not be decoded and was defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// The flight the field belongs to.
    pub flight_id: String,
    /// The field that failed.
    pub field: Field,
    /// Array position of the field.
    pub position: usize,
    /// The raw value, or `None` when the array was too short.
    pub raw: Option<Value>,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.raw {
            Some(raw) => write!(
                f,
                "flight {}: cannot decode {} at position {} from {raw}",
                self.flight_id,
                self.field.name(),
                self.position
            ),
            None => write!(
                f,
                "flight {}: {} missing at position {}",
                self.flight_id,
                self.field.name(),
                self.position
            ),
        }
    }
}

/// Result of decoding one payload.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    /// Decoded records, in no particular order.
    pub records: Vec<FlightRecord>,
    /// Fields that were defaulted while decoding.
    pub field_errors: Vec<FieldError>,
    /// Non-metadata keys whose value was not an array.
    pub skipped: usize,
}

/// Decode a raw feed payload.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] when the payload is not a JSON object.
/// Nothing below the top level ever fails the call.
pub fn decode(raw: &[u8]) -> Result<Decoded> {
    let entries: Map<String, Value> = serde_json::from_slice(raw).map_err(Error::MalformedPayload)?;

    let mut decoded = Decoded::default();
    for (key, value) in &entries {
        if METADATA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Value::Array(values) = value else {
            debug!(flight_id = %key, "Skipping non-array feed entry");
            decoded.skipped += 1;
            continue;
        };
        let record = decode_record(key, values, &mut decoded.field_errors);
        decoded.records.push(record);
    }

    Ok(decoded)
}

/// Decode one positional array into a record, appending any field failures.
pub fn decode_record(
    flight_id: &str,
    values: &[Value],
    field_errors: &mut Vec<FieldError>,
) -> FlightRecord {
    let mut record = FlightRecord::new(flight_id);
    for (position, field) in LAYOUT {
        let value = values.get(position);
        if field.apply(&mut record, value).is_err() {
            let error = FieldError {
                flight_id: flight_id.to_string(),
                field,
                position,
                raw: value.cloned(),
            };
            warn!("{error}");
            field_errors.push(error);
        }
    }
    record
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Non-finite values (`"NaN"`, `"inf"`) are rejected like any other
/// non-numeric placeholder.
fn float(value: Option<&Value>) -> std::result::Result<f64, ()> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).ok_or(())
}

#[allow(clippy::cast_possible_truncation)]
fn integer(value: Option<&Value>) -> std::result::Result<i64, ()> {
    match value {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
                .ok_or(()),
        },
        Some(Value::String(s)) => s.trim().parse().map_err(|_| ()),
        _ => Err(()),
    }
}
