//! Low-altitude violation rule.
//!
//! A flight violates the rule when it is moving and its altitude is strictly
//! between a configurable floor and a ceiling (500 m by default).

use serde::{Deserialize, Serialize};

use crate::flight::FlightRecord;

/// Default lower altitude bound in metres.
pub const DEFAULT_FLOOR_METERS: f64 = 25.0;

/// Default upper altitude bound in metres.
pub const DEFAULT_CEILING_METERS: f64 = 500.0;

/// Altitude band, in metres, inside which a moving aircraft is a violation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationRule {
    /// Exclusive lower bound.
    pub floor_meters: f64,
    /// Exclusive upper bound.
    pub ceiling_meters: f64,
}

impl Default for ViolationRule {
    fn default() -> Self {
        Self {
            floor_meters: DEFAULT_FLOOR_METERS,
            ceiling_meters: DEFAULT_CEILING_METERS,
        }
    }
}

impl ViolationRule {
    /// Create a rule with the given floor and the default ceiling.
    #[must_use]
    pub fn with_floor(floor_meters: f64) -> Self {
        Self {
            floor_meters,
            ..Self::default()
        }
    }

    /// Whether a single record violates the rule.
    #[must_use]
    pub fn is_violation(&self, record: &FlightRecord) -> bool {
        let altitude = record.altitude_meters();
        altitude < self.ceiling_meters
            && altitude > self.floor_meters
            && record.ground_speed_kmh() > 0.0
    }

    /// The violating subset of `records`, in input order.
    #[must_use]
    pub fn classify<'a>(&self, records: &'a [FlightRecord]) -> Vec<&'a FlightRecord> {
        records.iter().filter(|r| self.is_violation(r)).collect()
    }
}
