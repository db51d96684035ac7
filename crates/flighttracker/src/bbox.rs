//! Geographic bounding box used to scope feed requests and database searches.
//!
//! A box is written as `"lat,lon^lat,lon"`: the south-west corner, a caret,
//! then the north-east corner.

use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separates the south-west corner from the north-east corner.
pub const CORNER_SEPARATOR: char = '^';

/// Separates latitude from longitude inside a corner.
pub const COORDINATE_SEPARATOR: char = ',';

/// Errors produced while parsing a bounding box string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BboxError {
    /// The string did not split into the expected number of parts.
    #[error("bounding box malformed: expected {expected} parts separated by '{separator}', found {found}")]
    MalformedBoundingBox {
        /// The separator that was missing or repeated.
        separator: char,
        /// Number of parts required.
        expected: usize,
        /// Number of parts found.
        found: usize,
    },

    /// A coordinate token is not a base-10 floating point number.
    #[error("bounding box coordinate '{token}' is not a number: {source}")]
    NumericParse {
        /// The offending token.
        token: String,
        /// The underlying parse error.
        #[source]
        source: ParseFloatError,
    },
}

/// A rectangle given by its south-west and north-east corners, in degrees.
///
/// No range check is applied to the coordinates and the corners are assumed
/// to be ordered (`lat_sw <= lat_ne`, `lon_sw <= lon_ne`); see
/// [`BoundingBox::is_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Latitude of the south-west corner.
    pub lat_sw: f64,
    /// Longitude of the south-west corner.
    pub lon_sw: f64,
    /// Latitude of the north-east corner.
    pub lat_ne: f64,
    /// Longitude of the north-east corner.
    pub lon_ne: f64,
}

impl BoundingBox {
    /// Create a bounding box from its corner coordinates.
    #[must_use]
    pub fn new(lat_sw: f64, lon_sw: f64, lat_ne: f64, lon_ne: f64) -> Self {
        Self {
            lat_sw,
            lon_sw,
            lat_ne,
            lon_ne,
        }
    }

    /// Parse a `"lat,lon^lat,lon"` string.
    ///
    /// # Errors
    ///
    /// Returns [`BboxError::MalformedBoundingBox`] when either separator is
    /// missing or repeated, and [`BboxError::NumericParse`] when a token is not
    /// a number.
    pub fn parse(spec: &str) -> Result<Self, BboxError> {
        let corners: Vec<&str> = spec.split(CORNER_SEPARATOR).collect();
        let [south_west, north_east] = corners.as_slice() else {
            return Err(BboxError::MalformedBoundingBox {
                separator: CORNER_SEPARATOR,
                expected: 2,
                found: corners.len(),
            });
        };

        let (lat_sw, lon_sw) = parse_corner(south_west)?;
        let (lat_ne, lon_ne) = parse_corner(north_east)?;

        Ok(Self::new(lat_sw, lon_sw, lat_ne, lon_ne))
    }

    /// Whether the south-west corner really is south-west of the north-east one.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.lat_sw <= self.lat_ne && self.lon_sw <= self.lon_ne
    }

    /// Whether a point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_sw..=self.lat_ne).contains(&lat) && (self.lon_sw..=self.lon_ne).contains(&lon)
    }

    /// Render the box as a closed WKT polygon.
    ///
    /// Corners are emitted SW, NW, NE, SE and back to SW, each as `lon lat`.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        let sw = wkt_point(self.lon_sw, self.lat_sw);
        let nw = wkt_point(self.lon_sw, self.lat_ne);
        let ne = wkt_point(self.lon_ne, self.lat_ne);
        let se = wkt_point(self.lon_ne, self.lat_sw);
        format!("POLYGON(({sw}, {nw}, {ne}, {se}, {sw}))")
    }
}

impl FromStr for BoundingBox {
    type Err = BboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}{CORNER_SEPARATOR}{},{}",
            self.lat_sw, self.lon_sw, self.lat_ne, self.lon_ne
        )
    }
}

fn parse_corner(corner: &str) -> Result<(f64, f64), BboxError> {
    let tokens: Vec<&str> = corner.split(COORDINATE_SEPARATOR).collect();
    let [lat, lon] = tokens.as_slice() else {
        return Err(BboxError::MalformedBoundingBox {
            separator: COORDINATE_SEPARATOR,
            expected: 2,
            found: tokens.len(),
        });
    };
    Ok((parse_coordinate(lat)?, parse_coordinate(lon)?))
}

fn parse_coordinate(token: &str) -> Result<f64, BboxError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|source| BboxError::NumericParse {
            token: token.to_string(),
            source,
        })
}

fn wkt_point(lon: f64, lat: f64) -> String {
    format!("{lon:.6} {lat:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let bbox = BoundingBox::parse("43.52,1.32^43.70,1.69").unwrap();
        assert_eq!(bbox, BoundingBox::new(43.52, 1.32, 43.70, 1.69));
        assert!(bbox.is_ordered());
    }

    #[test]
    fn test_parse_negative_and_whitespace() {
        let bbox: BoundingBox = " -33.9, 151.1^-33.8 ,151.3".parse().unwrap();
        assert_eq!(bbox, BoundingBox::new(-33.9, 151.1, -33.8, 151.3));
    }

    #[test]
    fn test_parse_missing_corner_separator() {
        let err = BoundingBox::parse("43.52,1.32,43.70,1.69").unwrap_err();
        assert_eq!(
            err,
            BboxError::MalformedBoundingBox {
                separator: '^',
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_parse_too_many_corners() {
        let err = BoundingBox::parse("1,2^3,4^5,6").unwrap_err();
        assert!(matches!(
            err,
            BboxError::MalformedBoundingBox {
                separator: '^',
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_missing_coordinate_separator() {
        let err = BoundingBox::parse("43.52^43.70,1.69").unwrap_err();
        assert!(matches!(
            err,
            BboxError::MalformedBoundingBox {
                separator: ',',
                found: 1,
                ..
            }
        ));
        assert!(err.to_string().contains("','"));
    }

    #[test]
    fn test_parse_non_numeric_token() {
        let err = BoundingBox::parse("43.52,east^43.70,1.69").unwrap_err();
        match err {
            BboxError::NumericParse { token, .. } => assert_eq!(token, "east"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_accepts_out_of_range_values() {
        let bbox = BoundingBox::parse("-120,400^95,500").unwrap();
        assert!((bbox.lat_sw + 120.0).abs() < f64::EPSILON);
        assert!((bbox.lon_ne - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_is_ordered_detects_inverted_box() {
        let bbox = BoundingBox::parse("43.70,1.69^43.52,1.32").unwrap();
        assert!(!bbox.is_ordered());
    }

    #[test]
    fn test_to_wkt_is_closed_five_point_polygon() {
        for input in ["43.52,1.32^43.70,1.69", "-10,-20^10,20", "0,0^0,0"] {
            let wkt = BoundingBox::parse(input).unwrap().to_wkt();
            let inner = wkt
                .strip_prefix("POLYGON((")
                .and_then(|s| s.strip_suffix("))"))
                .expect("polygon wrapper");
            let points: Vec<&str> = inner.split(", ").collect();
            assert_eq!(points.len(), 5, "{wkt}");
            assert_eq!(points.first(), points.last(), "{wkt}");
        }
    }

    #[test]
    fn test_to_wkt_corner_order() {
        let wkt = BoundingBox::new(43.52, 1.32, 43.70, 1.69).to_wkt();
        assert_eq!(
            wkt,
            "POLYGON((1.320000 43.520000, 1.320000 43.700000, 1.690000 43.700000, \
             1.690000 43.520000, 1.320000 43.520000))"
        );
    }

    #[test]
    fn test_contains_includes_edges() {
        let bbox = BoundingBox::new(43.0, 1.0, 44.0, 2.0);
        assert!(bbox.contains(43.5, 1.5));
        assert!(bbox.contains(43.0, 1.0));
        assert!(bbox.contains(44.0, 2.0));
        assert!(!bbox.contains(44.1, 1.5));
        assert!(!bbox.contains(43.5, 0.9));
    }

    #[test]
    fn test_display_round_trips() {
        let bbox = BoundingBox::new(43.52, 1.32, 43.7, 1.69);
        assert_eq!(bbox.to_string(), "43.52,1.32^43.7,1.69");
        assert_eq!(bbox.to_string().parse::<BoundingBox>().unwrap(), bbox);
    }
}
