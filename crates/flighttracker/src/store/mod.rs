//! `SQLite` storage for flight observations.
//!
//! The database sink writes through [`FlightStore::insert_batch`]; the HTTP
//! search endpoint and the `search` command read through
//! [`FlightStore::search`] on their own connection.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use crate::bbox::BoundingBox;
use crate::classifier::ViolationRule;
use crate::error::{Error, Result};
use crate::flight::FlightRecord;

/// Layout of search time bounds.
pub const SEARCH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Storage engine for flight records.
#[derive(Debug)]
pub struct FlightStore {
    path: PathBuf,
    conn: Connection,
}

impl FlightStore {
    /// Open or create a flight database at the given path.
    ///
    /// Creates the parent directories if needed, applies pending migrations
    /// and checks the connection with a trivial query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, migrated or queried.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening flight store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets searches read while the sink writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        let store = Self { path, conn };
        store.ping()?;
        info!("Flight store opened at {}", store.path.display());
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that the connection answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the trivial query fails.
    pub fn ping(&self) -> Result<()> {
        let one: i64 = self.conn.query_row("SELECT 1", [], |row| row.get(0))?;
        if one == 1 {
            Ok(())
        } else {
            Err(Error::internal("SELECT 1 returned an unexpected value"))
        }
    }

    /// Insert a batch in one transaction, flagging rows that violate `rule`.
    ///
    /// Either every row is stored or none is. Returns the number of rows
    /// inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; the transaction is rolled back.
    pub fn insert_batch(&mut self, records: &[FlightRecord], rule: &ViolationRule) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(schema::INSERT_FLIGHT)?;
            for record in records {
                stmt.execute(params![
                    record.flight_id,
                    record.transponder_address,
                    record.latitude,
                    record.longitude,
                    record.heading,
                    record.altitude,
                    record.ground_speed,
                    record.reserved_1,
                    record.transponder_type,
                    record.aircraft_type,
                    record.registration_1,
                    record.timestamp,
                    record.origin,
                    record.destination,
                    record.reserved_2,
                    record.vertical_speed,
                    record.registration_2,
                    record.hint,
                    record.company,
                    record.wkt_point(),
                    rule.is_violation(record),
                ])?;
            }
        }
        tx.commit()?;

        debug!(rows = records.len(), "Inserted flight batch");
        Ok(records.len())
    }

    /// Records inside the query's box, at or below its altitude threshold and
    /// within its time window. All bounds are inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<FlightRecord>> {
        let bbox = &query.bbox;
        debug!(
            polygon = %bbox.to_wkt(),
            alt_threshold_feet = query.alt_threshold_feet,
            from = %query.from,
            to = %query.to,
            "Searching flights"
        );

        let mut stmt = self.conn.prepare_cached(schema::SEARCH_FLIGHTS)?;
        let records = stmt
            .query_map(
                params![
                    bbox.lat_sw.min(bbox.lat_ne),
                    bbox.lat_sw.max(bbox.lat_ne),
                    bbox.lon_sw.min(bbox.lon_ne),
                    bbox.lon_sw.max(bbox.lon_ne),
                    query.alt_threshold_feet,
                    query.from.timestamp(),
                    query.to.timestamp(),
                ],
                Self::row_to_record,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Total number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM flight", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Number of stored rows flagged as violations.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_violations(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM flight WHERE violation = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Close the connection, reporting any error from `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be closed cleanly.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| Error::DatabaseQuery(err))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FlightRecord> {
        Ok(FlightRecord {
            flight_id: row.get(0)?,
            transponder_address: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            heading: row.get(4)?,
            altitude: row.get(5)?,
            ground_speed: row.get(6)?,
            reserved_1: row.get(7)?,
            transponder_type: row.get(8)?,
            aircraft_type: row.get(9)?,
            registration_1: row.get(10)?,
            timestamp: row.get(11)?,
            origin: row.get(12)?,
            destination: row.get(13)?,
            reserved_2: row.get(14)?,
            vertical_speed: row.get(15)?,
            registration_2: row.get(16)?,
            hint: row.get(17)?,
            company: row.get(18)?,
        })
    }
}

/// A validated search over stored flights.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Area to search.
    pub bbox: BoundingBox,
    /// Maximum altitude in feet, inclusive.
    pub alt_threshold_feet: i64,
    /// Start of the time window, inclusive.
    pub from: DateTime<Utc>,
    /// End of the time window, inclusive.
    pub to: DateTime<Utc>,
}

impl SearchQuery {
    /// Validate raw search parameters as received from a caller.
    ///
    /// # Errors
    ///
    /// Returns a validation error (see [`Error::is_validation_error`]) when a
    /// parameter is missing or malformed, or when the window ends before it
    /// starts.
    pub fn from_params(
        bbox: Option<&str>,
        alt_threshold_feet: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Self> {
        let bbox = BoundingBox::parse(required("bbox", bbox)?)?;

        let raw_alt = required("altThresholdFeet", alt_threshold_feet)?;
        let alt_threshold_feet = raw_alt.trim().parse::<i64>().map_err(|e| {
            Error::invalid_parameter("altThresholdFeet", format!("'{raw_alt}' is not an integer: {e}"))
        })?;

        let from = parse_search_timestamp(required("fromTimeStamp", from)?)?;
        let to = parse_search_timestamp(required("toTimeStamp", to)?)?;
        if to < from {
            return Err(Error::invalid_parameter(
                "toTimeStamp",
                format!("window ends ({to}) before it starts ({from})"),
            ));
        }

        Ok(Self {
            bbox,
            alt_threshold_feet,
            from,
            to,
        })
    }
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::invalid_parameter(name, "missing")),
    }
}

/// Parse a `YYYY-MM-DDTHH:MM:SS` search bound, read as UTC.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] if the value does not match the layout.
pub fn parse_search_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), SEARCH_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| Error::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}
