//! `SQLite` schema for the flight store.

/// One row per flight observation. Column names follow [`crate::flight::FlightRecord`].
pub const CREATE_FLIGHT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flight_id TEXT NOT NULL,
    transponder_address TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    heading INTEGER NOT NULL,
    altitude INTEGER NOT NULL,
    ground_speed INTEGER NOT NULL,
    reserved_1 TEXT NOT NULL,
    transponder_type TEXT NOT NULL,
    aircraft_type TEXT NOT NULL,
    registration_1 TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    origin TEXT NOT NULL,
    destination TEXT NOT NULL,
    reserved_2 TEXT NOT NULL,
    vertical_speed INTEGER NOT NULL,
    registration_2 TEXT NOT NULL,
    hint TEXT NOT NULL,
    company TEXT NOT NULL,
    geom TEXT NOT NULL,
    violation INTEGER NOT NULL DEFAULT 0,
    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// Time-window filtering.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flight_timestamp ON flight(timestamp)
";

/// Bounding-box filtering.
pub const CREATE_POSITION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flight_position ON flight(longitude, latitude)
";

/// Key-value pairs, including the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FLIGHT_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_POSITION_INDEX,
    CREATE_METADATA_TABLE,
];

pub(crate) const INSERT_FLIGHT: &str = r"
INSERT INTO flight (
    flight_id, transponder_address, latitude, longitude, heading, altitude,
    ground_speed, reserved_1, transponder_type, aircraft_type, registration_1,
    timestamp, origin, destination, reserved_2, vertical_speed, registration_2,
    hint, company, geom, violation
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
    ?18, ?19, ?20, ?21
)
";

pub(crate) const SEARCH_FLIGHTS: &str = r"
SELECT flight_id, transponder_address, latitude, longitude, heading, altitude,
       ground_speed, reserved_1, transponder_type, aircraft_type, registration_1,
       timestamp, origin, destination, reserved_2, vertical_speed, registration_2,
       hint, company
FROM flight
WHERE latitude BETWEEN ?1 AND ?2
  AND longitude BETWEEN ?3 AND ?4
  AND altitude <= ?5
  AND timestamp BETWEEN ?6 AND ?7
ORDER BY timestamp, id
";
