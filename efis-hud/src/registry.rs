//! SQLite aircraft registry: WAL mode, 3 tables.
//!
//! Schema: aircraft (by N-number), airlines (by ICAO prefix), sightings
//! (identity seen per transponder address). The registry is the
//! [`IdentityLookup`] the target table consults; airline names missing from
//! the `airlines` table fall back to the built-in prefix list.

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use serde::Serialize;
use std::path::Path;

use efis_core::identity::{lookup_operator, AircraftRecord, IdentityLookup};
use efis_core::targets::TargetEvent;
use efis_core::types::{address_from_hex, address_to_string};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS aircraft (
    n_number TEXT PRIMARY KEY,
    manufacturer TEXT,
    model TEXT,
    year INTEGER,
    owner TEXT
);

CREATE TABLE IF NOT EXISTS airlines (
    prefix TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sightings (
    address TEXT PRIMARY KEY,
    n_number TEXT,
    flight_number TEXT,
    airline TEXT,
    first_seen REAL NOT NULL,
    last_seen REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sightings_n_number ON sightings(n_number);
"#;

/// Normalise a tail number for storage and lookup.
fn normalize(n_number: &str) -> String {
    n_number.trim().to_ascii_uppercase()
}

/// Airline prefix of a flight-number callsign (`DAL123` → `DAL`).
fn flight_prefix(callsign: &str) -> Option<String> {
    let cs = callsign.trim();
    let bytes = cs.as_bytes();
    if bytes.len() < 4 || !bytes[3].is_ascii_digit() {
        return None;
    }
    cs.get(..3).map(str::to_ascii_uppercase)
}

/// SQLite registry of known aircraft and airlines.
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open or create a registry at the given path.
    pub fn open(path: &str) -> SqlResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = Path::new(path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Registry { conn })
    }

    /// Open in-memory registry (for testing).
    pub fn open_memory() -> SqlResult<Self> {
        Self::open(":memory:")
    }

    // -----------------------------------------------------------------------
    // Aircraft
    // -----------------------------------------------------------------------

    /// Insert or replace an aircraft record.
    pub fn add_aircraft(&self, rec: &AircraftRecord) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO aircraft (n_number, manufacturer, model, year, owner)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                normalize(&rec.n_number),
                rec.manufacturer,
                rec.model,
                rec.year,
                rec.owner
            ],
        )?;
        Ok(())
    }

    pub fn get_aircraft(&self, n_number: &str) -> SqlResult<Option<AircraftRecord>> {
        self.conn
            .query_row(
                "SELECT n_number, manufacturer, model, year, owner
                 FROM aircraft WHERE n_number = ?1",
                params![normalize(n_number)],
                |row| {
                    Ok(AircraftRecord {
                        n_number: row.get(0)?,
                        manufacturer: row.get(1)?,
                        model: row.get(2)?,
                        year: row.get(3)?,
                        owner: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    // -----------------------------------------------------------------------
    // Airlines
    // -----------------------------------------------------------------------

    pub fn add_airline(&self, prefix: &str, name: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO airlines (prefix, name) VALUES (?1, ?2)",
            params![prefix.trim().to_ascii_uppercase(), name],
        )?;
        Ok(())
    }

    /// Operator for a flight number: registry first, then the built-in list.
    pub fn airline_name(&self, flight_number: &str) -> SqlResult<Option<String>> {
        let Some(prefix) = flight_prefix(flight_number) else {
            return Ok(None);
        };
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM airlines WHERE prefix = ?1",
                params![prefix],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored.or_else(|| lookup_operator(flight_number).map(str::to_string)))
    }

    // -----------------------------------------------------------------------
    // Sightings
    // -----------------------------------------------------------------------

    /// Record target events from the target table.
    pub fn record_events(&self, events: &[TargetEvent]) -> SqlResult<()> {
        for event in events {
            match event {
                TargetEvent::NewTarget {
                    address,
                    n_number,
                    timestamp,
                    ..
                } => {
                    self.conn.execute(
                        "INSERT INTO sightings (address, n_number, first_seen, last_seen)
                         VALUES (?1, ?2, ?3, ?3)
                         ON CONFLICT(address) DO UPDATE SET
                            n_number = COALESCE(sightings.n_number, excluded.n_number),
                            last_seen = excluded.last_seen",
                        params![address_to_string(*address), n_number, timestamp],
                    )?;
                }
                TargetEvent::FlightNumber {
                    address,
                    flight_number,
                    airline,
                    timestamp,
                } => {
                    self.conn.execute(
                        "UPDATE sightings SET flight_number = ?2, airline = ?3, last_seen = ?4
                         WHERE address = ?1",
                        params![address_to_string(*address), flight_number, airline, timestamp],
                    )?;
                }
                TargetEvent::Updated { address, timestamp } => {
                    self.conn.execute(
                        "UPDATE sightings SET last_seen = MAX(last_seen, ?2) WHERE address = ?1",
                        params![address_to_string(*address), timestamp],
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn get_sighting(&self, address: &str) -> SqlResult<Option<SightingRow>> {
        let Some(addr) = address_from_hex(address.trim()) else {
            return Ok(None);
        };
        self.conn
            .query_row(
                "SELECT address, n_number, flight_number, airline, first_seen, last_seen
                 FROM sightings WHERE address = ?1",
                params![address_to_string(addr)],
                |row| {
                    Ok(SightingRow {
                        address: row.get(0)?,
                        n_number: row.get(1)?,
                        flight_number: row.get(2)?,
                        airline: row.get(3)?,
                        first_seen: row.get(4)?,
                        last_seen: row.get(5)?,
                    })
                },
            )
            .optional()
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    fn count(&self, table: &str) -> i64 {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            aircraft: self.count("aircraft"),
            airlines: self.count("airlines"),
            sightings: self.count("sightings"),
        }
    }
}

impl IdentityLookup for Registry {
    fn find_aircraft_by_n_number(&self, n_number: &str) -> Option<AircraftRecord> {
        match self.get_aircraft(n_number) {
            Ok(rec) => rec,
            Err(e) => {
                log::warn!("aircraft lookup for {n_number} failed: {e}");
                None
            }
        }
    }

    fn check_commercial_name(&self, flight_number: &str) -> Option<String> {
        match self.airline_name(flight_number) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("airline lookup for {flight_number} failed: {e}");
                lookup_operator(flight_number).map(str::to_string)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SightingRow {
    pub address: String,
    pub n_number: Option<String>,
    pub flight_number: Option<String>,
    pub airline: Option<String>,
    pub first_seen: f64,
    pub last_seen: f64,
}

#[derive(Debug, Serialize)]
pub struct RegistryStats {
    pub aircraft: i64,
    pub airlines: i64,
    pub sightings: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
