//! Traffic target table keyed by transponder address.
//!
//! Pure logic, no I/O. `upsert()` folds a traffic report into the table and
//! returns `TargetEvent`s for the caller to log or persist.
//!
//! Identity handling: many transponders alternate between broadcasting the
//! tail number and the flight number. The first non-blank callsign seen for
//! an address is kept as its N-number for the whole session; any later
//! callsign that matches neither stored value becomes the flight number.
//! Identities outlive eviction so a target that drops out and returns keeps
//! its N-number, until the address has been silent for
//! `identity_retention` timeouts.

use std::collections::HashMap;

use serde::Serialize;

use crate::gdl90::TrafficReport;
use crate::identity::{AircraftRecord, AirlineTable, IdentityLookup};
use crate::types::*;

/// Targets are dropped after this many seconds without a report.
pub const TARGET_TIMEOUT: f64 = 60.0;

/// Identities are forgotten after this many target timeouts of silence.
pub const IDENTITY_RETENTION: f64 = 10.0;

const EARTH_RADIUS_MI: f64 = 3958.8;
const KNOTS_TO_MPH: f64 = 1.15078;

// ---------------------------------------------------------------------------
// Events (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TargetEvent {
    /// First report for this address (or first since it was evicted).
    NewTarget {
        address: Address,
        n_number: Option<String>,
        aircraft: Option<AircraftRecord>,
        timestamp: f64,
    },
    /// A callsign distinct from the N-number arrived.
    FlightNumber {
        address: Address,
        flight_number: String,
        airline: Option<String>,
        timestamp: f64,
    },
    Updated { address: Address, timestamp: f64 },
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Identity {
    pub n_number: Option<String>,
    pub flight_number: Option<String>,
    pub aircraft: Option<AircraftRecord>,
    pub airline: Option<String>,
}

/// Identity plus the last time its address reported.
#[derive(Debug, Default)]
struct IdentityEntry {
    identity: Identity,
    last_seen: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityChange {
    None,
    NNumber,
    FlightNumber,
}

// ---------------------------------------------------------------------------
// Target state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Target {
    pub address: Address,
    /// Callsign from the latest report.
    pub callsign: String,
    pub identity: Identity,
    pub alert_status: u8,
    pub address_type: u8,
    pub lat: f64,
    pub lon: f64,
    pub altitude: Option<i32>,
    /// Knots.
    pub speed: Option<u32>,
    pub track: Option<f64>,
    /// Feet per minute.
    pub vspeed: Option<i32>,
    pub emitter_category: u8,
    pub nic: u8,
    pub nacp: u8,
    /// Statute miles from ownship.
    pub dist: Option<f64>,
    /// Bearing from ownship, 0..360.
    pub bearing: Option<f64>,
    pub first_seen: f64,
    pub last_seen: f64,
    pub msg_count: u64,
}

impl Target {
    fn new(report: &TrafficReport, identity: Identity, timestamp: f64) -> Self {
        let mut t = Target {
            address: report.address,
            callsign: String::new(),
            identity,
            alert_status: 0,
            address_type: 0,
            lat: 0.0,
            lon: 0.0,
            altitude: None,
            speed: None,
            track: None,
            vspeed: None,
            emitter_category: 0,
            nic: 0,
            nacp: 0,
            dist: None,
            bearing: None,
            first_seen: timestamp,
            last_seen: timestamp,
            msg_count: 0,
        };
        t.apply(report);
        t
    }

    fn apply(&mut self, r: &TrafficReport) {
        if !r.callsign.is_empty() {
            self.callsign = r.callsign.clone();
        }
        self.alert_status = r.alert_status;
        self.address_type = r.address_type;
        self.lat = r.lat;
        self.lon = r.lon;
        self.altitude = r.altitude;
        self.speed = r.h_velocity;
        self.track = r.track;
        self.vspeed = r.v_velocity.map(|v| v.fpm());
        self.emitter_category = r.emitter_category;
        self.nic = r.nic;
        self.nacp = r.nacp;
    }

    pub fn speed_mph(&self) -> Option<f64> {
        self.speed.map(|kt| (kt as f64 * KNOTS_TO_MPH * 10.0).round() / 10.0)
    }

    /// Best label for display: flight number, then N-number, then callsign.
    pub fn label(&self) -> &str {
        self.identity
            .flight_number
            .as_deref()
            .or(self.identity.n_number.as_deref())
            .unwrap_or(&self.callsign)
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Great-circle distance in statute miles.
pub fn haversine_mi(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_MI * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial great-circle bearing from point 1 to point 2, degrees 0..360.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

// ---------------------------------------------------------------------------
// Target table
// ---------------------------------------------------------------------------

pub struct TargetTable {
    pub targets: HashMap<Address, Target>,
    identities: HashMap<Address, IdentityEntry>,
    lookup: Box<dyn IdentityLookup>,
    pub timeout: f64,
    /// Multiple of `timeout` an identity is kept after its last report.
    pub identity_retention: f64,

    // Ownship position, when known
    pub src_lat: Option<f64>,
    pub src_lon: Option<f64>,
    pub src_alt: Option<i32>,

    // Counters
    pub msg_count: u64,
    pub msg_bad: u64,
}

impl TargetTable {
    pub fn new(lookup: Box<dyn IdentityLookup>, timeout: f64) -> Self {
        TargetTable {
            targets: HashMap::new(),
            identities: HashMap::new(),
            lookup,
            timeout,
            identity_retention: IDENTITY_RETENTION,
            src_lat: None,
            src_lon: None,
            src_alt: None,
            msg_count: 0,
            msg_bad: 0,
        }
    }

    pub fn set_own_position(&mut self, lat: f64, lon: f64, alt: Option<i32>) {
        self.src_lat = Some(lat);
        self.src_lon = Some(lon);
        self.src_alt = alt;
    }

    pub fn identity(&self, address: Address) -> Option<&Identity> {
        self.identities.get(&address).map(|e| &e.identity)
    }

    /// Number of addresses with a remembered identity.
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Fold one traffic report into the table.
    pub fn upsert(&mut self, report: &TrafficReport, now: f64) -> Vec<TargetEvent> {
        self.msg_count += 1;
        let mut events = Vec::new();
        let address = report.address;

        let entry = self.identities.entry(address).or_default();
        entry.last_seen = now;
        let change = update_identity(&mut entry.identity, &report.callsign, self.lookup.as_ref());
        let identity = entry.identity.clone();

        let is_new = !self.targets.contains_key(&address);
        let target = self
            .targets
            .entry(address)
            .or_insert_with(|| Target::new(report, identity.clone(), now));
        if !is_new {
            target.apply(report);
            target.identity = identity.clone();
        }
        target.last_seen = now;
        target.msg_count += 1;

        if let (Some(lat), Some(lon)) = (self.src_lat, self.src_lon) {
            target.dist = Some(haversine_mi(lat, lon, target.lat, target.lon));
            target.bearing = Some(bearing_deg(lat, lon, target.lat, target.lon));
        }

        if is_new {
            events.push(TargetEvent::NewTarget {
                address,
                n_number: identity.n_number.clone(),
                aircraft: identity.aircraft.clone(),
                timestamp: now,
            });
        }
        if change == IdentityChange::FlightNumber {
            if let Some(flight_number) = identity.flight_number.clone() {
                events.push(TargetEvent::FlightNumber {
                    address,
                    flight_number,
                    airline: identity.airline.clone(),
                    timestamp: now,
                });
            }
        }
        events.push(TargetEvent::Updated {
            address,
            timestamp: now,
        });

        events
    }

    /// All targets heard within the timeout, most recent first.
    pub fn get_active(&self, now: f64) -> Vec<&Target> {
        let mut active: Vec<_> = self
            .targets
            .values()
            .filter(|t| t.age(now) <= self.timeout)
            .collect();
        active.sort_by(|a, b| b.last_seen.total_cmp(&a.last_seen));
        active
    }

    /// Remove stale targets. Returns count removed.
    ///
    /// Identities are dropped separately, once their address has been silent
    /// for `identity_retention * timeout`.
    pub fn prune_stale(&mut self, now: f64) -> usize {
        let before = self.targets.len();
        let timeout = self.timeout;
        self.targets.retain(|_, t| t.age(now) <= timeout);

        let keep_for = timeout * self.identity_retention.max(1.0);
        self.identities.retain(|_, e| now - e.last_seen <= keep_for);

        before - self.targets.len()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for TargetTable {
    fn default() -> Self {
        TargetTable::new(Box::new(AirlineTable), TARGET_TIMEOUT)
    }
}

/// Apply the N-number / flight-number rules for one callsign.
fn update_identity(
    identity: &mut Identity,
    callsign: &str,
    lookup: &dyn IdentityLookup,
) -> IdentityChange {
    if callsign.is_empty() {
        return IdentityChange::None;
    }
    match &identity.n_number {
        None => {
            identity.aircraft = lookup.find_aircraft_by_n_number(callsign);
            identity.n_number = Some(callsign.to_string());
            IdentityChange::NNumber
        }
        Some(n) if n == callsign => IdentityChange::None,
        Some(_) if identity.flight_number.as_deref() == Some(callsign) => IdentityChange::None,
        Some(_) => {
            identity.airline = lookup.check_commercial_name(callsign);
            identity.flight_number = Some(callsign.to_string());
            IdentityChange::FlightNumber
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdl90::VerticalVelocity;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every lookup call.
    #[derive(Default)]
    struct RecordingLookup {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl IdentityLookup for RecordingLookup {
        fn find_aircraft_by_n_number(&self, n_number: &str) -> Option<AircraftRecord> {
            self.calls.borrow_mut().push(format!("aircraft:{n_number}"));
            Some(AircraftRecord {
                n_number: n_number.to_string(),
                manufacturer: Some("Piper".into()),
                ..Default::default()
            })
        }

        fn check_commercial_name(&self, flight_number: &str) -> Option<String> {
            self.calls.borrow_mut().push(format!("airline:{flight_number}"));
            crate::identity::lookup_operator(flight_number).map(str::to_string)
        }
    }

    fn make_table() -> (TargetTable, Rc<RefCell<Vec<String>>>) {
        let lookup = RecordingLookup::default();
        let calls = Rc::clone(&lookup.calls);
        (TargetTable::new(Box::new(lookup), TARGET_TIMEOUT), calls)
    }

    fn report(address: Address, callsign: &str) -> TrafficReport {
        TrafficReport {
            alert_status: 0,
            address_type: 0,
            address,
            lat: 35.5,
            lon: -82.5,
            altitude: Some(4500),
            misc: 9,
            nic: 8,
            nacp: 9,
            h_velocity: Some(120),
            v_velocity: Some(VerticalVelocity::Fpm(-320)),
            track: Some(90.0),
            emitter_category: 1,
            callsign: callsign.to_string(),
            priority: 0,
        }
    }

    #[test]
    fn test_first_callsign_is_n_number() {
        let (mut table, calls) = make_table();
        let events = table.upsert(&report(0xABCDEF, "N221TM"), 1.0);

        assert!(matches!(
            &events[0],
            TargetEvent::NewTarget { address: 0xABCDEF, n_number: Some(n), aircraft: Some(_), .. }
                if n == "N221TM"
        ));
        let id = table.identity(0xABCDEF).unwrap();
        assert_eq!(id.n_number.as_deref(), Some("N221TM"));
        assert_eq!(id.flight_number, None);
        assert_eq!(*calls.borrow(), vec!["aircraft:N221TM"]);
    }

    #[test]
    fn test_later_callsign_is_flight_number() {
        let (mut table, calls) = make_table();
        table.upsert(&report(0xABCDEF, "N221TM"), 1.0);
        let events = table.upsert(&report(0xABCDEF, "DAL123"), 2.0);

        let id = table.identity(0xABCDEF).unwrap();
        assert_eq!(id.n_number.as_deref(), Some("N221TM"));
        assert_eq!(id.flight_number.as_deref(), Some("DAL123"));
        assert_eq!(id.airline.as_deref(), Some("Delta Air Lines"));
        assert!(events.iter().any(|e| matches!(
            e,
            TargetEvent::FlightNumber { flight_number, .. } if flight_number == "DAL123"
        )));
        // Only the commercial-name lookup ran for the flight number.
        assert_eq!(*calls.borrow(), vec!["aircraft:N221TM", "airline:DAL123"]);
    }

    #[test]
    fn test_alternating_callsigns_no_change() {
        let (mut table, calls) = make_table();
        table.upsert(&report(0xABCDEF, "N221TM"), 1.0);
        table.upsert(&report(0xABCDEF, "DAL123"), 2.0);
        for (i, cs) in ["N221TM", "DAL123", "", "N221TM"].iter().enumerate() {
            let events = table.upsert(&report(0xABCDEF, cs), 3.0 + i as f64);
            assert_eq!(events.len(), 1, "only Updated for {cs:?}");
        }
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.targets[&0xABCDEF].msg_count, 6);
    }

    #[test]
    fn test_blank_first_callsign_defers_n_number() {
        let (mut table, _) = make_table();
        let events = table.upsert(&report(0x123456, ""), 1.0);
        assert!(matches!(
            &events[0],
            TargetEvent::NewTarget { n_number: None, .. }
        ));
        table.upsert(&report(0x123456, "N55XY"), 2.0);
        assert_eq!(
            table.identity(0x123456).unwrap().n_number.as_deref(),
            Some("N55XY")
        );
    }

    #[test]
    fn test_one_target_per_address() {
        let (mut table, _) = make_table();
        table.upsert(&report(0x000001, "N1"), 1.0);
        table.upsert(&report(0x000002, "N2"), 1.0);
        table.upsert(&report(0x000001, "N1"), 2.0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.msg_count, 3);
    }

    #[test]
    fn test_prune_stale() {
        let (mut table, _) = make_table();
        table.upsert(&report(0x000001, "N1"), 0.0);
        table.upsert(&report(0x000002, "N2"), 50.0);
        assert_eq!(table.prune_stale(70.0), 1);
        assert!(table.targets.contains_key(&0x000002));
        assert!(!table.targets.contains_key(&0x000001));
    }

    #[test]
    fn test_identity_survives_eviction() {
        let (mut table, calls) = make_table();
        table.upsert(&report(0xABCDEF, "N221TM"), 0.0);
        table.prune_stale(100.0);
        assert!(table.is_empty());

        let events = table.upsert(&report(0xABCDEF, "DAL123"), 101.0);
        assert!(matches!(
            &events[0],
            TargetEvent::NewTarget { n_number: Some(n), .. } if n == "N221TM"
        ));
        assert_eq!(
            table.targets[&0xABCDEF].identity.flight_number.as_deref(),
            Some("DAL123")
        );
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_identity_expires_after_retention() {
        let (mut table, _) = make_table();
        table.identity_retention = 5.0;
        table.upsert(&report(0xABCDEF, "N221TM"), 0.0);

        // One timeout of silence: target gone, identity kept.
        table.prune_stale(100.0);
        assert!(table.is_empty());
        assert!(table.identity(0xABCDEF).is_some());

        // Past 5 x 60 s: identity gone too.
        table.prune_stale(301.0);
        assert!(table.identity(0xABCDEF).is_none());

        let events = table.upsert(&report(0xABCDEF, "DAL123"), 302.0);
        assert!(matches!(
            &events[0],
            TargetEvent::NewTarget { n_number: Some(n), .. } if n == "DAL123"
        ));
    }

    #[test]
    fn test_identity_map_bounded_under_churn() {
        let (mut table, _) = make_table();
        let mut now = 0.0;
        for addr in 0..5_000u32 {
            now += 1.0;
            table.upsert(&report(addr, "N1"), now);
            table.prune_stale(now);
        }
        // 10 x 60 s window at one new address per second
        assert!(table.identity_count() <= 601, "{}", table.identity_count());
        assert!(table.len() <= 61);
    }

    #[test]
    fn test_get_active_sorted() {
        let (mut table, _) = make_table();
        table.upsert(&report(0x000001, "N1"), 10.0);
        table.upsert(&report(0x000002, "N2"), 30.0);
        table.upsert(&report(0x000003, "N3"), 20.0);
        let active = table.get_active(40.0);
        let order: Vec<Address> = active.iter().map(|t| t.address).collect();
        assert_eq!(order, vec![0x000002, 0x000003, 0x000001]);
        assert_eq!(table.get_active(75.0).len(), 2);
    }

    #[test]
    fn test_distance_and_bearing_from_ownship() {
        let (mut table, _) = make_table();
        table.set_own_position(35.0, -82.5, Some(3000));
        table.upsert(&report(0x000001, "N1"), 1.0);
        let t = &table.targets[&0x000001];
        // 0.5 degrees of latitude due north
        let dist = t.dist.unwrap();
        assert!((dist - 34.55).abs() < 0.1, "dist {dist}");
        assert!(t.bearing.unwrap() < 0.01 || t.bearing.unwrap() > 359.99);
    }

    #[test]
    fn test_no_distance_without_ownship() {
        let (mut table, _) = make_table();
        table.upsert(&report(0x000001, "N1"), 1.0);
        assert_eq!(table.targets[&0x000001].dist, None);
    }

    #[test]
    fn test_target_fields_from_report() {
        let (mut table, _) = make_table();
        table.upsert(&report(0x000001, "DAL9"), 1.0);
        let t = &table.targets[&0x000001];
        assert_eq!(t.vspeed, Some(-320));
        assert_eq!(t.speed_mph(), Some(138.1));
        assert_eq!(t.label(), "DAL9");
    }

    #[test]
    fn test_bearing_quadrants() {
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }
}
