//! Aircraft identity lookup for traffic targets.
//!
//! The target table resolves callsigns through an [`IdentityLookup`]: the
//! first callsign seen for an address is looked up as a tail number, a later
//! distinct callsign only as a commercial flight number. [`AirlineTable`] is
//! the built-in implementation; `efis-hud` layers a SQLite registry on top.

use std::rc::Rc;

use serde::Serialize;

/// What the registry knows about a tail number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AircraftRecord {
    pub n_number: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub owner: Option<String>,
}

impl AircraftRecord {
    /// `"Cessna 172S"` style label, when anything is known.
    pub fn description(&self) -> Option<String> {
        match (&self.manufacturer, &self.model) {
            (Some(mfr), Some(model)) => Some(format!("{mfr} {model}")),
            (Some(s), None) | (None, Some(s)) => Some(s.clone()),
            (None, None) => None,
        }
    }
}

/// Identity database queried by the target table.
pub trait IdentityLookup {
    fn find_aircraft_by_n_number(&self, n_number: &str) -> Option<AircraftRecord>;
    fn check_commercial_name(&self, flight_number: &str) -> Option<String>;
}

/// Lets the target table share a lookup with other owners.
impl<T: IdentityLookup + ?Sized> IdentityLookup for Rc<T> {
    fn find_aircraft_by_n_number(&self, n_number: &str) -> Option<AircraftRecord> {
        (**self).find_aircraft_by_n_number(n_number)
    }

    fn check_commercial_name(&self, flight_number: &str) -> Option<String> {
        (**self).check_commercial_name(flight_number)
    }
}

// ---------------------------------------------------------------------------
// Airline lookup
// ---------------------------------------------------------------------------

/// Airline ICAO prefixes → operator name.
const AIRLINE_PREFIXES: &[(&str, &str)] = &[
    ("AAL", "American Airlines"),
    ("DAL", "Delta Air Lines"),
    ("UAL", "United Airlines"),
    ("SWA", "Southwest Airlines"),
    ("JBU", "JetBlue Airways"),
    ("NKS", "Spirit Airlines"),
    ("FFT", "Frontier Airlines"),
    ("ASA", "Alaska Airlines"),
    ("HAL", "Hawaiian Airlines"),
    ("SKW", "SkyWest Airlines"),
    ("RPA", "Republic Airways"),
    ("ENY", "Envoy Air"),
    ("ASH", "Mesa Airlines"),
    ("PDT", "Piedmont Airlines"),
    ("JIA", "PSA Airlines"),
    ("EJA", "NetJets"),
    ("LXJ", "Flexjet"),
    ("UPS", "UPS"),
    ("FDX", "FedEx"),
    ("GTI", "Atlas Air"),
    ("ABX", "ABX Air"),
    ("ACA", "Air Canada"),
    ("WJA", "WestJet"),
    ("BAW", "British Airways"),
    ("DLH", "Lufthansa"),
    ("AFR", "Air France"),
];

/// Look up operator name from a flight-number callsign (`DAL123`).
///
/// The prefix must be followed by at least one digit so that tail numbers
/// which happen to start with an airline code are not matched.
pub fn lookup_operator(callsign: &str) -> Option<&'static str> {
    let cs = callsign.as_bytes();
    if cs.len() < 4 || !cs[3].is_ascii_digit() {
        return None;
    }
    let prefix = callsign.get(..3)?;
    AIRLINE_PREFIXES
        .iter()
        .find(|(p, _)| p.eq_ignore_ascii_case(prefix))
        .map(|(_, name)| *name)
}

/// Built-in lookup: airline names only, no aircraft records.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirlineTable;

impl IdentityLookup for AirlineTable {
    fn find_aircraft_by_n_number(&self, _n_number: &str) -> Option<AircraftRecord> {
        None
    }

    fn check_commercial_name(&self, flight_number: &str) -> Option<String> {
        lookup_operator(flight_number).map(str::to_string)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_operator_known() {
        assert_eq!(lookup_operator("AAL123"), Some("American Airlines"));
        assert_eq!(lookup_operator("DAL456"), Some("Delta Air Lines"));
        assert_eq!(lookup_operator("swa789"), Some("Southwest Airlines"));
    }

    #[test]
    fn test_lookup_operator_unknown() {
        assert_eq!(lookup_operator("XYZ999"), None);
    }

    #[test]
    fn test_lookup_operator_needs_digit() {
        assert_eq!(lookup_operator("DAL"), None);
        assert_eq!(lookup_operator("UALX"), None);
    }

    #[test]
    fn test_airline_table_has_no_aircraft() {
        let table = AirlineTable;
        assert_eq!(table.find_aircraft_by_n_number("N221TM"), None);
        assert_eq!(
            table.check_commercial_name("UPS2901").as_deref(),
            Some("UPS")
        );
    }

    #[test]
    fn test_aircraft_description() {
        let rec = AircraftRecord {
            n_number: "N221TM".into(),
            manufacturer: Some("Cessna".into()),
            model: Some("172S".into()),
            ..Default::default()
        };
        assert_eq!(rec.description().as_deref(), Some("Cessna 172S"));
        assert_eq!(AircraftRecord::default().description(), None);
    }

    #[test]
    fn test_shared_lookup() {
        let shared: Rc<dyn IdentityLookup> = Rc::new(AirlineTable);
        let boxed: Box<dyn IdentityLookup> = Box::new(Rc::clone(&shared));
        assert_eq!(boxed.check_commercial_name("FDX12").as_deref(), Some("FedEx"));
        assert_eq!(Rc::strong_count(&shared), 2);
    }
}
