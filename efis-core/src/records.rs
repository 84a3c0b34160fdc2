//! Telemetry records: one mutable struct per data domain.
//!
//! Every value is independently nullable. A record is owned by the input
//! source that produces it and shared with readers through [`Shared`]; the
//! decoders write only the fields their message carries, so a sentinel in the
//! wire data clears the field rather than leaving a stale value behind.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

/// Single-threaded shared handle to a record.
pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttitudeRecord {
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
    pub heading_mag: Option<f64>,
    /// Degrees per second.
    pub turn_rate: Option<f64>,
    /// Load factor in G.
    pub vert_g: Option<f64>,
    pub slip_skid: Option<f64>,
    pub msg_count: u64,
    pub msg_bad: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AirDataRecord {
    /// Knots.
    pub ias: Option<f64>,
    pub tas: Option<f64>,
    /// Baro-corrected altitude, feet.
    pub alt: Option<i32>,
    pub alt_pressure: Option<i32>,
    pub alt_density: Option<i32>,
    /// Altimeter setting, inHg.
    pub baro: Option<f64>,
    pub baro_diff: Option<f64>,
    /// Outside air temperature, Fahrenheit.
    pub oat: Option<f64>,
    pub aoa: Option<f64>,
    /// Vertical speed, feet per minute.
    pub vsi: Option<i32>,
    pub wind_dir: Option<f64>,
    pub wind_speed: Option<f64>,
    /// Wind direction relative to the nose.
    pub wind_dir_corr: Option<f64>,
    pub msg_count: u64,
    pub msg_bad: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpsRecord {
    /// `H:MM:SS` UTC.
    pub time: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Pressure altitude from the ownship report, feet.
    pub alt: Option<i32>,
    /// Geometric (GNSS) altitude, feet.
    pub geo_alt: Option<i32>,
    /// Vertical figure of merit, meters.
    pub vfom: Option<u16>,
    pub vertical_warning: bool,
    pub ground_speed: Option<f64>,
    pub ground_track: Option<f64>,
    /// Navigation integrity category of the ownship position.
    pub accuracy: Option<u8>,
    pub sats: Option<u8>,
    pub waas: Option<bool>,
    pub position_valid: bool,
    pub msg_count: u64,
    pub msg_bad: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavRecord {
    pub head_bug: Option<i32>,
    pub alt_bug: Option<i32>,
    pub asi_bug: Option<f64>,
    pub vs_bug: Option<f64>,
    pub course: Option<i32>,
    /// e.g. `NAV2`, `GPS1`.
    pub source_desc: Option<String>,
    pub source_port: Option<i32>,
    /// CDI full-scale deflection, nm.
    pub cdi_scale: Option<f64>,
    pub cdi_deflection: Option<i32>,
    pub gs_deviation: Option<i32>,
    pub ap_engaged: Option<bool>,
    pub ap_roll_mode: Option<char>,
    pub ap_pitch_mode: Option<char>,
    pub ap_roll_force: Option<i32>,
    pub ap_roll_pos: Option<i32>,
    pub ap_roll_slip: Option<bool>,
    pub ap_pitch_force: Option<i32>,
    pub ap_pitch_pos: Option<i32>,
    pub ap_pitch_slip: Option<bool>,
    pub ap_yaw_force: Option<i32>,
    pub ap_yaw_pos: Option<i32>,
    pub ap_yaw_slip: Option<bool>,
    pub xpdr_status: Option<TransponderStatus>,
    pub xpdr_reply: Option<bool>,
    pub xpdr_ident: Option<bool>,
    /// Squawk, four octal digits.
    pub xpdr_code: Option<String>,
    pub msg_count: u64,
    pub msg_bad: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransponderStatus {
    #[serde(rename = "SBY")]
    Standby,
    #[serde(rename = "GND")]
    Ground,
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "ALT")]
    Alt,
}

impl TransponderStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'0' => Some(TransponderStatus::Standby),
            b'1' => Some(TransponderStatus::Ground),
            b'2' => Some(TransponderStatus::On),
            b'3' => Some(TransponderStatus::Alt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransponderStatus::Standby => "SBY",
            TransponderStatus::Ground => "GND",
            TransponderStatus::On => "ON",
            TransponderStatus::Alt => "ALT",
        }
    }
}

/// One EMS general-purpose input: raw reading and its unit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeneralPurpose {
    pub value: Option<i64>,
    pub unit: char,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineRecord {
    pub rpm: Option<i32>,
    /// PSI.
    pub oil_press: Option<i32>,
    /// Fahrenheit.
    pub oil_temp: Option<i32>,
    /// Manifold pressure, inHg.
    pub man_press: Option<f64>,
    /// Gallons per hour.
    pub fuel_flow: Option<f64>,
    pub fuel_flow2: Option<f64>,
    pub fuel_press: Option<f64>,
    pub volts1: Option<f64>,
    pub volts2: Option<f64>,
    pub amps: Option<f64>,
    pub hobbs: Option<f64>,
    pub tach: Option<f64>,
    /// Exhaust gas temperature per cylinder, Fahrenheit.
    pub egt: [Option<i32>; 6],
    /// Cylinder head temperature per cylinder, Fahrenheit.
    pub cht: [Option<i32>; 6],
    pub general_purpose: Vec<GeneralPurpose>,
    pub power_pct: Option<i32>,
    pub msg_count: u64,
    pub msg_bad: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FuelRecord {
    /// Tank levels in gallons: left, right, and two auxiliary slots.
    pub levels: [Option<f64>; 4],
    pub remain: Option<f64>,
    pub msg_count: u64,
    pub msg_bad: u64,
}

/// Health of an AHRS/GPS receiver that reports on itself (Stratux, Levil).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub firmware: Option<u16>,
    pub battery_pct: Option<u8>,
    pub error_code: Option<u16>,
    pub power_source: Option<u16>,
    pub output_rate: Option<u8>,
    pub msg_count: u64,
}

/// Celsius to Fahrenheit.
pub fn c_to_f(c: f64) -> f64 {
    c * 1.8 + 32.0
}

/// Format seconds since midnight as `H:MM:SS`.
pub fn format_time_of_day(secs: u32) -> String {
    let secs = secs % 86_400;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_to_f() {
        assert_eq!(c_to_f(0.0), 32.0);
        assert_eq!(c_to_f(100.0), 212.0);
        assert_eq!(c_to_f(-40.0), -40.0);
    }

    #[test]
    fn test_format_time_of_day() {
        assert_eq!(format_time_of_day(0), "0:00:00");
        assert_eq!(format_time_of_day(3 * 3600 + 7 * 60 + 9), "3:07:09");
        assert_eq!(format_time_of_day(86_399), "23:59:59");
    }

    #[test]
    fn test_transponder_status_codes() {
        assert_eq!(TransponderStatus::from_code(b'3'), Some(TransponderStatus::Alt));
        assert_eq!(TransponderStatus::from_code(b'X'), None);
        assert_eq!(TransponderStatus::Standby.as_str(), "SBY");
    }

    #[test]
    fn test_shared_record_mutation_visible() {
        let rec = shared(AttitudeRecord::default());
        let reader = Rc::clone(&rec);
        rec.borrow_mut().pitch = Some(2.5);
        assert_eq!(reader.borrow().pitch, Some(2.5));
    }

    #[test]
    fn test_records_serialize_nulls() {
        let rec = FuelRecord {
            levels: [Some(10.5), None, None, None],
            ..Default::default()
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"levels\":[10.5,null,null,null]"));
        assert!(json.contains("\"remain\":null"));
    }
}
