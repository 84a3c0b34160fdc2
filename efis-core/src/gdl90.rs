//! Decode GDL-90 frames into typed messages.
//!
//! Handles the message ids a SkyView ADS-B or Stratux receiver emits:
//! - 0:    Heartbeat (GPS valid, UAT initialized, seconds since midnight)
//! - 10:   Ownship report (same layout as traffic)
//! - 11:   Ownship geometric altitude
//! - 20:   Traffic report
//! - 0x4C: Levil / Stratux AHRS extension (`~LE`)
//! - 0x65: ForeFlight AHRS extension
//!
//! Everything else (uplink, SkyView proprietary ids) is an unknown message
//! for the caller to log and skip.

use log::trace;
use serde::Serialize;

use crate::ahrs::{self, ForeFlightAhrs, LevilMessage, FOREFLIGHT_ID, LEVIL_ID};
use crate::codec::{high12, low12, signed16, signed24, thunk_byte, unsigned16, unsigned24, Endian};
use crate::crc;
use crate::records::{format_time_of_day, GpsRecord};
use crate::sync::{unstuff, FLAG};
use crate::types::*;

pub const HEARTBEAT: u8 = 0;
pub const OWNSHIP: u8 = 10;
pub const OWNSHIP_GEO_ALT: u8 = 11;
pub const TRAFFIC: u8 = 20;

/// Degrees per unit of a 24-bit signed latitude/longitude.
const LAT_LON_RESOLUTION: f64 = 180.0 / (1 << 23) as f64;
/// Degrees per unit of an 8-bit track angle.
const TRACK_RESOLUTION: f64 = 360.0 / 256.0;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A delimited GDL-90 frame after byte un-stuffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gdl90Frame {
    /// Un-stuffed bytes, both flags included.
    pub data: Vec<u8>,
    pub fcs_ok: bool,
}

impl Gdl90Frame {
    /// Un-stuff a `~...~` frame from the synchronizer and check its FCS.
    pub fn from_wire(raw: &[u8]) -> Self {
        let data = unstuff(raw);
        let fcs_ok = data.len() >= 5 && crc::fcs_ok(&data[1..data.len() - 1]);
        Gdl90Frame { data, fcs_ok }
    }

    pub fn id(&self) -> Option<u8> {
        self.data.get(1).copied()
    }
}

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heartbeat {
    pub gps_position_valid: bool,
    pub uat_initialized: bool,
    /// Seconds since UTC midnight (17 bits).
    pub timestamp: u32,
}

impl Heartbeat {
    pub fn time_string(&self) -> String {
        format_time_of_day(self.timestamp)
    }

    pub fn apply(&self, gps: &mut GpsRecord) {
        gps.time = Some(self.time_string());
        gps.position_valid = self.gps_position_valid;
    }
}

/// Vertical velocity from a traffic or ownship report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerticalVelocity {
    Fpm(i32),
    /// Climbing faster than +32,576 fpm.
    ExceedsUp,
    /// Descending faster than -32,576 fpm.
    ExceedsDown,
}

impl VerticalVelocity {
    /// Signed rate for display; out-of-range values clamp to the limit.
    pub fn fpm(&self) -> i32 {
        match self {
            VerticalVelocity::Fpm(v) => *v,
            VerticalVelocity::ExceedsUp => 0x1FE * 64,
            VerticalVelocity::ExceedsDown => -0x1FE * 64,
        }
    }
}

/// Traffic report layout, shared by ids 10 and 20.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficReport {
    pub alert_status: u8,
    pub address_type: u8,
    pub address: Address,
    pub lat: f64,
    pub lon: f64,
    /// Pressure altitude, feet.
    pub altitude: Option<i32>,
    pub misc: u8,
    pub nic: u8,
    pub nacp: u8,
    /// Knots.
    pub h_velocity: Option<u32>,
    pub v_velocity: Option<VerticalVelocity>,
    pub track: Option<f64>,
    pub emitter_category: u8,
    pub callsign: String,
    pub priority: u8,
}

impl TrafficReport {
    /// Ownship position into the GPS record.
    pub fn apply_ownship(&self, gps: &mut GpsRecord) {
        gps.lat = Some(self.lat);
        gps.lon = Some(self.lon);
        gps.alt = self.altitude;
        gps.ground_speed = self.h_velocity.map(|v| v as f64);
        gps.ground_track = self.track;
        gps.accuracy = Some(self.nic);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoAltitude {
    /// Feet, 5 ft resolution.
    pub altitude: i32,
    pub vertical_warning: bool,
    /// Vertical figure of merit, meters.
    pub vfom: Option<u16>,
}

impl GeoAltitude {
    pub fn apply(&self, gps: &mut GpsRecord) {
        gps.geo_alt = Some(self.altitude);
        gps.vertical_warning = self.vertical_warning;
        gps.vfom = self.vfom;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Gdl90Message {
    Heartbeat(Heartbeat),
    Ownship(TrafficReport),
    OwnshipGeoAltitude(GeoAltitude),
    Traffic(TrafficReport),
    Levil(LevilMessage),
    ForeFlight(ForeFlightAhrs),
}

// ---------------------------------------------------------------------------
// Field decoding
// ---------------------------------------------------------------------------

/// Latitude or longitude from a 24-bit signed fraction of a half circle.
pub fn decode_lat_lon(data: &[u8]) -> f64 {
    signed24(data, Endian::Big) as f64 * LAT_LON_RESOLUTION
}

/// 12-bit altitude in 25 ft steps offset by -1000 ft; `0xFFF` is invalid.
pub fn decode_altitude(raw: u32) -> Option<i32> {
    if raw == 0xFFF {
        return None;
    }
    Some(raw as i32 * 25 - 1000)
}

/// 12-bit two's-complement vertical velocity in 64 fpm units.
///
/// `0x800` means no data; `0x1FE` and `0xE02` flag rates beyond the field's
/// range; the remaining codes past those limits are reserved.
pub fn decode_vertical_velocity(raw: u32) -> Option<VerticalVelocity> {
    match raw {
        0x800 => None,
        0x1FE => Some(VerticalVelocity::ExceedsUp),
        0xE02 => Some(VerticalVelocity::ExceedsDown),
        0x1FF..=0x7FF | 0x801..=0xE01 => None,
        v if v > 0x7FF => Some(VerticalVelocity::Fpm((v as i32 - 0x1000) * 64)),
        v => Some(VerticalVelocity::Fpm(v as i32 * 64)),
    }
}

/// Keep only ASCII letters and digits.
pub fn clean_callsign(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| b.is_ascii_alphanumeric())
        .map(|&b| b as char)
        .collect()
}

fn check_len(data: &[u8], id: u8) -> Result<()> {
    if let Some(expected) = msg_info(id).and_then(|info| info.frame_len) {
        if data.len() != expected {
            return Err(EfisError::InvalidLength {
                kind: msg_info(id).map_or("GDL-90", |info| info.name),
                expected,
                actual: data.len(),
            });
        }
    }
    Ok(())
}

fn decode_heartbeat(data: &[u8]) -> Heartbeat {
    let mut timestamp = unsigned16(&data[4..], Endian::Little) as u32;
    if data[3] & 0x80 != 0 {
        timestamp += 1 << 16;
    }
    Heartbeat {
        gps_position_valid: data[2] & 0x80 != 0,
        uat_initialized: data[2] & 0x01 != 0,
        timestamp,
    }
}

fn decode_report(data: &[u8], ownship: bool) -> TrafficReport {
    let h_velocity = high12(&data[15..]);
    let track = if ownship && data[18] == 0xFF {
        None
    } else {
        Some(data[18] as f64 * TRACK_RESOLUTION)
    };

    TrafficReport {
        alert_status: thunk_byte(data[2], 0xF0, -4) as u8,
        address_type: thunk_byte(data[2], 0x0F, 0) as u8,
        address: unsigned24(&data[3..], Endian::Big),
        lat: decode_lat_lon(&data[6..]),
        lon: decode_lat_lon(&data[9..]),
        altitude: decode_altitude(high12(&data[12..])),
        misc: data[13] & 0x0F,
        nic: data[14] >> 4,
        nacp: data[14] & 0x0F,
        h_velocity: (h_velocity != 0xFFF).then_some(h_velocity),
        v_velocity: decode_vertical_velocity(low12(&data[16..])),
        track,
        emitter_category: data[19],
        callsign: clean_callsign(&data[20..28]),
        priority: data[28] >> 4,
    }
}

fn decode_geo_altitude(data: &[u8]) -> GeoAltitude {
    let merit = unsigned16(&data[4..], Endian::Big);
    let vfom = merit & 0x7FFF;
    GeoAltitude {
        altitude: signed16(&data[2..], Endian::Big) as i32 * 5,
        vertical_warning: merit & 0x8000 != 0,
        vfom: (vfom != 0x7FFF).then_some(vfom),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Decode one un-stuffed frame.
///
/// A failed FCS does not block decoding; the caller decides what to do with
/// `frame.fcs_ok`.
pub fn decode(frame: &Gdl90Frame) -> Result<Gdl90Message> {
    let data = &frame.data;
    if data.len() < 4 || data[0] != FLAG {
        return Err(EfisError::BadMarker("GDL-90"));
    }
    let id = data[1];
    check_len(data, id)?;

    match id {
        HEARTBEAT => Ok(Gdl90Message::Heartbeat(decode_heartbeat(data))),
        OWNSHIP => Ok(Gdl90Message::Ownship(decode_report(data, true))),
        OWNSHIP_GEO_ALT => Ok(Gdl90Message::OwnshipGeoAltitude(decode_geo_altitude(data))),
        TRAFFIC => Ok(Gdl90Message::Traffic(decode_report(data, false))),
        LEVIL_ID => ahrs::decode_levil(data).map(Gdl90Message::Levil),
        FOREFLIGHT_ID => ahrs::decode_foreflight(data).map(Gdl90Message::ForeFlight),
        _ => {
            trace!(
                "GDL-90 id {} ({}) len {} skipped",
                id,
                msg_info(id).map_or("unknown", |info| info.name),
                data.len()
            );
            Err(EfisError::UnknownMessage(id))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sync::stuff;

    /// Wrap a message body (id + payload) with FCS, stuffing and flags.
    pub(crate) fn encode(body: &[u8]) -> Vec<u8> {
        let mut b = body.to_vec();
        crc::append_fcs(&mut b);
        let mut out = vec![FLAG];
        out.extend(stuff(&b));
        out.push(FLAG);
        out
    }

    /// Traffic report example from the GDL-90 ICD: N825V at 5000 ft.
    pub(crate) const TRAFFIC_BODY: [u8; 28] = [
        0x14, 0x00, 0xAB, 0x45, 0x49, 0x1F, 0xEF, 0x15, 0xA8, 0x89, 0x78, 0x0F, 0x09, 0xA9,
        0x07, 0xB0, 0x01, 0x20, 0x01, 0x4E, 0x38, 0x32, 0x35, 0x56, 0x20, 0x20, 0x20, 0x00,
    ];

    pub(crate) const HEARTBEAT_BODY: [u8; 7] = [0x00, 0x81, 0x41, 0xDB, 0xD0, 0x08, 0x02];

    fn traffic_with(
        address: u32,
        callsign: &[u8; 8],
        lat_raw: i32,
        lon_raw: i32,
    ) -> Vec<u8> {
        let mut body = TRAFFIC_BODY;
        body[2..5].copy_from_slice(&address.to_be_bytes()[1..]);
        body[5..8].copy_from_slice(&(lat_raw as u32).to_be_bytes()[1..]);
        body[8..11].copy_from_slice(&(lon_raw as u32).to_be_bytes()[1..]);
        body[19..27].copy_from_slice(callsign);
        encode(&body)
    }

    fn decode_wire(raw: &[u8]) -> Result<Gdl90Message> {
        decode(&Gdl90Frame::from_wire(raw))
    }

    fn traffic(body: &[u8]) -> TrafficReport {
        match decode_wire(&encode(body)).unwrap() {
            Gdl90Message::Traffic(t) => t,
            other => panic!("expected traffic, got {other:?}"),
        }
    }

    // -- Frame --

    #[test]
    fn test_frame_fcs() {
        let frame = Gdl90Frame::from_wire(&encode(&HEARTBEAT_BODY));
        assert!(frame.fcs_ok);
        assert_eq!(frame.id(), Some(HEARTBEAT));
        assert_eq!(frame.data.len(), 11);

        let mut raw = encode(&HEARTBEAT_BODY);
        raw[4] ^= 0x01;
        assert!(!Gdl90Frame::from_wire(&raw).fcs_ok);
    }

    #[test]
    fn test_frame_unstuffs_before_length_check() {
        // Altitude byte equal to the flag forces an escape on the wire.
        let mut body = TRAFFIC_BODY;
        body[11] = 0x7E;
        let raw = encode(&body);
        assert!(raw.len() > 32);
        let t = traffic(&body);
        assert_eq!(t.altitude, Some(((0x7E << 4) + 0x0) * 25 - 1000));
    }

    // -- Heartbeat --

    #[test]
    fn test_decode_heartbeat() {
        let Gdl90Message::Heartbeat(hb) = decode_wire(&encode(&HEARTBEAT_BODY)).unwrap() else {
            panic!("expected heartbeat");
        };
        assert!(hb.gps_position_valid);
        assert!(hb.uat_initialized);
        assert_eq!(hb.timestamp, 0xD0DB);
        assert_eq!(hb.time_string(), "14:51:07");
    }

    #[test]
    fn test_heartbeat_timestamp_bit16() {
        let mut body = HEARTBEAT_BODY;
        body[2] |= 0x80;
        let Gdl90Message::Heartbeat(hb) = decode_wire(&encode(&body)).unwrap() else {
            panic!("expected heartbeat");
        };
        assert_eq!(hb.timestamp, 0xD0DB + (1 << 16));
    }

    // -- Traffic --

    #[test]
    fn test_decode_traffic_icd_example() {
        let t = traffic(&TRAFFIC_BODY);
        assert_eq!(address_to_string(t.address), "AB4549");
        assert_eq!(t.alert_status, 0);
        assert_eq!(t.address_type, 0);
        assert!((t.lat - 44.90707).abs() < 1e-4, "lat {}", t.lat);
        assert!((t.lon - -122.99486).abs() < 1e-4, "lon {}", t.lon);
        assert_eq!(t.altitude, Some(5000));
        assert_eq!(t.misc, 9);
        assert_eq!(t.nic, 10);
        assert_eq!(t.nacp, 9);
        assert_eq!(t.h_velocity, Some(123));
        assert_eq!(t.v_velocity, Some(VerticalVelocity::Fpm(64)));
        assert_eq!(t.track, Some(45.0));
        assert_eq!(t.emitter_category, 1);
        assert_eq!(t.callsign, "N825V");
        assert_eq!(t.priority, 0);
    }

    #[test]
    fn test_traffic_signed_position_and_address() {
        let raw = traffic_with(0x00A1B2, b"UAL42   ", 0x200000, -0x400000);
        let Gdl90Message::Traffic(t) = decode_wire(&raw).unwrap() else {
            panic!("expected traffic");
        };
        assert_eq!(t.address, 0x00A1B2);
        assert_eq!(t.lat, 45.0);
        assert_eq!(t.lon, -90.0);
        assert_eq!(t.callsign, "UAL42");
    }

    #[test]
    fn test_traffic_altitude_formula() {
        for (b12, b13) in [(0x00u8, 0x00u8), (0x0F, 0x09), (0x12, 0x3F), (0xFF, 0xE0)] {
            let mut body = TRAFFIC_BODY;
            body[11] = b12;
            body[12] = b13;
            let expected = ((b12 as i32) << 4) + (b13 as i32 >> 4);
            assert_eq!(traffic(&body).altitude, Some(expected * 25 - 1000));
        }
    }

    #[test]
    fn test_traffic_altitude_invalid() {
        let mut body = TRAFFIC_BODY;
        body[11] = 0xFF;
        body[12] = 0xF9;
        assert_eq!(traffic(&body).altitude, None);
    }

    #[test]
    fn test_traffic_status_and_type_nibbles() {
        let mut body = TRAFFIC_BODY;
        body[1] = 0x13;
        let t = traffic(&body);
        assert_eq!(t.alert_status, 1);
        assert_eq!(t.address_type, 3);
    }

    #[test]
    fn test_traffic_velocity_unavailable() {
        let mut body = TRAFFIC_BODY;
        body[14] = 0xFF;
        body[15] = 0xF8;
        body[16] = 0x00;
        let t = traffic(&body);
        assert_eq!(t.h_velocity, None);
        assert_eq!(t.v_velocity, None);
    }

    #[test]
    fn test_traffic_wrong_length() {
        let raw = encode(&TRAFFIC_BODY[..20]);
        assert!(matches!(
            decode_wire(&raw),
            Err(EfisError::InvalidLength { expected: 32, .. })
        ));
    }

    #[test]
    fn test_vertical_velocity_codes() {
        assert_eq!(decode_vertical_velocity(0x000), Some(VerticalVelocity::Fpm(0)));
        assert_eq!(decode_vertical_velocity(0x001), Some(VerticalVelocity::Fpm(64)));
        assert_eq!(decode_vertical_velocity(0xFFF), Some(VerticalVelocity::Fpm(-64)));
        assert_eq!(decode_vertical_velocity(0x1FD), Some(VerticalVelocity::Fpm(509 * 64)));
        assert_eq!(decode_vertical_velocity(0xE03), Some(VerticalVelocity::Fpm(-509 * 64)));
        assert_eq!(decode_vertical_velocity(0x1FE), Some(VerticalVelocity::ExceedsUp));
        assert_eq!(decode_vertical_velocity(0xE02), Some(VerticalVelocity::ExceedsDown));
        assert_eq!(decode_vertical_velocity(0x800), None);
        assert_eq!(decode_vertical_velocity(0x400), None);
        assert_eq!(VerticalVelocity::ExceedsDown.fpm(), -32_640);
    }

    #[test]
    fn test_clean_callsign() {
        assert_eq!(clean_callsign(b"DAL-123 "), "DAL123");
        assert_eq!(clean_callsign(b"        "), "");
    }

    // -- Ownship --

    #[test]
    fn test_decode_ownship_updates_gps() {
        let mut body = TRAFFIC_BODY;
        body[0] = OWNSHIP;
        body[17] = 0xFF;
        let Gdl90Message::Ownship(own) = decode_wire(&encode(&body)).unwrap() else {
            panic!("expected ownship");
        };
        assert_eq!(own.track, None);

        let mut gps = GpsRecord::default();
        own.apply_ownship(&mut gps);
        assert_eq!(gps.alt, Some(5000));
        assert_eq!(gps.ground_speed, Some(123.0));
        assert_eq!(gps.ground_track, None);
        assert_eq!(gps.accuracy, Some(10));
    }

    #[test]
    fn test_decode_geo_altitude() {
        let raw = encode(&[OWNSHIP_GEO_ALT, 0x00, 0xC8, 0x80, 0x0A]);
        let Gdl90Message::OwnshipGeoAltitude(geo) = decode_wire(&raw).unwrap() else {
            panic!("expected geo altitude");
        };
        assert_eq!(geo.altitude, 1000);
        assert!(geo.vertical_warning);
        assert_eq!(geo.vfom, Some(10));

        let raw = encode(&[OWNSHIP_GEO_ALT, 0xFF, 0xF6, 0x7F, 0xFF]);
        let Gdl90Message::OwnshipGeoAltitude(geo) = decode_wire(&raw).unwrap() else {
            panic!("expected geo altitude");
        };
        assert_eq!(geo.altitude, -50);
        assert_eq!(geo.vfom, None);
    }

    // -- Dispatch --

    #[test]
    fn test_unknown_ids_are_skipped() {
        for id in [7u8, 18, 30, 31, 83, 204, 211] {
            let raw = encode(&[id, 0x01, 0x02, 0x03, 0x04]);
            assert!(matches!(decode_wire(&raw), Err(EfisError::UnknownMessage(i)) if i == id));
        }
    }

    #[test]
    fn test_dispatch_levil() {
        let raw = encode(&[LEVIL_ID, b'E', 0x07, 0x01, 1, 9, 0x00, 0x01, 5]);
        assert!(matches!(
            decode_wire(&raw).unwrap(),
            Gdl90Message::Levil(LevilMessage::GpsStatus(_))
        ));
    }

    #[test]
    fn test_bad_marker() {
        let frame = Gdl90Frame {
            data: vec![0x00, 0x14, 0x00, 0x00, 0x00],
            fcs_ok: false,
        };
        assert!(matches!(decode(&frame), Err(EfisError::BadMarker(_))));
    }
}
