//! AHRS extensions carried inside GDL-90 framing.
//!
//! - Levil / Stratux `~LE` (id 0x4C, then `'E'`, sub-id, version): status,
//!   attitude + air data, AOA/OAT, GPS status.
//! - ForeFlight (id 0x65) sub-id 1: attitude, heading, airspeeds.
//!
//! All offsets index the un-stuffed frame with its leading flag at 0.

use serde::Serialize;

use crate::codec::{signed16, unsigned16, Endian};
use crate::records::{c_to_f, AirDataRecord, AttitudeRecord, DeviceRecord, GpsRecord};
use crate::types::{EfisError, Result};

pub const LEVIL_ID: u8 = 0x4C;
pub const FOREFLIGHT_ID: u8 = 0x65;

/// Length of a Levil AHRS frame, flags and FCS included.
pub const LEVIL_AHRS_LEN: usize = 28;

/// Pressure altitude offset: the wire value 5000 is sea level.
const PALT_OFFSET: i32 = 5000;

const I16_UNAVAILABLE: i16 = 0x7FFF;
const U16_UNAVAILABLE: u16 = 0xFFFF;

// ---------------------------------------------------------------------------
// Levil / Stratux
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevilStatus {
    pub version: u8,
    pub firmware: u8,
    pub battery_pct: u8,
    pub error_code: u16,
    /// Reported only by version 2 devices.
    pub waas: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevilAhrs {
    pub version: u8,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub slip_skid: f64,
    pub vert_g: f64,
    pub ias: Option<f64>,
    pub pressure_alt: i32,
    pub vsi: i32,
    pub aoa: Option<f64>,
    /// Fahrenheit.
    pub oat: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevilGpsStatus {
    pub waas: bool,
    pub sats: u8,
    pub power_source: u16,
    pub output_rate: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum LevilMessage {
    Status(LevilStatus),
    Ahrs(LevilAhrs),
    AirData { aoa: f64, oat: f64 },
    GpsStatus(LevilGpsStatus),
}

fn require(data: &[u8], len: usize, kind: &'static str) -> Result<()> {
    if data.len() < len {
        return Err(EfisError::InvalidLength {
            kind,
            expected: len,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decode a `~LE` frame.
pub fn decode_levil(data: &[u8]) -> Result<LevilMessage> {
    require(data, 5, "Levil header")?;
    if data[1] != LEVIL_ID || data[2] != b'E' {
        return Err(EfisError::BadMarker("Levil"));
    }
    let (sub, version) = (data[3], data[4]);

    match sub {
        0 => {
            require(data, 11, "Levil status")?;
            Ok(LevilMessage::Status(LevilStatus {
                version,
                firmware: data[5],
                battery_pct: data[6],
                error_code: unsigned16(&data[7..], Endian::Big),
                waas: (version == 2).then_some(data[9] == 1),
            }))
        }
        1 => {
            if data.len() != LEVIL_AHRS_LEN {
                return Err(EfisError::InvalidLength {
                    kind: "Levil AHRS",
                    expected: LEVIL_AHRS_LEN,
                    actual: data.len(),
                });
            }
            decode_levil_ahrs(data, version).map(LevilMessage::Ahrs)
        }
        2 => {
            require(data, 7, "Levil air data")?;
            Ok(LevilMessage::AirData {
                aoa: data[5] as f64,
                oat: c_to_f(data[6] as f64),
            })
        }
        7 => {
            require(data, 10, "Levil GPS status")?;
            Ok(LevilMessage::GpsStatus(LevilGpsStatus {
                waas: data[5] == 1,
                sats: data[6],
                power_source: unsigned16(&data[7..], Endian::Big),
                output_rate: data[9],
            }))
        }
        _ => Err(EfisError::UnknownSubtype { id: LEVIL_ID, sub }),
    }
}

fn decode_levil_ahrs(data: &[u8], version: u8) -> Result<LevilAhrs> {
    let word = |at: usize| signed16(&data[at..], Endian::Big);
    let ias = word(17);
    let (aoa, oat) = if version == 2 {
        (Some(data[23] as f64), Some(c_to_f(data[24] as f64)))
    } else {
        (None, None)
    };

    Ok(LevilAhrs {
        version,
        roll: word(5) as f64 * 0.1,
        pitch: word(7) as f64 * 0.1,
        yaw: word(9) as f64 * 0.1,
        // word(11) is inclination, unused
        slip_skid: word(13) as f64 * 0.01,
        vert_g: word(15) as f64 * 0.1,
        ias: (ias != I16_UNAVAILABLE).then_some(ias as f64),
        pressure_alt: unsigned16(&data[19..], Endian::Big) as i32 - PALT_OFFSET,
        vsi: word(21) as i32,
        aoa,
        oat,
    })
}

impl LevilMessage {
    /// Write the carried fields into the records they belong to.
    pub fn apply(
        &self,
        att: &mut AttitudeRecord,
        air: &mut AirDataRecord,
        gps: &mut GpsRecord,
        device: &mut DeviceRecord,
    ) {
        match self {
            LevilMessage::Status(s) => {
                device.firmware = Some(s.firmware as u16);
                device.battery_pct = Some(s.battery_pct);
                device.error_code = Some(s.error_code);
                if s.waas.is_some() {
                    gps.waas = s.waas;
                }
            }
            LevilMessage::Ahrs(a) => {
                att.roll = Some(a.roll);
                att.pitch = Some(a.pitch);
                att.yaw = Some(a.yaw);
                att.heading_mag = Some(a.yaw);
                att.slip_skid = Some(a.slip_skid);
                att.vert_g = Some(a.vert_g);
                air.ias = a.ias;
                air.alt_pressure = Some(a.pressure_alt);
                air.vsi = Some(a.vsi);
                if a.version == 2 {
                    air.aoa = a.aoa;
                    air.oat = a.oat;
                }
            }
            LevilMessage::AirData { aoa, oat } => {
                air.aoa = Some(*aoa);
                air.oat = Some(*oat);
            }
            LevilMessage::GpsStatus(g) => {
                gps.sats = Some(g.sats);
                gps.waas = Some(g.waas);
                device.power_source = Some(g.power_source);
                device.output_rate = Some(g.output_rate);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ForeFlight
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeFlightAhrs {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub heading: Option<f64>,
    /// True when `heading` is magnetic rather than true.
    pub heading_magnetic: bool,
    pub ias: Option<f64>,
    pub tas: Option<f64>,
}

/// Decode a ForeFlight extension frame. Only the AHRS sub-id is understood.
pub fn decode_foreflight(data: &[u8]) -> Result<ForeFlightAhrs> {
    require(data, 3, "ForeFlight header")?;
    let sub = data[2];
    if sub != 1 {
        return Err(EfisError::UnknownSubtype {
            id: FOREFLIGHT_ID,
            sub,
        });
    }
    require(data, 13, "ForeFlight AHRS")?;

    let angle = |at: usize| {
        let raw = signed16(&data[at..], Endian::Big);
        (raw != I16_UNAVAILABLE).then(|| raw as f64 / 10.0)
    };
    let speed = |at: usize| {
        let raw = unsigned16(&data[at..], Endian::Big);
        (raw != U16_UNAVAILABLE).then_some(raw as f64)
    };
    let heading = unsigned16(&data[7..], Endian::Big);

    Ok(ForeFlightAhrs {
        roll: angle(3),
        pitch: angle(5),
        heading: (heading != U16_UNAVAILABLE).then(|| (heading & 0x7FFF) as f64 / 10.0),
        heading_magnetic: heading != U16_UNAVAILABLE && heading & 0x8000 != 0,
        ias: speed(9),
        tas: speed(11),
    })
}

impl ForeFlightAhrs {
    pub fn apply(&self, att: &mut AttitudeRecord, air: &mut AirDataRecord) {
        att.roll = self.roll;
        att.pitch = self.pitch;
        att.yaw = self.heading;
        if self.heading_magnetic {
            att.heading_mag = self.heading;
        }
        air.ias = self.ias;
        air.tas = self.tas;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
