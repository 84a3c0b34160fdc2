//! Decode Dynon SkyView serial output frames.
//!
//! Frame layout: `'!'`, type byte, version byte, fixed-width ASCII fields,
//! two hex checksum characters, CRLF.
//! - Type `1`: ADAHRS (attitude, air data, wind), 74 bytes
//! - Type `2`: SYSTEM (heading/altitude bugs, CDI, autopilot, transponder), 93 bytes
//! - Type `3`: EMS (engine, fuel, thermocouples, GP inputs), 225 bytes

use log::debug;
use serde::Serialize;

use crate::records::{
    c_to_f, AirDataRecord, AttitudeRecord, EngineRecord, FuelRecord, GeneralPurpose, GpsRecord,
    NavRecord, TransponderStatus,
};
use crate::schema::{decode_fixed, gp, int, skip, text, DecodedFields, FieldSpec, Schema};
use crate::types::{EfisError, Result};

pub const ADAHRS: u8 = b'1';
pub const SYSTEM: u8 = b'2';
pub const EMS: u8 = b'3';

/// Longest SkyView frame (EMS).
pub const MAX_FRAME_LEN: usize = 225;

/// Standard sea-level pressure, inHg.
const STD_BARO: f64 = 29.921;
/// inHg of pressure change per foot near sea level.
const INHG_PER_FT: f64 = 0.00108;

/// Total frame length for a type byte, or `None` for an unknown type.
pub fn frame_len(msg_type: u8) -> Option<usize> {
    match msg_type {
        ADAHRS => Some(74),
        SYSTEM => Some(93),
        EMS => Some(225),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Field layouts
// ---------------------------------------------------------------------------

const ADAHRS_V1: &[FieldSpec] = &[
    int("hh", 2),
    int("mm", 2),
    int("ss", 2),
    int("ff", 2),
    int("pitch", 4),
    int("roll", 5),
    int("heading", 3),
    int("ias", 4),
    int("pres_alt", 6),
    int("turn_rate", 4),
    int("lat_accel", 3),
    int("vert_accel", 3),
    int("aoa", 2),
    int("vsi", 4),
    int("oat", 3),
    int("tas", 4),
    int("baro", 3),
    int("density_alt", 6),
    int("wind_dir", 3),
    int("wind_speed", 2),
    text("checksum", 2),
    skip("crlf", 2),
];

const SYSTEM_V2: &[FieldSpec] = &[
    int("hh", 2),
    int("mm", 2),
    int("ss", 2),
    int("ff", 2),
    int("head_bug", 3),
    int("alt_bug", 5),
    int("asi_bug", 4),
    int("vs_bug", 4),
    int("course", 3),
    text("cdi_src_type", 1),
    int("cdi_src_port", 1),
    int("cdi_scale", 2),
    int("cdi_deflection", 3),
    int("glideslope", 3),
    text("ap_engaged", 1),
    text("ap_roll_mode", 1),
    skip("unused1", 1),
    text("ap_pitch_mode", 1),
    skip("unused2", 1),
    int("ap_roll_force", 3),
    int("ap_roll_pos", 5),
    text("ap_roll_slip", 1),
    int("ap_pitch_force", 3),
    int("ap_pitch_pos", 5),
    text("ap_pitch_slip", 1),
    int("ap_yaw_force", 3),
    int("ap_yaw_pos", 5),
    text("ap_yaw_slip", 1),
    text("xpdr_status", 1),
    text("xpdr_reply", 1),
    text("xpdr_ident", 1),
    int("xpdr_code", 4),
    skip("unused3", 10),
    text("checksum", 2),
    skip("crlf", 2),
];

const EMS_V2: &[FieldSpec] = &[
    int("hh", 2),
    int("mm", 2),
    int("ss", 2),
    int("ff", 2),
    int("oil_press", 3),
    int("oil_temp", 4),
    int("rpm_l", 4),
    int("rpm_r", 4),
    int("map", 3),
    int("ff1", 3),
    int("ff2", 3),
    int("fuel_press", 3),
    int("fuel_l", 3),
    int("fuel_r", 3),
    int("fuel_remain", 3),
    int("volts1", 3),
    int("volts2", 3),
    int("amps", 4),
    int("hobbs", 5),
    int("tach", 5),
    int("tc1", 4),
    int("tc2", 4),
    int("tc3", 4),
    int("tc4", 4),
    int("tc5", 4),
    int("tc6", 4),
    int("tc7", 4),
    int("tc8", 4),
    int("tc9", 4),
    int("tc10", 4),
    int("tc11", 4),
    int("tc12", 4),
    int("tc13", 4),
    int("tc14", 4),
    gp("gp1", 6),
    gp("gp2", 6),
    gp("gp3", 6),
    gp("gp4", 6),
    gp("gp5", 6),
    gp("gp6", 6),
    gp("gp7", 6),
    gp("gp8", 6),
    gp("gp9", 6),
    gp("gp10", 6),
    gp("gp11", 6),
    gp("gp12", 6),
    gp("gp13", 6),
    skip("contacts", 16),
    int("power_pct", 3),
    text("egt_state", 1),
    text("checksum", 2),
    skip("crlf", 2),
];

/// Known layouts, newest version last within each type.
pub const SCHEMAS: &[Schema] = &[
    Schema {
        msg_type: ADAHRS,
        version: b'1',
        header_len: 3,
        fields: ADAHRS_V1,
    },
    Schema {
        msg_type: SYSTEM,
        version: b'2',
        header_len: 3,
        fields: SYSTEM_V2,
    },
    Schema {
        msg_type: EMS,
        version: b'2',
        header_len: 3,
        fields: EMS_V2,
    },
];

/// Thermocouples carrying EGT, cylinder 1..6.
const EGT_CHANNELS: [&str; 6] = ["tc12", "tc10", "tc8", "tc6", "tc4", "tc2"];
/// Thermocouples carrying CHT, cylinder 1..6.
const CHT_CHANNELS: [&str; 6] = ["tc11", "tc9", "tc7", "tc5", "tc3", "tc1"];

const GP_CHANNELS: [&str; 13] = [
    "gp1", "gp2", "gp3", "gp4", "gp5", "gp6", "gp7", "gp8", "gp9", "gp10", "gp11", "gp12", "gp13",
];

/// Pick the layout for (type, version). An unknown version falls back to the
/// newest layout of that type.
pub fn schema_for(msg_type: u8, version: u8) -> Option<&'static Schema> {
    if let Some(s) = SCHEMAS
        .iter()
        .find(|s| s.msg_type == msg_type && s.version == version)
    {
        return Some(s);
    }
    let fallback = SCHEMAS.iter().rev().find(|s| s.msg_type == msg_type)?;
    debug!(
        "SkyView type {} version {:?} unknown, using version {}",
        msg_type as char, version as char, fallback.version as char
    );
    Some(fallback)
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// 8-bit sum of every byte before the checksum field.
pub fn compute_checksum(frame: &[u8]) -> u8 {
    let end = frame.len().saturating_sub(4);
    frame[..end].iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Compare the two hex checksum characters against the computed sum.
pub fn checksum_ok(frame: &[u8]) -> bool {
    if frame.len() < 5 {
        return false;
    }
    let n = frame.len() - 4;
    std::str::from_utf8(&frame[n..n + 2])
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .is_some_and(|sum| sum == compute_checksum(frame))
}

// ---------------------------------------------------------------------------
// Decoded messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdahrsMessage {
    pub time: Option<String>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub heading_mag: Option<f64>,
    pub ias: Option<f64>,
    pub pres_alt: Option<i32>,
    pub turn_rate: Option<f64>,
    pub vert_g: Option<f64>,
    pub aoa: Option<f64>,
    pub vsi: Option<i32>,
    pub oat: Option<f64>,
    pub tas: Option<f64>,
    pub baro: Option<f64>,
    pub baro_diff: Option<f64>,
    pub alt: Option<i32>,
    pub density_alt: Option<i32>,
    pub wind_dir: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_dir_corr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMessage {
    pub time: Option<String>,
    pub head_bug: Option<i32>,
    pub alt_bug: Option<i32>,
    pub asi_bug: Option<f64>,
    pub vs_bug: Option<f64>,
    pub course: Option<i32>,
    pub source_desc: Option<String>,
    pub source_port: Option<i32>,
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
    pub xpdr_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmsMessage {
    pub time: Option<String>,
    pub oil_press: Option<i32>,
    pub oil_temp: Option<i32>,
    pub rpm: Option<i32>,
    pub man_press: Option<f64>,
    pub fuel_flow: Option<f64>,
    pub fuel_flow2: Option<f64>,
    pub fuel_press: Option<f64>,
    pub fuel_left: Option<f64>,
    pub fuel_right: Option<f64>,
    pub fuel_remain: Option<f64>,
    pub volts1: Option<f64>,
    pub volts2: Option<f64>,
    pub amps: Option<f64>,
    pub hobbs: Option<f64>,
    pub tach: Option<f64>,
    pub egt: [Option<i32>; 6],
    pub cht: [Option<i32>; 6],
    pub general_purpose: Vec<GeneralPurpose>,
    pub power_pct: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SkyviewMessage {
    Adahrs(AdahrsMessage),
    System(SystemMessage),
    Ems(EmsMessage),
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one synchronized SkyView frame.
///
/// A malformed field fails the whole frame; sentinel fields decode to `None`.
pub fn decode(frame: &[u8]) -> Result<SkyviewMessage> {
    if frame.len() < 3 || frame[0] != b'!' {
        return Err(EfisError::BadMarker("SkyView"));
    }
    let (msg_type, version) = (frame[1], frame[2]);
    let schema = schema_for(msg_type, version).ok_or(EfisError::UnknownMessage(msg_type))?;
    let fields = decode_fixed(schema, frame)?;

    match msg_type {
        ADAHRS => decode_adahrs(&fields).map(SkyviewMessage::Adahrs),
        SYSTEM => decode_system(&fields).map(SkyviewMessage::System),
        _ => decode_ems(&fields).map(SkyviewMessage::Ems),
    }
}

fn time_string(f: &DecodedFields) -> Result<Option<String>> {
    Ok(match (f.int("hh")?, f.int("mm")?, f.int("ss")?) {
        (Some(h), Some(m), Some(s)) => Some(format!("{h}:{m:02}:{s:02}")),
        _ => None,
    })
}

fn int32(f: &DecodedFields, name: &'static str) -> Result<Option<i32>> {
    Ok(f.int(name)?.map(|v| v as i32))
}

fn int_scaled32(f: &DecodedFields, name: &'static str, scale: i32) -> Result<Option<i32>> {
    Ok(f.int(name)?.map(|v| v as i32 * scale))
}

/// `'0'`/`'1'` flag; anything else is unknown.
fn flag(code: u8) -> Option<bool> {
    match code {
        b'0' => Some(false),
        b'1' => Some(true),
        _ => None,
    }
}

fn mode_char(code: u8) -> Option<char> {
    (code != b'X' && code.is_ascii_graphic()).then_some(code as char)
}

fn decode_adahrs(f: &DecodedFields) -> Result<AdahrsMessage> {
    let heading_mag = f.scaled("heading", 1.0)?;
    let pres_alt = int32(f, "pres_alt")?;
    let baro = f.int("baro")?.map(|raw| (raw as f64 + 2750.0) / 100.0);
    let baro_diff = baro.map(|b| b - STD_BARO);
    let alt = match (pres_alt, baro_diff) {
        (Some(p), Some(d)) => Some((p as f64 + d / INHG_PER_FT) as i32),
        _ => None,
    };
    let wind_dir = f.scaled("wind_dir", 1.0)?;
    let wind_dir_corr = match (heading_mag, wind_dir) {
        (Some(h), Some(w)) => Some((h - w).rem_euclid(360.0)),
        _ => None,
    };

    Ok(AdahrsMessage {
        time: time_string(f)?,
        pitch: f.divided("pitch", 10.0)?,
        roll: f.divided("roll", 10.0)?,
        heading_mag,
        ias: f.scaled("ias", 0.1)?,
        pres_alt,
        turn_rate: f.scaled("turn_rate", 0.1)?,
        vert_g: f.scaled("vert_accel", 0.1)?,
        // No AOA sensor reports `XX`; displays expect zero rather than blank.
        aoa: Some(f.scaled("aoa", 1.0)?.unwrap_or(0.0)),
        vsi: int_scaled32(f, "vsi", 10)?,
        oat: f.scaled("oat", 1.0)?.map(c_to_f),
        tas: f.scaled("tas", 0.1)?,
        baro,
        baro_diff,
        alt,
        density_alt: int32(f, "density_alt")?,
        wind_dir,
        wind_speed: f.scaled("wind_speed", 1.0)?,
        wind_dir_corr,
    })
}

fn decode_system(f: &DecodedFields) -> Result<SystemMessage> {
    let source_port = int32(f, "cdi_src_port")?;
    let source_type = match f.code("cdi_src_type")? {
        b'0' => Some("GPS"),
        b'1' => Some("NAV"),
        b'2' => Some("LOC"),
        _ => None,
    };
    let source_desc = source_type.map(|t| match source_port {
        Some(p) => format!("{t}{p}"),
        None => t.to_string(),
    });
    let ap_engaged = match f.code("ap_engaged")? {
        b'0' => Some(false),
        b'1'..=b'7' => Some(true),
        _ => None,
    };

    Ok(SystemMessage {
        time: time_string(f)?,
        head_bug: int32(f, "head_bug")?,
        alt_bug: int_scaled32(f, "alt_bug", 10)?,
        asi_bug: f.divided("asi_bug", 10.0)?,
        vs_bug: f.divided("vs_bug", 10.0)?,
        course: int32(f, "course")?,
        source_desc,
        source_port,
        cdi_scale: f.divided("cdi_scale", 10.0)?,
        cdi_deflection: int32(f, "cdi_deflection")?,
        gs_deviation: int32(f, "glideslope")?,
        ap_engaged,
        ap_roll_mode: mode_char(f.code("ap_roll_mode")?),
        ap_pitch_mode: mode_char(f.code("ap_pitch_mode")?),
        ap_roll_force: int32(f, "ap_roll_force")?,
        ap_roll_pos: int32(f, "ap_roll_pos")?,
        ap_roll_slip: flag(f.code("ap_roll_slip")?),
        ap_pitch_force: int32(f, "ap_pitch_force")?,
        ap_pitch_pos: int32(f, "ap_pitch_pos")?,
        ap_pitch_slip: flag(f.code("ap_pitch_slip")?),
        ap_yaw_force: int32(f, "ap_yaw_force")?,
        ap_yaw_pos: int32(f, "ap_yaw_pos")?,
        ap_yaw_slip: flag(f.code("ap_yaw_slip")?),
        xpdr_status: TransponderStatus::from_code(f.code("xpdr_status")?),
        xpdr_reply: flag(f.code("xpdr_reply")?),
        xpdr_ident: flag(f.code("xpdr_ident")?),
        xpdr_code: f.int("xpdr_code")?.map(|c| format!("{c:04}")),
    })
}

fn thermocouples(f: &DecodedFields, channels: &[&'static str; 6]) -> Result<[Option<i32>; 6]> {
    let mut out = [None; 6];
    for (slot, name) in out.iter_mut().zip(channels.iter().copied()) {
        *slot = f.int(name)?.map(|c| c_to_f(c as f64).round() as i32);
    }
    Ok(out)
}

fn decode_ems(f: &DecodedFields) -> Result<EmsMessage> {
    let rpm = match (int32(f, "rpm_l")?, int32(f, "rpm_r")?) {
        (Some(l), Some(r)) => Some(l.max(r)),
        (l, r) => l.or(r),
    };
    let general_purpose = GP_CHANNELS
        .iter()
        .copied()
        .map(|name| {
            f.gp(name).map(|(value, unit)| GeneralPurpose {
                value,
                unit: unit as char,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EmsMessage {
        time: time_string(f)?,
        oil_press: int32(f, "oil_press")?,
        oil_temp: int32(f, "oil_temp")?,
        rpm,
        man_press: f.divided("map", 10.0)?,
        fuel_flow: f.divided("ff1", 10.0)?,
        fuel_flow2: f.divided("ff2", 10.0)?,
        fuel_press: f.divided("fuel_press", 10.0)?,
        fuel_left: f.divided("fuel_l", 10.0)?,
        fuel_right: f.divided("fuel_r", 10.0)?,
        fuel_remain: f.divided("fuel_remain", 10.0)?,
        volts1: f.divided("volts1", 10.0)?,
        volts2: f.divided("volts2", 10.0)?,
        amps: f.divided("amps", 10.0)?,
        hobbs: f.divided("hobbs", 10.0)?,
        tach: f.divided("tach", 10.0)?,
        egt: thermocouples(f, &EGT_CHANNELS)?,
        cht: thermocouples(f, &CHT_CHANNELS)?,
        general_purpose,
        power_pct: int32(f, "power_pct")?,
    })
}

// ---------------------------------------------------------------------------
// Record updates
// ---------------------------------------------------------------------------

impl AdahrsMessage {
    pub fn apply(&self, att: &mut AttitudeRecord, air: &mut AirDataRecord) {
        att.pitch = self.pitch;
        att.roll = self.roll;
        att.heading_mag = self.heading_mag;
        att.yaw = self.heading_mag;
        att.turn_rate = self.turn_rate;
        att.vert_g = self.vert_g;

        air.ias = self.ias;
        air.tas = self.tas;
        air.alt_pressure = self.pres_alt;
        air.alt = self.alt;
        air.alt_density = self.density_alt;
        air.baro = self.baro;
        air.baro_diff = self.baro_diff;
        air.oat = self.oat;
        air.aoa = self.aoa;
        air.vsi = self.vsi;
        air.wind_dir = self.wind_dir;
        air.wind_speed = self.wind_speed;
        air.wind_dir_corr = self.wind_dir_corr;
    }
}

impl SystemMessage {
    pub fn apply(&self, nav: &mut NavRecord) {
        nav.head_bug = self.head_bug;
        nav.alt_bug = self.alt_bug;
        nav.asi_bug = self.asi_bug;
        nav.vs_bug = self.vs_bug;
        nav.course = self.course;
        nav.source_desc = self.source_desc.clone();
        nav.source_port = self.source_port;
        nav.cdi_scale = self.cdi_scale;
        nav.cdi_deflection = self.cdi_deflection;
        nav.gs_deviation = self.gs_deviation;
        nav.ap_engaged = self.ap_engaged;
        nav.ap_roll_mode = self.ap_roll_mode;
        nav.ap_pitch_mode = self.ap_pitch_mode;
        nav.ap_roll_force = self.ap_roll_force;
        nav.ap_roll_pos = self.ap_roll_pos;
        nav.ap_roll_slip = self.ap_roll_slip;
        nav.ap_pitch_force = self.ap_pitch_force;
        nav.ap_pitch_pos = self.ap_pitch_pos;
        nav.ap_pitch_slip = self.ap_pitch_slip;
        nav.ap_yaw_force = self.ap_yaw_force;
        nav.ap_yaw_pos = self.ap_yaw_pos;
        nav.ap_yaw_slip = self.ap_yaw_slip;
        nav.xpdr_status = self.xpdr_status;
        nav.xpdr_reply = self.xpdr_reply;
        nav.xpdr_ident = self.xpdr_ident;
        nav.xpdr_code = self.xpdr_code.clone();
    }
}

impl EmsMessage {
    pub fn apply(&self, engine: &mut EngineRecord, fuel: &mut FuelRecord) {
        engine.rpm = self.rpm;
        engine.oil_press = self.oil_press;
        engine.oil_temp = self.oil_temp;
        engine.man_press = self.man_press;
        engine.fuel_flow = self.fuel_flow;
        engine.fuel_flow2 = self.fuel_flow2;
        engine.fuel_press = self.fuel_press;
        engine.volts1 = self.volts1;
        engine.volts2 = self.volts2;
        engine.amps = self.amps;
        engine.hobbs = self.hobbs;
        engine.tach = self.tach;
        engine.egt = self.egt;
        engine.cht = self.cht;
        engine.general_purpose = self.general_purpose.clone();
        engine.power_pct = self.power_pct;

        fuel.levels = [self.fuel_left, self.fuel_right, None, None];
        fuel.remain = self.fuel_remain;
    }
}

impl SkyviewMessage {
    /// Clock carried by every frame type.
    pub fn time(&self) -> Option<&str> {
        match self {
            SkyviewMessage::Adahrs(m) => m.time.as_deref(),
            SkyviewMessage::System(m) => m.time.as_deref(),
            SkyviewMessage::Ems(m) => m.time.as_deref(),
        }
    }

    pub fn apply_time(&self, gps: &mut GpsRecord) {
        if let Some(t) = self.time() {
            gps.time = Some(t.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Append the checksum and CRLF to a frame body.
    pub(crate) fn finish(body: &str) -> Vec<u8> {
        let mut frame = body.as_bytes().to_vec();
        frame.extend_from_slice(b"XX\r\n");
        let sum = compute_checksum(&frame);
        let n = frame.len() - 4;
        frame[n..n + 2].copy_from_slice(format!("{sum:02X}").as_bytes());
        frame
    }

    pub(crate) fn adahrs_frame() -> Vec<u8> {
        finish(concat!(
            "!11", "12345678", "+052", "-0123", "271", "1205", "+04500", "+012", "-05", "+10",
            "XX", "-050", "+15", "1300", "250", "+05200", "300", "15",
        ))
    }

    pub(crate) fn system_frame() -> Vec<u8> {
        finish(concat!(
            "!22", "12345678", "090", "00550", "0850", "+050", "270", "1", "2", "05", "-20",
            "+05", "1", "H", "X", "A", "X", "+05", "+1000", "0", "-03", "-0500", "0", "XXX",
            "XXXXX", "X", "3", "1", "0", "1200", "XXXXXXXXXX",
        ))
    }

    pub(crate) fn ems_frame() -> Vec<u8> {
        let mut body = String::from("!32");
        body.push_str("12345678");
        body.push_str("065"); // oil press
        body.push_str("0090"); // oil temp
        body.push_str("2400"); // rpm L
        body.push_str("2450"); // rpm R
        body.push_str("245"); // MAP
        body.push_str("095"); // FF1
        body.push_str("XXX"); // FF2
        body.push_str("055"); // fuel press
        body.push_str("120"); // fuel L
        body.push_str("115"); // fuel R
        body.push_str("235"); // remaining
        body.push_str("138"); // volts 1
        body.push_str("XXX"); // volts 2
        body.push_str("+125"); // amps
        body.push_str("01234"); // hobbs
        body.push_str("01100"); // tach
        for tc in 1..=14 {
            body.push_str(&format!("{:04}", 100 + tc));
        }
        for gp in 1..=13 {
            if gp == 4 {
                body.push_str("+XXXXG");
            } else {
                body.push_str(&format!("+{:04}P", gp * 10));
            }
        }
        body.push_str(&"0".repeat(16));
        body.push_str("075");
        body.push('0');
        finish(&body)
    }

    fn adahrs(frame: &[u8]) -> AdahrsMessage {
        match decode(frame).unwrap() {
            SkyviewMessage::Adahrs(m) => m,
            other => panic!("expected ADAHRS, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_lengths_match_frame_table() {
        for schema in SCHEMAS {
            assert_eq!(Some(schema.frame_len()), frame_len(schema.msg_type));
        }
        assert_eq!(adahrs_frame().len(), 74);
        assert_eq!(system_frame().len(), 93);
        assert_eq!(ems_frame().len(), 225);
    }

    #[test]
    fn test_checksum() {
        let frame = adahrs_frame();
        assert!(checksum_ok(&frame));
        let mut bad = frame.clone();
        bad[10] = b'9';
        assert!(!checksum_ok(&bad));
    }

    // -- ADAHRS --

    #[test]
    fn test_decode_adahrs_attitude() {
        let m = adahrs(&adahrs_frame());
        assert_eq!(m.time.as_deref(), Some("12:34:56"));
        assert_eq!(m.pitch, Some(52.0 / 10.0));
        assert_eq!(m.roll, Some(-123.0 / 10.0));
        assert_eq!(m.heading_mag, Some(271.0));
        assert_eq!(m.turn_rate, Some(12.0 * 0.1));
        assert_eq!(m.vert_g, Some(10.0 * 0.1));
    }

    #[test]
    fn test_decode_adahrs_air_data() {
        let m = adahrs(&adahrs_frame());
        assert_eq!(m.ias, Some(1205.0 * 0.1));
        assert_eq!(m.tas, Some(1300.0 * 0.1));
        assert_eq!(m.pres_alt, Some(4500));
        assert_eq!(m.vsi, Some(-500));
        assert_eq!(m.oat, Some(15.0 * 1.8 + 32.0));
        assert_eq!(m.baro, Some(30.0));
        assert_eq!(m.alt, Some(4573));
        assert_eq!(m.density_alt, Some(5200));
        assert_eq!(m.wind_dir, Some(300.0));
        assert_eq!(m.wind_speed, Some(15.0));
        assert_eq!(m.wind_dir_corr, Some(331.0));
    }

    #[test]
    fn test_adahrs_aoa_sentinel_is_zero() {
        assert_eq!(adahrs(&adahrs_frame()).aoa, Some(0.0));
    }

    #[test]
    fn test_adahrs_numeric_aoa() {
        let text = String::from_utf8(adahrs_frame()).unwrap();
        let body = format!("{}07{}", &text[..43], &text[45..70]);
        let m = adahrs(&finish(&body));
        assert_eq!(m.aoa, Some(7.0));
        assert_eq!(m.vsi, Some(-500));
    }

    #[test]
    fn test_adahrs_sentinel_fields_are_null() {
        let text = String::from_utf8(adahrs_frame()).unwrap();
        // IAS and wind direction unavailable
        let body = format!("{}XXXX{}XXX{}", &text[..23], &text[27..65], &text[68..70]);
        let m = adahrs(&finish(&body));
        assert_eq!(m.ias, None);
        assert_eq!(m.wind_dir, None);
        assert_eq!(m.wind_dir_corr, None);
        assert_eq!(m.pitch, Some(5.2));
    }

    #[test]
    fn test_adahrs_pitch_roll_tenths_sweep() {
        let text = String::from_utf8(adahrs_frame()).unwrap();
        for raw in [-900i32, -1, 0, 7, 455, 900] {
            let body = format!("{}{:+04}{:+05}{}", &text[..11], raw, raw, &text[20..70]);
            let m = adahrs(&finish(&body));
            assert_eq!(m.pitch, Some(raw as f64 / 10.0));
            assert_eq!(m.roll, Some(raw as f64 / 10.0));
        }
    }

    #[test]
    fn test_malformed_field_is_error() {
        let mut frame = adahrs_frame();
        frame[12] = b'?';
        assert!(matches!(
            decode(&frame),
            Err(EfisError::MalformedField { field: "pitch", .. })
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(
            decode(b"!91abc"),
            Err(EfisError::UnknownMessage(b'9'))
        ));
        assert!(matches!(decode(b"?11"), Err(EfisError::BadMarker(_))));
    }

    #[test]
    fn test_unknown_version_uses_newest_layout() {
        let mut frame = adahrs_frame();
        frame[2] = b'7';
        assert_eq!(adahrs(&frame).pitch, Some(5.2));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let frame = adahrs_frame();
        assert_eq!(decode(&frame).unwrap(), decode(&frame).unwrap());
    }

    // -- SYSTEM --

    #[test]
    fn test_decode_system() {
        let m = match decode(&system_frame()).unwrap() {
            SkyviewMessage::System(m) => m,
            other => panic!("expected SYSTEM, got {other:?}"),
        };
        assert_eq!(m.head_bug, Some(90));
        assert_eq!(m.alt_bug, Some(5500));
        assert_eq!(m.asi_bug, Some(85.0));
        assert_eq!(m.vs_bug, Some(5.0));
        assert_eq!(m.course, Some(270));
        assert_eq!(m.source_desc.as_deref(), Some("NAV2"));
        assert_eq!(m.cdi_scale, Some(0.5));
        assert_eq!(m.cdi_deflection, Some(-20));
        assert_eq!(m.gs_deviation, Some(5));
        assert_eq!(m.ap_engaged, Some(true));
        assert_eq!(m.ap_roll_mode, Some('H'));
        assert_eq!(m.ap_roll_pos, Some(1000));
        assert_eq!(m.ap_pitch_force, Some(-3));
        assert_eq!(m.ap_yaw_force, None);
        assert_eq!(m.ap_yaw_slip, None);
        assert_eq!(m.xpdr_status, Some(TransponderStatus::Alt));
        assert_eq!(m.xpdr_reply, Some(true));
        assert_eq!(m.xpdr_ident, Some(false));
        assert_eq!(m.xpdr_code.as_deref(), Some("1200"));
    }

    // -- EMS --

    #[test]
    fn test_decode_ems() {
        let m = match decode(&ems_frame()).unwrap() {
            SkyviewMessage::Ems(m) => m,
            other => panic!("expected EMS, got {other:?}"),
        };
        assert_eq!(m.time.as_deref(), Some("12:34:56"));
        assert_eq!(m.rpm, Some(2450));
        assert_eq!(m.oil_press, Some(65));
        assert_eq!(m.man_press, Some(24.5));
        assert_eq!(m.fuel_flow, Some(9.5));
        assert_eq!(m.fuel_flow2, None);
        assert_eq!(m.fuel_left, Some(12.0));
        assert_eq!(m.fuel_remain, Some(23.5));
        assert_eq!(m.volts2, None);
        assert_eq!(m.amps, Some(12.5));
        assert_eq!(m.power_pct, Some(75));
    }

    #[test]
    fn test_ems_thermocouple_mapping() {
        let m = match decode(&ems_frame()).unwrap() {
            SkyviewMessage::Ems(m) => m,
            other => panic!("expected EMS, got {other:?}"),
        };
        // TCn carries 100 + n degrees C
        assert_eq!(m.egt[0], Some(234)); // TC12: 112 C
        assert_eq!(m.egt[5], Some(216)); // TC2: 102 C
        assert_eq!(m.cht[0], Some(232)); // TC11: 111 C
        assert_eq!(m.cht[4], Some(217)); // TC3: 103 C
        assert_eq!(m.cht[5], Some(214)); // TC1: 101 C
    }

    #[test]
    fn test_ems_general_purpose_inputs() {
        let m = match decode(&ems_frame()).unwrap() {
            SkyviewMessage::Ems(m) => m,
            other => panic!("expected EMS, got {other:?}"),
        };
        assert_eq!(m.general_purpose.len(), 13);
        assert_eq!(m.general_purpose[0], GeneralPurpose { value: Some(10), unit: 'P' });
        assert_eq!(m.general_purpose[3], GeneralPurpose { value: None, unit: 'G' });
    }

    // -- Record updates --

    #[test]
    fn test_apply_overwrites_with_null() {
        let mut att = AttitudeRecord::default();
        let mut air = AirDataRecord {
            ias: Some(99.0),
            ..Default::default()
        };
        let text = String::from_utf8(adahrs_frame()).unwrap();
        let body = format!("{}XXXX{}", &text[..23], &text[27..70]);
        adahrs(&finish(&body)).apply(&mut att, &mut air);
        assert_eq!(air.ias, None);
        assert_eq!(att.yaw, Some(271.0));
    }

    #[test]
    fn test_apply_ems_fuel_levels() {
        let mut engine = EngineRecord::default();
        let mut fuel = FuelRecord::default();
        if let SkyviewMessage::Ems(m) = decode(&ems_frame()).unwrap() {
            m.apply(&mut engine, &mut fuel);
        }
        assert_eq!(fuel.levels, [Some(12.0), Some(11.5), None, None]);
        assert_eq!(engine.rpm, Some(2450));
    }
}
