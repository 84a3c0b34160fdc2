//! Shared types, error enum, and protocol metadata tables for efis-core.

use thiserror::Error;

/// All errors produced by efis-core.
#[derive(Debug, Error)]
pub enum EfisError {
    #[error("invalid frame length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("malformed field {field}: {raw:?}")]
    MalformedField { field: &'static str, raw: String },
    #[error("unknown field {0} in schema")]
    UnknownField(&'static str),
    #[error("unrecognized message id: {0}")]
    UnknownMessage(u8),
    #[error("unrecognized sub-id {sub} for message id {id}")]
    UnknownSubtype { id: u8, sub: u8 },
    #[error("not a {0} frame")]
    BadMarker(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl EfisError {
    pub fn malformed(field: &'static str, raw: &[u8]) -> Self {
        EfisError::MalformedField {
            field,
            raw: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EfisError>;

// ---------------------------------------------------------------------------
// GDL-90 message id metadata
// ---------------------------------------------------------------------------

/// Metadata for a GDL-90 message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgInfo {
    pub name: &'static str,
    /// Full frame length including both flag bytes and the FCS, when fixed.
    pub frame_len: Option<usize>,
}

/// Known GDL-90 message ids, including the ones SkyView emits but nobody
/// documents.
pub const GDL90_MSG_TABLE: &[(u8, MsgInfo)] = &[
    (
        0,
        MsgInfo {
            name: "Heartbeat",
            frame_len: Some(11),
        },
    ),
    (
        7,
        MsgInfo {
            name: "Uplink data",
            frame_len: None,
        },
    ),
    (
        10,
        MsgInfo {
            name: "Ownship report",
            frame_len: Some(32),
        },
    ),
    (
        11,
        MsgInfo {
            name: "Ownship geometric altitude",
            frame_len: Some(9),
        },
    ),
    (
        18,
        MsgInfo {
            name: "SkyView proprietary (55 bytes)",
            frame_len: None,
        },
    ),
    (
        20,
        MsgInfo {
            name: "Traffic report",
            frame_len: Some(32),
        },
    ),
    (
        0x4C,
        MsgInfo {
            name: "Levil / Stratux AHRS extension",
            frame_len: None,
        },
    ),
    (
        0x65,
        MsgInfo {
            name: "ForeFlight extension",
            frame_len: None,
        },
    ),
    (
        211,
        MsgInfo {
            name: "SkyView proprietary (53 bytes)",
            frame_len: None,
        },
    ),
];

/// Look up GDL-90 message metadata. Returns `None` for unrecognized ids.
pub fn msg_info(id: u8) -> Option<&'static MsgInfo> {
    GDL90_MSG_TABLE
        .iter()
        .find(|(i, _)| *i == id)
        .map(|(_, info)| info)
}

// ---------------------------------------------------------------------------
// Transponder address helpers
// ---------------------------------------------------------------------------

/// 24-bit transponder (ICAO) address, kept in the low bits of a u32.
pub type Address = u32;

/// Format an address as 6-char uppercase hex string.
pub fn address_to_string(addr: Address) -> String {
    format!("{:06X}", addr & 0xFF_FFFF)
}

/// Parse a 6-char hex string into an address.
pub fn address_from_hex(hex: &str) -> Option<Address> {
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Encode bytes as uppercase hex string (raw frame logging).
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let addr = address_from_hex("ABCDEF").unwrap();
        assert_eq!(addr, 0xABCDEF);
        assert_eq!(address_to_string(addr), "ABCDEF");
    }

    #[test]
    fn test_address_from_hex_rejects_bad_input() {
        assert!(address_from_hex("ABCD").is_none());
        assert!(address_from_hex("ZZZZZZ").is_none());
    }

    #[test]
    fn test_address_to_string_pads() {
        assert_eq!(address_to_string(0x00A1), "0000A1");
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x7E, 0x00, 0x81]), "7E0081");
    }

    #[test]
    fn test_msg_info() {
        assert_eq!(msg_info(20).unwrap().name, "Traffic report");
        assert_eq!(msg_info(20).unwrap().frame_len, Some(32));
        assert!(msg_info(99).is_none());
    }

    #[test]
    fn test_malformed_error_message() {
        let err = EfisError::malformed("pitch", b"12a4");
        assert_eq!(err.to_string(), "malformed field pitch: \"12a4\"");
    }
}
