//! CRC-16-CCITT frame check sequence for GDL-90.
//!
//! Polynomial: x^16 + x^12 + x^5 + 1 (0x1021), initial value 0, no final XOR.
//! The FCS covers the message id and payload (flags and FCS excluded, after
//! un-stuffing) and is transmitted least significant byte first.

const GENERATOR: u16 = 0x1021;

// ---------------------------------------------------------------------------
// CRC lookup table (compile-time)
// ---------------------------------------------------------------------------

const fn build_crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ GENERATOR;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u16; 256] = build_crc_table();

// ---------------------------------------------------------------------------
// Core CRC functions
// ---------------------------------------------------------------------------

/// CRC-16 over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc = CRC_TABLE[(crc >> 8) as usize] ^ (crc << 8) ^ byte as u16;
    }
    crc
}

/// Check the trailing two FCS bytes of an un-stuffed message body
/// (`id payload fcs_lo fcs_hi`, no flags).
pub fn fcs_ok(body: &[u8]) -> bool {
    if body.len() < 3 {
        return false;
    }
    let n = body.len() - 2;
    let fcs = body[n] as u16 | (body[n + 1] as u16) << 8;
    crc16(&body[..n]) == fcs
}

/// Append the FCS (LSB first) to a message body.
pub fn append_fcs(body: &mut Vec<u8>) {
    let crc = crc16(body);
    body.push((crc & 0xFF) as u8);
    body.push((crc >> 8) as u8);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
