//! Primitive field extraction from raw frame bytes.
//!
//! All readers are total: a slice shorter than the field returns 0 so that a
//! truncated tail at the end of a buffer never aborts a decode.

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// 16-bit unsigned integer from the first two bytes of `data`.
pub fn unsigned16(data: &[u8], endian: Endian) -> u16 {
    if data.len() < 2 {
        return 0;
    }
    let (b0, b1) = match endian {
        Endian::Big => (data[0], data[1]),
        Endian::Little => (data[1], data[0]),
    };
    ((b0 as u16) << 8) | b1 as u16
}

/// 16-bit two's-complement integer from the first two bytes of `data`.
pub fn signed16(data: &[u8], endian: Endian) -> i16 {
    unsigned16(data, endian) as i16
}

/// 24-bit unsigned integer from the first three bytes of `data`.
pub fn unsigned24(data: &[u8], endian: Endian) -> u32 {
    if data.len() < 3 {
        return 0;
    }
    let (b0, b1, b2) = match endian {
        Endian::Big => (data[0], data[1], data[2]),
        Endian::Little => (data[2], data[1], data[0]),
    };
    ((b0 as u32) << 16) | ((b1 as u32) << 8) | b2 as u32
}

/// 24-bit two's-complement integer from the first three bytes of `data`.
pub fn signed24(data: &[u8], endian: Endian) -> i32 {
    let val = unsigned24(data, endian) as i32;
    if val > 0x7F_FFFF {
        val - 0x100_0000
    } else {
        val
    }
}

/// Mask a byte, then shift the result.
///
/// Positive `shift` moves left, negative moves right. Used to stitch
/// nibble-aligned fields that straddle byte boundaries, e.g. the 12-bit
/// altitude `ddd` in bytes `dd dm`:
///
/// ```
/// use efis_core::codec::thunk_byte;
/// let (b12, b13) = (0x1A, 0x5C);
/// let alt = thunk_byte(b12, 0xFF, 4) + thunk_byte(b13, 0xF0, -4);
/// assert_eq!(alt, 0x1A5);
/// ```
pub fn thunk_byte(c: u8, mask: u8, shift: i8) -> u32 {
    let val = (c & mask) as u32;
    match shift {
        s if s < 0 => val >> s.unsigned_abs(),
        s if s > 0 => val << s,
        _ => val,
    }
}

/// Read a 12-bit field that starts on the high nibble of `data[0]`
/// (`aa ab` layout). Returns 0 on a short slice.
pub fn high12(data: &[u8]) -> u32 {
    if data.len() < 2 {
        return 0;
    }
    thunk_byte(data[0], 0xFF, 4) + thunk_byte(data[1], 0xF0, -4)
}

/// Read a 12-bit field that starts on the low nibble of `data[0]`
/// (`ba aa` layout). Returns 0 on a short slice.
pub fn low12(data: &[u8]) -> u32 {
    if data.len() < 2 {
        return 0;
    }
    thunk_byte(data[0], 0x0F, 8) + thunk_byte(data[1], 0xFF, 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encode24(n: i32) -> [u8; 3] {
        let v = (n as u32) & 0xFF_FFFF;
        [(v >> 16) as u8, (v >> 8) as u8, v as u8]
    }

    #[test]
    fn test_unsigned16_endianness() {
        assert_eq!(unsigned16(&[0x12, 0x34], Endian::Big), 0x1234);
        assert_eq!(unsigned16(&[0x12, 0x34], Endian::Little), 0x3412);
    }

    #[test]
    fn test_signed16_negative() {
        assert_eq!(signed16(&[0xFF, 0xFE], Endian::Big), -2);
        assert_eq!(signed16(&[0x7F, 0xFF], Endian::Big), 32767);
        assert_eq!(signed16(&[0x00, 0x80], Endian::Little), -32768);
    }

    #[test]
    fn test_unsigned24_endianness() {
        assert_eq!(unsigned24(&[0xAB, 0xCD, 0xEF], Endian::Big), 0xABCDEF);
        assert_eq!(unsigned24(&[0xAB, 0xCD, 0xEF], Endian::Little), 0xEFCDAB);
    }

    #[test]
    fn test_short_slices_return_zero() {
        assert_eq!(unsigned16(&[0x12], Endian::Big), 0);
        assert_eq!(signed16(&[], Endian::Little), 0);
        assert_eq!(unsigned24(&[0x01, 0x02], Endian::Big), 0);
        assert_eq!(signed24(&[0xFF], Endian::Big), 0);
        assert_eq!(high12(&[0xFF]), 0);
        assert_eq!(low12(&[]), 0);
    }

    #[test]
    fn test_signed24_boundaries() {
        for n in [-(1 << 23), -1, 0, 1, 0x1234, (1 << 23) - 1] {
            assert_eq!(signed24(&encode24(n), Endian::Big), n, "n = {n}");
        }
    }

    #[test]
    fn test_signed24_sweep() {
        // Walk the full range with a coprime stride so every byte pattern class
        // is visited without 16M iterations.
        let mut n: i64 = -(1 << 23);
        while n < (1 << 23) {
            let v = n as i32;
            assert_eq!(signed24(&encode24(v), Endian::Big), v);
            n += 4099;
        }
    }

    #[test]
    fn test_signed24_reads_prefix_only() {
        assert_eq!(signed24(&[0xFF, 0xFF, 0xFF, 0x12, 0x34], Endian::Big), -1);
    }

    #[test]
    fn test_thunk_byte_shifts() {
        assert_eq!(thunk_byte(0xAB, 0xF0, -4), 0x0A);
        assert_eq!(thunk_byte(0xAB, 0x0F, 0), 0x0B);
        assert_eq!(thunk_byte(0xAB, 0x0F, 8), 0xB00);
        assert_eq!(thunk_byte(0xAB, 0xFF, 4), 0xAB0);
    }

    #[test]
    fn test_twelve_bit_fields() {
        // hh hv vv: horizontal = 0x123, vertical = 0x456
        let bytes = [0x12, 0x34, 0x56];
        assert_eq!(high12(&bytes[0..2]), 0x123);
        assert_eq!(low12(&bytes[1..3]), 0x456);
    }
}
