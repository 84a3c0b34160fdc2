//! Declarative fixed-width field layouts and the generic decoder that walks them.
//!
//! A layout is an ordered list of [`FieldSpec`]s. [`decode_fixed`] slices a
//! frame according to the layout and converts each field by its kind. ASCII
//! numeric fields use runs of `'X'` as the "not available" sentinel: those
//! decode to `None`, never to a number. Any other non-numeric content is a
//! malformed field and fails the whole frame.

use crate::types::{EfisError, Result};

/// How the bytes of one field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Decimal integer with an optional leading sign.
    Int,
    /// Raw bytes, interpreted by the caller (mode letters, status codes).
    Text,
    /// General-purpose input: sign, digits, then a one-character unit code.
    Gp,
    /// Unused or framing bytes.
    Skip,
}

/// One field in a fixed-width layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: usize,
    pub kind: FieldKind,
}

pub const fn int(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width,
        kind: FieldKind::Int,
    }
}

pub const fn text(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width,
        kind: FieldKind::Text,
    }
}

pub const fn gp(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width,
        kind: FieldKind::Gp,
    }
}

pub const fn skip(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width,
        kind: FieldKind::Skip,
    }
}

/// A layout bound to a message type and version.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub msg_type: u8,
    pub version: u8,
    /// Bytes preceding the first field (marker, type, version).
    pub header_len: usize,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Total frame length this layout describes.
    pub fn frame_len(&self) -> usize {
        self.header_len + self.fields.iter().map(|f| f.width).sum::<usize>()
    }

    /// Byte offset of a field within the frame.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = self.header_len;
        for f in self.fields {
            if f.name == name {
                return Some(offset);
            }
            offset += f.width;
        }
        None
    }
}

/// A decoded field value, borrowing text from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Int(Option<i64>),
    Text(&'a [u8]),
    Gp { value: Option<i64>, unit: u8 },
}

/// Field values in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFields<'a> {
    entries: Vec<(&'static str, FieldValue<'a>)>,
}

impl<'a> DecodedFields<'a> {
    fn get(&self, name: &'static str) -> Result<FieldValue<'a>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .ok_or(EfisError::UnknownField(name))
    }

    /// Integer field; `Ok(None)` for the sentinel.
    pub fn int(&self, name: &'static str) -> Result<Option<i64>> {
        match self.get(name)? {
            FieldValue::Int(v) => Ok(v),
            _ => Err(EfisError::UnknownField(name)),
        }
    }

    /// Integer field converted to f64 and scaled.
    pub fn scaled(&self, name: &'static str, scale: f64) -> Result<Option<f64>> {
        Ok(self.int(name)?.map(|v| v as f64 * scale))
    }

    /// Integer field converted to f64 and divided.
    pub fn divided(&self, name: &'static str, divisor: f64) -> Result<Option<f64>> {
        Ok(self.int(name)?.map(|v| v as f64 / divisor))
    }

    pub fn text(&self, name: &'static str) -> Result<&'a [u8]> {
        match self.get(name)? {
            FieldValue::Text(t) => Ok(t),
            _ => Err(EfisError::UnknownField(name)),
        }
    }

    /// First byte of a single-character text field.
    pub fn code(&self, name: &'static str) -> Result<u8> {
        Ok(self.text(name)?.first().copied().unwrap_or(b' '))
    }

    pub fn gp(&self, name: &'static str) -> Result<(Option<i64>, u8)> {
        match self.get(name)? {
            FieldValue::Gp { value, unit } => Ok((value, unit)),
            _ => Err(EfisError::UnknownField(name)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Field conversion
// ---------------------------------------------------------------------------

/// True when the field is the "not available" placeholder: one or more `'X'`
/// after an optional sign.
pub fn is_sentinel(raw: &[u8]) -> bool {
    let digits = match raw.first() {
        Some(b'+') | Some(b'-') => &raw[1..],
        _ => raw,
    };
    !digits.is_empty() && digits.iter().all(|&b| b == b'X')
}

/// Parse a signed decimal field, mapping the sentinel to `None`.
pub fn parse_int(field: &'static str, raw: &[u8]) -> Result<Option<i64>> {
    if is_sentinel(raw) {
        return Ok(None);
    }
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| EfisError::malformed(field, raw))
}

/// Decode `frame` against `schema`. The frame length must match exactly.
pub fn decode_fixed<'a>(schema: &Schema, frame: &'a [u8]) -> Result<DecodedFields<'a>> {
    let expected = schema.frame_len();
    if frame.len() != expected {
        return Err(EfisError::InvalidLength {
            kind: "fixed-width frame",
            expected,
            actual: frame.len(),
        });
    }

    let mut entries = Vec::with_capacity(schema.fields.len());
    let mut offset = schema.header_len;
    for spec in schema.fields {
        let raw = &frame[offset..offset + spec.width];
        offset += spec.width;
        let value = match spec.kind {
            FieldKind::Int => FieldValue::Int(parse_int(spec.name, raw)?),
            FieldKind::Text => FieldValue::Text(raw),
            FieldKind::Gp => {
                let (digits, unit) = raw.split_at(raw.len().saturating_sub(1));
                FieldValue::Gp {
                    value: parse_int(spec.name, digits)?,
                    unit: unit.first().copied().unwrap_or(b' '),
                }
            }
            FieldKind::Skip => continue,
        };
        entries.push((spec.name, value));
    }

    Ok(DecodedFields { entries })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
