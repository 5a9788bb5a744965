//! DXF group-code pairs.
//!
//! Everything in a DXF stream is a `(group code, value)` pair; the group
//! code alone decides the value's type. The classification table here is
//! shared by the text and binary front-ends and by the writer, so the
//! four of them can never disagree on a code's type.

use crate::error::{DwgError, Result};

/// Value type implied by a group code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Str,
    F64,
    I16,
    I32,
    I64,
    Bool,
    /// Hex-encoded handle value.
    Handle,
    /// Binary chunk (hex text in ASCII DXF, length-prefixed in binary).
    Bytes,
}

/// Classify a group code. Unknown codes default to `Str`, which matches
/// how permissive readers treat vendor extensions.
pub fn code_kind(code: i16) -> CodeKind {
    match code {
        0..=4 | 6..=9 => CodeKind::Str,
        5 | 105 => CodeKind::Handle,
        10..=59 => CodeKind::F64,
        60..=79 => CodeKind::I16,
        90..=99 => CodeKind::I32,
        100 | 102 => CodeKind::Str,
        110..=149 => CodeKind::F64,
        160..=169 => CodeKind::I64,
        170..=179 => CodeKind::I16,
        210..=239 => CodeKind::F64,
        270..=289 => CodeKind::I16,
        290..=299 => CodeKind::Bool,
        300..=309 => CodeKind::Str,
        310..=319 => CodeKind::Bytes,
        320..=329 => CodeKind::Handle,
        330..=369 => CodeKind::Handle,
        370..=389 => CodeKind::I16,
        390..=399 => CodeKind::Handle,
        400..=409 => CodeKind::I16,
        410..=419 => CodeKind::Str,
        420..=429 => CodeKind::I32,
        430..=439 => CodeKind::Str,
        440..=459 => CodeKind::I32,
        460..=469 => CodeKind::F64,
        470..=481 => CodeKind::Str,
        999 => CodeKind::Str,
        1000..=1003 => CodeKind::Str,
        1004 => CodeKind::Bytes,
        1005 => CodeKind::Handle,
        1010..=1059 => CodeKind::F64,
        1060..=1070 => CodeKind::I16,
        1071 => CodeKind::I32,
        _ => CodeKind::Str,
    }
}

/// A typed group-code value.
#[derive(Debug, Clone, PartialEq)]
pub enum PairValue {
    Str(String),
    F64(f64),
    I16(i16),
    I32(i32),
    I64(i64),
    Bool(bool),
    Handle(u64),
    Bytes(Vec<u8>),
}

/// One `(group code, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CodePair {
    pub code: i16,
    pub value: PairValue,
}

impl CodePair {
    pub fn new(code: i16, value: PairValue) -> Self {
        Self { code, value }
    }

    pub fn str(code: i16, value: impl Into<String>) -> Self {
        Self::new(code, PairValue::Str(value.into()))
    }

    /// Whether this is the given `(0, name)` marker pair.
    pub fn is_marker(&self, name: &str) -> bool {
        self.code == 0 && matches!(&self.value, PairValue::Str(s) if s == name)
    }

    /// String view; numeric values render through `Display`.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PairValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            PairValue::F64(v) => Some(v),
            PairValue::I16(v) => Some(v as f64),
            PairValue::I32(v) => Some(v as f64),
            PairValue::I64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            PairValue::I16(v) => Some(v as i64),
            PairValue::I32(v) => Some(v as i64),
            PairValue::I64(v) => Some(v),
            PairValue::Bool(v) => Some(v as i64),
            PairValue::Handle(v) => Some(v as i64),
            PairValue::F64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<u64> {
        match &self.value {
            PairValue::Handle(v) => Some(*v),
            PairValue::Str(s) => u64::from_str_radix(s.trim(), 16).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            PairValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Parse a raw text value into the typed form its code implies.
pub fn parse_value(code: i16, raw: &str) -> Result<PairValue> {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let value = match code_kind(code) {
        CodeKind::Str => PairValue::Str(raw.to_string()),
        CodeKind::F64 => PairValue::F64(
            raw.trim()
                .parse()
                .map_err(|_| bad_value(code, raw))?,
        ),
        CodeKind::I16 => PairValue::I16(
            raw.trim()
                .parse()
                .map_err(|_| bad_value(code, raw))?,
        ),
        CodeKind::I32 => PairValue::I32(
            raw.trim()
                .parse()
                .map_err(|_| bad_value(code, raw))?,
        ),
        CodeKind::I64 => PairValue::I64(
            raw.trim()
                .parse()
                .map_err(|_| bad_value(code, raw))?,
        ),
        CodeKind::Bool => PairValue::Bool(raw.trim() != "0"),
        CodeKind::Handle => PairValue::Handle(
            u64::from_str_radix(raw.trim(), 16).map_err(|_| bad_value(code, raw))?,
        ),
        CodeKind::Bytes => {
            let hex = raw.trim();
            if hex.len() % 2 != 0 {
                return Err(bad_value(code, raw));
            }
            let mut bytes = Vec::with_capacity(hex.len() / 2);
            for i in (0..hex.len()).step_by(2) {
                bytes.push(
                    u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad_value(code, raw))?,
                );
            }
            PairValue::Bytes(bytes)
        }
    };
    Ok(value)
}

fn bad_value(code: i16, raw: &str) -> DwgError {
    DwgError::Parse(format!("group {code}: unparsable value {raw:?}"))
}

/// A source of group-code pairs (ASCII or binary framing).
pub trait PairSource {
    /// The next pair, or `None` at end of stream.
    fn next_pair(&mut self) -> Result<Option<CodePair>>;
}

/// A sink for group-code pairs (ASCII or binary framing).
pub trait PairSink {
    fn write_pair(&mut self, pair: &CodePair) -> Result<()>;
}
