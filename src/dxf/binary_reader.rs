//! Binary DXF pair framing.
//!
//! A binary DXF file opens with a 22-byte sentinel, then carries the
//! same pair stream as ASCII with fixed-width framing: group codes are
//! 16-bit little-endian, strings are NUL-terminated, numeric values use
//! their natural little-endian widths, and binary chunks carry a one-
//! byte length prefix.

use byteorder::{ByteOrder, LittleEndian};

use crate::dxf::code_pair::{code_kind, CodeKind, CodePair, PairSource, PairValue};
use crate::error::{DwgError, Result};

/// The binary DXF file sentinel.
pub const BINARY_SENTINEL: &[u8; 22] = b"AutoCAD Binary DXF\r\n\x1a\0";

/// Reads pairs from an in-memory binary DXF image.
pub struct BinaryPairReader {
    data: Vec<u8>,
    pos: usize,
}

impl BinaryPairReader {
    /// Wrap a full file image, verifying the sentinel.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() < BINARY_SENTINEL.len() || &data[..BINARY_SENTINEL.len()] != BINARY_SENTINEL {
            return Err(DwgError::InvalidSentinel("binary DXF".into()));
        }
        Ok(Self {
            data,
            pos: BINARY_SENTINEL.len(),
        })
    }

    /// Whether a file image starts with the binary DXF sentinel.
    pub fn detect(data: &[u8]) -> bool {
        data.len() >= BINARY_SENTINEL.len() && &data[..BINARY_SENTINEL.len()] == BINARY_SENTINEL
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.pos + n > self.data.len() {
            return Err(DwgError::EndOfStream(self.pos as u64 * 8));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_cstr(&mut self) -> Result<String> {
        let start = self.pos;
        let end = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| start + i)
            .ok_or(DwgError::EndOfStream(self.data.len() as u64 * 8))?;
        let s = String::from_utf8_lossy(&self.data[start..end]).into_owned();
        self.pos = end + 1;
        Ok(s)
    }
}

impl PairSource for BinaryPairReader {
    fn next_pair(&mut self) -> Result<Option<CodePair>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let code = LittleEndian::read_u16(self.take(2)?) as i16;
        let value = match code_kind(code) {
            CodeKind::Str => PairValue::Str(self.take_cstr()?),
            CodeKind::Handle => {
                // handles are hex text even in binary framing
                let s = self.take_cstr()?;
                PairValue::Handle(
                    u64::from_str_radix(s.trim(), 16)
                        .map_err(|_| DwgError::Parse(format!("group {code}: bad handle {s:?}")))?,
                )
            }
            CodeKind::F64 => PairValue::F64(LittleEndian::read_f64(self.take(8)?)),
            CodeKind::I16 => PairValue::I16(LittleEndian::read_i16(self.take(2)?)),
            CodeKind::I32 => PairValue::I32(LittleEndian::read_i32(self.take(4)?)),
            CodeKind::I64 => PairValue::I64(LittleEndian::read_i64(self.take(8)?)),
            CodeKind::Bool => PairValue::Bool(self.take(1)?[0] != 0),
            CodeKind::Bytes => {
                let len = self.take(1)?[0] as usize;
                PairValue::Bytes(self.take(len)?.to_vec())
            }
        };
        Ok(Some(CodePair::new(code, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(body: &[u8]) -> Vec<u8> {
        let mut data = BINARY_SENTINEL.to_vec();
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_sentinel_required() {
        assert!(BinaryPairReader::new(b"not dxf".to_vec()).is_err());
        assert!(BinaryPairReader::detect(&image(&[])));
        assert!(!BinaryPairReader::detect(b"  0\nSECTION\n"));
    }

    #[test]
    fn test_pair_decoding() {
        let mut body = Vec::new();
        // (0, "EOF")
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(b"EOF\0");
        // (70, 513)
        body.extend_from_slice(&70i16.to_le_bytes());
        body.extend_from_slice(&513i16.to_le_bytes());
        // (40, 2.5)
        body.extend_from_slice(&40i16.to_le_bytes());
        body.extend_from_slice(&2.5f64.to_le_bytes());
        let mut r = BinaryPairReader::new(image(&body)).unwrap();
        assert!(r.next_pair().unwrap().unwrap().is_marker("EOF"));
        assert_eq!(r.next_pair().unwrap().unwrap().as_i64(), Some(513));
        assert_eq!(r.next_pair().unwrap().unwrap().as_f64(), Some(2.5));
        assert!(r.next_pair().unwrap().is_none());
    }

    #[test]
    fn test_truncated_value() {
        let mut body = Vec::new();
        body.extend_from_slice(&40i16.to_le_bytes());
        body.extend_from_slice(&[0, 1, 2]); // needs 8
        let mut r = BinaryPairReader::new(image(&body)).unwrap();
        assert!(r.next_pair().is_err());
    }
}
