//! Bit-level stream reader.
//!
//! Reads the primitive wire types off a byte buffer with a sub-byte
//! cursor. Bits are consumed MSB-first within each byte; multi-byte
//! integers are little-endian byte sequences; handle values are
//! big-endian. Version-dependent behavior (TU vs TV text, compressed
//! extrusions/thicknesses, CMC sub-fields) keys off the version the
//! reader was built with — the document's flag, never a per-field one.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::Encoding;

use crate::error::{DwgError, Result};
use crate::types::version::DwgVersion;
use crate::types::{Color, Handle, HandleReference, Vector2, Vector3};

/// Bit-level reader over an in-memory section.
pub struct BitReader {
    data: Vec<u8>,
    /// Cursor in bits from the start of `data`.
    pos: u64,
    version: DwgVersion,
    encoding: &'static Encoding,
}

impl BitReader {
    /// Create a reader over raw section bytes.
    pub fn new(data: Vec<u8>, version: DwgVersion) -> Self {
        Self {
            data,
            pos: 0,
            version,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// The version this reader decodes for.
    pub fn version(&self) -> DwgVersion {
        self.version
    }

    /// Set the narrow-text code page.
    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
    }

    /// Current cursor position in bits.
    pub fn bit_position(&self) -> u64 {
        self.pos
    }

    /// Move the cursor to an absolute bit position.
    pub fn set_bit_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Advance to the next byte boundary.
    pub fn align(&mut self) {
        self.pos = (self.pos + 7) & !7;
    }

    /// Total stream length in bits.
    pub fn total_bits(&self) -> u64 {
        self.data.len() as u64 * 8
    }

    /// Whether the cursor is at (or past) the end.
    pub fn at_end(&self) -> bool {
        self.pos >= self.total_bits()
    }

    /// The underlying bytes (for CRC verification over a byte range).
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    // ---------------------------------------------------------------
    // Primitives
    // ---------------------------------------------------------------

    /// Read a single bit (B).
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.total_bits() {
            return Err(DwgError::EndOfStream(self.pos));
        }
        let byte = self.data[(self.pos / 8) as usize];
        let bit = (byte >> (7 - (self.pos % 8) as u8)) & 1;
        self.pos += 1;
        Ok(bit != 0)
    }

    /// Read two bits (BB).
    pub fn read_2bits(&mut self) -> Result<u8> {
        let hi = self.read_bit()? as u8;
        let lo = self.read_bit()? as u8;
        Ok((hi << 1) | lo)
    }

    /// Read three bits.
    pub fn read_3bits(&mut self) -> Result<u8> {
        let v = self.read_2bits()?;
        Ok((v << 1) | self.read_bit()? as u8)
    }

    /// Read a raw byte (RC), honoring the bit shift.
    pub fn read_rc(&mut self) -> Result<u8> {
        if self.pos % 8 == 0 {
            let idx = (self.pos / 8) as usize;
            if idx >= self.data.len() {
                return Err(DwgError::EndOfStream(self.pos));
            }
            self.pos += 8;
            return Ok(self.data[idx]);
        }
        let mut v = 0u8;
        for _ in 0..8 {
            v = (v << 1) | self.read_bit()? as u8;
        }
        Ok(v)
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        for b in buf.iter_mut() {
            *b = self.read_rc()?;
        }
        Ok(buf)
    }

    /// Read a raw 16-bit little-endian (RS).
    pub fn read_rs(&mut self) -> Result<u16> {
        let buf = self.read_bytes(2)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    /// Read a raw 32-bit little-endian (RL).
    pub fn read_rl(&mut self) -> Result<u32> {
        let buf = self.read_bytes(4)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Read a raw 64-bit little-endian (RLL).
    pub fn read_rll(&mut self) -> Result<u64> {
        let buf = self.read_bytes(8)?;
        Ok(LittleEndian::read_u64(&buf))
    }

    /// Read a raw IEEE double (RD).
    pub fn read_rd(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_rll()?))
    }

    /// Read a bit-compressed 16-bit (BS).
    pub fn read_bs(&mut self) -> Result<u16> {
        match self.read_2bits()? {
            0 => self.read_rs(),
            1 => Ok(self.read_rc()? as u16),
            2 => Ok(0),
            _ => Ok(256),
        }
    }

    /// Read a bit-compressed 32-bit (BL).
    pub fn read_bl(&mut self) -> Result<u32> {
        match self.read_2bits()? {
            0 => self.read_rl(),
            1 => Ok(self.read_rc()? as u32),
            2 => Ok(0),
            _ => Err(DwgError::Parse("invalid BL prefix 3".into())),
        }
    }

    /// Read a bit-compressed 64-bit (BLL).
    pub fn read_bll(&mut self) -> Result<u64> {
        let n = self.read_3bits()?;
        let mut v = 0u64;
        for i in 0..n {
            v |= (self.read_rc()? as u64) << (8 * i as u32);
        }
        Ok(v)
    }

    /// Read a bit-compressed double (BD).
    pub fn read_bd(&mut self) -> Result<f64> {
        match self.read_2bits()? {
            0 => self.read_rd(),
            1 => Ok(1.0),
            2 => Ok(0.0),
            _ => Err(DwgError::Parse("invalid BD prefix 3".into())),
        }
    }

    /// Read a default-deltified double (DD).
    pub fn read_dd(&mut self, default: f64) -> Result<f64> {
        match self.read_2bits()? {
            0 => Ok(default),
            1 => {
                let mut bytes = default.to_le_bytes();
                for b in bytes.iter_mut().take(4) {
                    *b = self.read_rc()?;
                }
                Ok(f64::from_le_bytes(bytes))
            }
            2 => {
                let mut bytes = default.to_le_bytes();
                bytes[4] = self.read_rc()?;
                bytes[5] = self.read_rc()?;
                for b in bytes.iter_mut().take(4) {
                    *b = self.read_rc()?;
                }
                Ok(f64::from_le_bytes(bytes))
            }
            _ => self.read_rd(),
        }
    }

    /// Read a signed modular char (MC). A full 63-bit magnitude whose
    /// top data bit collides with the sign position takes ten bytes,
    /// the writer's sign-spill form.
    pub fn read_mc(&mut self) -> Result<i64> {
        let mut magnitude = 0u64;
        for i in 0..10 {
            let mut byte = self.read_rc()?;
            if byte & 0x80 == 0 {
                let negative = byte & 0x40 != 0;
                byte &= !0x40;
                magnitude |= (byte as u64) << (7 * i);
                let value = magnitude as i64;
                return Ok(if negative { value.wrapping_neg() } else { value });
            }
            magnitude |= ((byte & 0x7F) as u64) << (7 * i);
        }
        Err(DwgError::Parse("MC runs past 10 bytes".into()))
    }

    /// Read an unsigned modular char (UMC).
    pub fn read_umc(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.read_rc()?;
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DwgError::Parse("UMC runs past 10 bytes".into()))
    }

    /// Read a modular short (MS).
    pub fn read_ms(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for i in 0..3 {
            let word = self.read_rs()?;
            value |= ((word & 0x7FFF) as u32) << (15 * i);
            if word & 0x8000 == 0 {
                return Ok(value);
            }
        }
        Err(DwgError::Parse("MS runs past 2 words".into()))
    }

    /// Read a handle reference (H).
    pub fn read_h(&mut self) -> Result<HandleReference> {
        let first = self.read_rc()?;
        let code = first >> 4;
        let counter = first & 0x0F;
        if counter > 8 {
            return Err(DwgError::InvalidFormat(format!(
                "handle byte count {} exceeds 8",
                counter
            )));
        }
        let mut value = 0u64;
        for _ in 0..counter {
            value = (value << 8) | self.read_rc()? as u64;
        }
        Ok(HandleReference::new(code, counter, value))
    }

    /// Read two raw doubles (2RD).
    pub fn read_2rd(&mut self) -> Result<Vector2> {
        Ok(Vector2::new(self.read_rd()?, self.read_rd()?))
    }

    /// Read two bit-compressed doubles (2BD).
    pub fn read_2bd(&mut self) -> Result<Vector2> {
        Ok(Vector2::new(self.read_bd()?, self.read_bd()?))
    }

    /// Read three bit-compressed doubles (3BD).
    pub fn read_3bd(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(self.read_bd()?, self.read_bd()?, self.read_bd()?))
    }

    /// Read an extrusion vector (BE). R2000+ compresses (0,0,1) to a
    /// single set bit.
    pub fn read_be(&mut self) -> Result<Vector3> {
        if self.version >= DwgVersion::AC1015 && self.read_bit()? {
            return Ok(Vector3::UNIT_Z);
        }
        self.read_3bd()
    }

    /// Read a thickness (BT). R2000+ compresses 0.0 to a single set bit.
    pub fn read_bt(&mut self) -> Result<f64> {
        if self.version >= DwgVersion::AC1015 && self.read_bit()? {
            return Ok(0.0);
        }
        self.read_bd()
    }

    /// Read a narrow (code-page) string (TV).
    pub fn read_tv(&mut self) -> Result<String> {
        let len = self.read_bs()? as usize;
        let bytes = self.read_bytes(len)?;
        let (decoded, _, _) = self.encoding.decode(&bytes);
        Ok(decoded.into_owned())
    }

    /// Read a wide (UCS-2LE) string (TU).
    pub fn read_tu(&mut self) -> Result<String> {
        let len = self.read_bs()? as usize;
        let mut units = Vec::with_capacity(len);
        for _ in 0..len {
            units.push(self.read_rs()?);
        }
        String::from_utf16(&units).map_err(|e| DwgError::Encoding(e.to_string()))
    }

    /// Read a version-switched string (T): TU for R2007+, TV before.
    pub fn read_t(&mut self) -> Result<String> {
        if self.version.is_unicode() {
            self.read_tu()
        } else {
            self.read_tv()
        }
    }

    /// Read a fixed-length raw byte block (TF).
    pub fn read_tf(&mut self, len: usize) -> Result<Vec<u8>> {
        self.read_bytes(len)
    }

    /// Read a color (CMC). rgb/flag/name sub-fields exist since R2004.
    pub fn read_cmc(&mut self) -> Result<Color> {
        let index = self.read_bs()? as i16;
        let mut color = Color::by_index(index);
        if self.version >= DwgVersion::AC1018 {
            let rgb = self.read_bl()?;
            color.rgb = if rgb != 0 { Some(rgb) } else { None };
            color.flag = self.read_rc()?;
            if color.flag & 1 != 0 {
                color.name = Some(self.read_t()?);
            }
            if color.flag & 2 != 0 {
                color.book_name = Some(self.read_t()?);
            }
        }
        Ok(color)
    }

    /// Read and verify a 16-byte section sentinel.
    pub fn read_sentinel(&mut self, expected: &[u8; 16], what: &str) -> Result<()> {
        let bytes = self.read_bytes(16)?;
        if bytes != expected {
            return Err(DwgError::InvalidSentinel(what.to_string()));
        }
        Ok(())
    }

    /// Resolve a handle reference read at this position against a base
    /// handle.
    pub fn read_h_resolved(&mut self, base: Handle) -> Result<(HandleReference, Handle)> {
        let href = self.read_h()?;
        let absolute = href.resolve(base);
        Ok((href, absolute))
    }
}
