//! Bit-level stream writer.
//!
//! Mirrors every [`crate::codec::reader::BitReader`] primitive. The
//! invariant both sides are tested against: for any value and version,
//! write followed by read returns the value unchanged.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::Encoding;

use crate::error::{DwgError, Result};
use crate::types::version::DwgVersion;
use crate::types::{Color, HandleReference, Vector2, Vector3};

/// Bit-level writer building an in-memory section.
pub struct BitWriter {
    out: Vec<u8>,
    /// Bits used in the final byte of `out` (0 = aligned).
    bit: u8,
    version: DwgVersion,
    encoding: &'static Encoding,
}

impl BitWriter {
    /// Create a writer for the given version.
    pub fn new(version: DwgVersion) -> Self {
        Self {
            out: Vec::new(),
            bit: 0,
            version,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// The version this writer encodes for.
    pub fn version(&self) -> DwgVersion {
        self.version
    }

    /// Set the narrow-text code page.
    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
    }

    /// Current position in bits.
    pub fn bit_position(&self) -> u64 {
        self.out.len() as u64 * 8 - if self.bit == 0 { 0 } else { (8 - self.bit) as u64 }
    }

    /// Pad to a byte boundary with zero bits.
    pub fn align(&mut self) {
        self.bit = 0;
    }

    /// Finish, padding the final partial byte with zero bits.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.align();
        self.out
    }

    /// The bytes written so far (final byte may be partial).
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    // ---------------------------------------------------------------
    // Primitives
    // ---------------------------------------------------------------

    /// Write a single bit (B).
    pub fn write_bit(&mut self, value: bool) {
        if self.bit == 0 {
            self.out.push(0);
        }
        if value {
            let last = self.out.last_mut().unwrap();
            *last |= 1 << (7 - self.bit);
        }
        self.bit = (self.bit + 1) % 8;
    }

    /// Write two bits (BB).
    pub fn write_2bits(&mut self, value: u8) {
        self.write_bit(value & 2 != 0);
        self.write_bit(value & 1 != 0);
    }

    /// Write three bits.
    pub fn write_3bits(&mut self, value: u8) {
        self.write_bit(value & 4 != 0);
        self.write_bit(value & 2 != 0);
        self.write_bit(value & 1 != 0);
    }

    /// Write a raw byte (RC).
    pub fn write_rc(&mut self, value: u8) {
        if self.bit == 0 {
            self.out.push(value);
            return;
        }
        for i in (0..8).rev() {
            self.write_bit(value & (1 << i) != 0);
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_rc(b);
        }
    }

    /// Write a raw 16-bit little-endian (RS).
    pub fn write_rs(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_bytes(&buf);
    }

    /// Write a raw 32-bit little-endian (RL).
    pub fn write_rl(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_bytes(&buf);
    }

    /// Write a raw 64-bit little-endian (RLL).
    pub fn write_rll(&mut self, value: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write_bytes(&buf);
    }

    /// Write a raw IEEE double (RD).
    pub fn write_rd(&mut self, value: f64) {
        self.write_rll(value.to_bits());
    }

    /// Write a bit-compressed 16-bit (BS).
    pub fn write_bs(&mut self, value: u16) {
        match value {
            0 => self.write_2bits(2),
            256 => self.write_2bits(3),
            1..=255 => {
                self.write_2bits(1);
                self.write_rc(value as u8);
            }
            _ => {
                self.write_2bits(0);
                self.write_rs(value);
            }
        }
    }

    /// Write a bit-compressed 32-bit (BL).
    pub fn write_bl(&mut self, value: u32) {
        match value {
            0 => self.write_2bits(2),
            1..=255 => {
                self.write_2bits(1);
                self.write_rc(value as u8);
            }
            _ => {
                self.write_2bits(0);
                self.write_rl(value);
            }
        }
    }

    /// Write a bit-compressed 64-bit (BLL). The 3-bit length prefix
    /// caps the payload at 7 bytes, so values of 2^56 and above do not
    /// fit on the wire.
    pub fn write_bll(&mut self, value: u64) -> Result<()> {
        let mut n = 0u8;
        let mut v = value;
        while v != 0 {
            n += 1;
            v >>= 8;
        }
        if n > 7 {
            return Err(DwgError::InvalidFormat(format!(
                "BLL value {value:#X} needs {n} bytes, limit is 7"
            )));
        }
        self.write_3bits(n);
        for i in 0..n {
            self.write_rc((value >> (8 * i as u32)) as u8);
        }
        Ok(())
    }

    /// Write a bit-compressed double (BD).
    pub fn write_bd(&mut self, value: f64) {
        if value == 0.0 && value.is_sign_positive() {
            self.write_2bits(2);
        } else if value == 1.0 {
            self.write_2bits(1);
        } else {
            self.write_2bits(0);
            self.write_rd(value);
        }
    }

    /// Write a default-deltified double (DD).
    pub fn write_dd(&mut self, value: f64, default: f64) {
        if value.to_bits() == default.to_bits() {
            self.write_2bits(0);
        } else {
            self.write_2bits(3);
            self.write_rd(value);
        }
    }

    /// Write a signed modular char (MC).
    pub fn write_mc(&mut self, value: i64) {
        let negative = value < 0;
        let mut v = value.unsigned_abs();
        loop {
            let mut byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 && byte & 0x40 == 0 {
                if negative {
                    byte |= 0x40;
                }
                self.write_rc(byte);
                return;
            }
            self.write_rc(byte | 0x80);
            if v == 0 {
                // sign bit collided with data; emit a terminating byte
                self.write_rc(if negative { 0x40 } else { 0 });
                return;
            }
        }
    }

    /// Write an unsigned modular char (UMC).
    pub fn write_umc(&mut self, value: u64) {
        let mut v = value;
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.write_rc(byte);
                return;
            }
            self.write_rc(byte | 0x80);
        }
    }

    /// Write a modular short (MS).
    pub fn write_ms(&mut self, value: u32) {
        let mut v = value;
        loop {
            let word = (v & 0x7FFF) as u16;
            v >>= 15;
            if v == 0 {
                self.write_rs(word);
                return;
            }
            self.write_rs(word | 0x8000);
        }
    }

    /// Write a handle reference (H).
    pub fn write_h(&mut self, href: &HandleReference) -> Result<()> {
        if href.counter > 8 {
            return Err(DwgError::InvalidFormat(format!(
                "handle byte count {} exceeds 8",
                href.counter
            )));
        }
        self.write_rc((href.code << 4) | href.counter);
        for i in (0..href.counter).rev() {
            self.write_rc((href.value >> (8 * i as u32)) as u8);
        }
        Ok(())
    }

    /// Write two raw doubles (2RD).
    pub fn write_2rd(&mut self, value: Vector2) {
        self.write_rd(value.x);
        self.write_rd(value.y);
    }

    /// Write two bit-compressed doubles (2BD).
    pub fn write_2bd(&mut self, value: Vector2) {
        self.write_bd(value.x);
        self.write_bd(value.y);
    }

    /// Write three bit-compressed doubles (3BD).
    pub fn write_3bd(&mut self, value: Vector3) {
        self.write_bd(value.x);
        self.write_bd(value.y);
        self.write_bd(value.z);
    }

    /// Write an extrusion vector (BE).
    pub fn write_be(&mut self, value: Vector3) {
        if self.version >= DwgVersion::AC1015 {
            if value == Vector3::UNIT_Z {
                self.write_bit(true);
                return;
            }
            self.write_bit(false);
        }
        self.write_3bd(value);
    }

    /// Write a thickness (BT).
    pub fn write_bt(&mut self, value: f64) {
        if self.version >= DwgVersion::AC1015 {
            if value == 0.0 {
                self.write_bit(true);
                return;
            }
            self.write_bit(false);
        }
        self.write_bd(value);
    }

    /// Write a narrow (code-page) string (TV).
    pub fn write_tv(&mut self, value: &str) {
        let (encoded, _, _) = self.encoding.encode(value);
        self.write_bs(encoded.len() as u16);
        self.write_bytes(&encoded);
    }

    /// Write a wide (UCS-2LE) string (TU).
    pub fn write_tu(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_bs(units.len() as u16);
        for unit in units {
            self.write_rs(unit);
        }
    }

    /// Write a version-switched string (T).
    pub fn write_t(&mut self, value: &str) {
        if self.version.is_unicode() {
            self.write_tu(value);
        } else {
            self.write_tv(value);
        }
    }

    /// Write a fixed-length raw byte block (TF).
    pub fn write_tf(&mut self, value: &[u8]) {
        self.write_bytes(value);
    }

    /// Write a color (CMC).
    pub fn write_cmc(&mut self, color: &Color) {
        self.write_bs(color.index as u16);
        if self.version >= DwgVersion::AC1018 {
            self.write_bl(color.rgb.unwrap_or(0));
            let mut flag = 0u8;
            if color.name.is_some() {
                flag |= 1;
            }
            if color.book_name.is_some() {
                flag |= 2;
            }
            self.write_rc(flag);
            if let Some(name) = &color.name {
                self.write_t(name);
            }
            if let Some(book) = &color.book_name {
                self.write_t(book);
            }
        }
    }

    /// Write a 16-byte section sentinel.
    pub fn write_sentinel(&mut self, sentinel: &[u8; 16]) {
        self.write_bytes(sentinel);
    }
}
