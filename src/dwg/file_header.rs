//! The binary container's outer frame.
//!
//! A drawing file opens with a fixed-layout header: the six-byte version
//! magic, a maintenance byte, the preview address, the code page, and a
//! locator table giving the address and size of each logical section.
//! The header is CRC-protected and closed by a 16-byte sentinel; the
//! sections it points at carry their own begin/end sentinels.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::crc16;
use crate::error::{DwgError, Result};
use crate::types::DwgVersion;

/// Section numbers used in the locator table.
pub mod section {
    /// Header variables.
    pub const HEADER: u8 = 0;
    /// Class registrations.
    pub const CLASSES: u8 = 1;
    /// The handle/offset object map.
    pub const OBJECT_MAP: u8 = 2;
    /// Summary info strings.
    pub const SUMMARY: u8 = 3;
}

const fn complement(s: [u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < 16 {
        out[i] = !s[i];
        i += 1;
    }
    out
}

/// Sentinel closing the file header, after the locator CRC.
pub const FILE_HEADER_END: [u8; 16] = [
    0x95, 0xA0, 0x4E, 0x28, 0x99, 0x82, 0x1A, 0xE5, 0x5E, 0x41, 0xE0, 0x5F, 0x9D, 0x3A, 0x4D, 0x00,
];

/// Sentinel opening the header variables section.
pub const HEADER_BEGIN: [u8; 16] = [
    0xCF, 0x7B, 0x1F, 0x23, 0xFD, 0xDE, 0x38, 0xA9, 0x5F, 0x7C, 0x68, 0xB8, 0x4E, 0x6D, 0x33, 0x5F,
];

/// Sentinel closing the header variables section.
pub const HEADER_END: [u8; 16] = complement(HEADER_BEGIN);

/// Sentinel opening the classes section.
pub const CLASSES_BEGIN: [u8; 16] = [
    0x8D, 0xA1, 0xC4, 0xB8, 0xC4, 0xA9, 0xF8, 0xC5, 0xC0, 0xDC, 0xF4, 0x5F, 0xE7, 0xCF, 0xB6, 0x8A,
];

/// Sentinel closing the classes section.
pub const CLASSES_END: [u8; 16] = complement(CLASSES_BEGIN);

/// Sentinel opening the preview image blob.
pub const PREVIEW_BEGIN: [u8; 16] = [
    0x1F, 0x25, 0x6D, 0x07, 0xD4, 0x36, 0x28, 0x28, 0x9D, 0x57, 0xCA, 0x3F, 0x9D, 0x44, 0x10, 0x2B,
];

/// Sentinel closing the preview image blob.
pub const PREVIEW_END: [u8; 16] = complement(PREVIEW_BEGIN);

/// One locator record: where a section lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLocator {
    pub number: u8,
    pub address: u32,
    pub size: u32,
}

/// The fixed-layout file header.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub version: DwgVersion,
    /// Maintenance release byte; carried through, never interpreted.
    pub maintenance: u8,
    /// Absolute address of the preview blob, 0 when absent.
    pub preview_address: u32,
    pub codepage: u16,
    pub locators: Vec<SectionLocator>,
}

impl FileHeader {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            version,
            maintenance: 0,
            preview_address: 0,
            codepage: 30, // ANSI_1252
            locators: Vec::new(),
        }
    }

    /// Look up a locator by section number.
    pub fn locator(&self, number: u8) -> Option<&SectionLocator> {
        self.locators.iter().find(|l| l.number == number)
    }

    /// Parse the header from the start of a file buffer. Returns the
    /// header and the byte offset just past its end sentinel.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 25 {
            return Err(DwgError::InvalidHeader("file too short".into()));
        }
        let magic = std::str::from_utf8(&data[0..6])
            .map_err(|_| DwgError::InvalidHeader("version magic is not ASCII".into()))?;
        let version = DwgVersion::from_str_code(magic)?;

        let mut cur = Cursor::new(&data[6..]);
        let mut pad = [0u8; 5];
        std::io::Read::read_exact(&mut cur, &mut pad)?;
        let maintenance = cur.read_u8()?;
        let _one = cur.read_u8()?;
        let preview_address = cur.read_u32::<LittleEndian>()?;
        let _app_version = cur.read_u8()?;
        let _app_maintenance = cur.read_u8()?;
        let codepage = cur.read_u16::<LittleEndian>()?;
        let count = cur.read_u32::<LittleEndian>()? as usize;
        if count > 16 {
            return Err(DwgError::InvalidHeader(format!(
                "implausible locator count {count}"
            )));
        }
        let mut locators = Vec::with_capacity(count);
        for _ in 0..count {
            locators.push(SectionLocator {
                number: cur.read_u8()?,
                address: cur.read_u32::<LittleEndian>()?,
                size: cur.read_u32::<LittleEndian>()?,
            });
        }
        let crc_pos = 6 + cur.position() as usize;
        let stored = Cursor::new(
            data.get(crc_pos..crc_pos + 2)
                .ok_or_else(|| DwgError::InvalidHeader("truncated locator table".into()))?,
        )
        .read_u16::<LittleEndian>()?;
        let actual = crc16(0, &data[..crc_pos]);
        if stored != actual {
            return Err(DwgError::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }
        let sentinel_pos = crc_pos + 2;
        let end = sentinel_pos + 16;
        if data.get(sentinel_pos..end) != Some(&FILE_HEADER_END[..]) {
            return Err(DwgError::InvalidSentinel("file header".into()));
        }
        Ok((
            Self {
                version,
                maintenance,
                preview_address,
                codepage,
                locators,
            },
            end,
        ))
    }

    /// Serialize the header, CRC and end sentinel included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(self.version.as_str().as_bytes());
        out.extend_from_slice(&[0u8; 5]);
        out.push(self.maintenance);
        out.push(1);
        out.write_u32::<LittleEndian>(self.preview_address).ok();
        out.push(0); // app dwg version
        out.push(0); // app maintenance
        out.write_u16::<LittleEndian>(self.codepage).ok();
        out.write_u32::<LittleEndian>(self.locators.len() as u32).ok();
        for l in &self.locators {
            out.push(l.number);
            out.write_u32::<LittleEndian>(l.address).ok();
            out.write_u32::<LittleEndian>(l.size).ok();
        }
        let crc = crc16(0, &out);
        out.write_u16::<LittleEndian>(crc).ok();
        out.extend_from_slice(&FILE_HEADER_END);
        out
    }

    /// The serialized length, locators, CRC and sentinel included.
    pub fn encoded_len(&self) -> usize {
        25 + 9 * self.locators.len() + 2 + 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_sentinels_complement_begin() {
        for (begin, end) in [(HEADER_BEGIN, HEADER_END), (CLASSES_BEGIN, CLASSES_END)] {
            for (b, e) in begin.iter().zip(end.iter()) {
                assert_eq!(b ^ e, 0xFF);
            }
        }
    }

    #[test]
    fn test_header_round_trip() {
        let mut hdr = FileHeader::new(DwgVersion::AC1015);
        hdr.maintenance = 6;
        hdr.preview_address = 0x80;
        hdr.locators.push(SectionLocator {
            number: section::HEADER,
            address: 0x100,
            size: 0x200,
        });
        hdr.locators.push(SectionLocator {
            number: section::OBJECT_MAP,
            address: 0x300,
            size: 0x40,
        });
        let bytes = hdr.to_bytes();
        assert_eq!(bytes.len(), hdr.encoded_len());
        let (parsed, end) = FileHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, hdr);
        assert_eq!(end, bytes.len());
    }

    #[test]
    fn test_corrupt_crc_rejected() {
        let hdr = FileHeader::new(DwgVersion::AC1018);
        let mut bytes = hdr.to_bytes();
        bytes[12] ^= 0xFF;
        assert!(matches!(
            FileHeader::parse(&bytes),
            Err(DwgError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let hdr = FileHeader::new(DwgVersion::AC1015);
        let mut bytes = hdr.to_bytes();
        bytes[0..6].copy_from_slice(b"XX9999");
        assert!(FileHeader::parse(&bytes).is_err());
    }
}
