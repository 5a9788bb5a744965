//! Extended entity data codec.
//!
//! EED is a chain of `(size, app handle, data)` groups terminated by a
//! zero size. The data bytes are themselves a tagged item stream; item
//! codes follow the classic scheme (string 0, control marker 2, binary
//! 4, handle 5, point 10, real 40, short 70, long 71). String payloads
//! switch to UTF-16 on R2007+ along with every other text field.

use crate::codec::{BitReader, BitWriter};
use crate::document::Document;
use crate::error::{DwgError, Result};
use crate::notification::Severity;
use crate::object::{Eed, EedValue};
use crate::types::{Handle, Vector3};

/// Decode the EED chain for one object. `base` is the object's own
/// handle, used to resolve the app reference.
pub fn decode_eed(doc: &mut Document, r: &mut BitReader, base: Handle) -> Result<Vec<Eed>> {
    let mut out = Vec::new();
    loop {
        let size = r.read_bs()? as usize;
        if size == 0 {
            break;
        }
        let href = r.read_h()?;
        let app = doc.add_handle_ref(href, base);
        let data = r.read_tf(size)?;
        let mut sub = BitReader::new(data, r.version());
        let mut values = Vec::new();
        while !sub.at_end() {
            match decode_item(&mut sub) {
                Ok(v) => values.push(v),
                Err(DwgError::EndOfStream(_)) => break,
                Err(e) => {
                    doc.notifications
                        .notify_on(Severity::Warning, base, format!("malformed EED item: {e}"));
                    break;
                }
            }
        }
        out.push(Eed { app, values });
    }
    Ok(out)
}

fn decode_item(r: &mut BitReader) -> Result<EedValue> {
    let code = r.read_rc()?;
    let value = match code {
        0 => {
            if r.version().is_unicode() {
                let len = r.read_rs()? as usize;
                let mut units = Vec::with_capacity(len);
                for _ in 0..len {
                    units.push(r.read_rs()?);
                }
                EedValue::String(
                    String::from_utf16(&units).map_err(|e| DwgError::Encoding(e.to_string()))?,
                )
            } else {
                let len = r.read_rc()? as usize;
                let _codepage = r.read_rs()?;
                let bytes = r.read_tf(len)?;
                EedValue::String(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
        2 => EedValue::ControlMarker(r.read_rc()? != 0),
        4 => {
            let len = r.read_rc()? as usize;
            EedValue::Binary(r.read_tf(len)?)
        }
        5 => EedValue::Handle(Handle::new(r.read_rll()?)),
        10..=13 => EedValue::Point(Vector3::new(r.read_rd()?, r.read_rd()?, r.read_rd()?)),
        40..=42 => EedValue::Real(r.read_rd()?),
        70 => EedValue::Short(r.read_rs()? as i16),
        71 => EedValue::Long(r.read_rl()? as i32),
        other => {
            return Err(DwgError::Parse(format!("unknown EED item code {other}")));
        }
    };
    Ok(value)
}

/// Encode the EED chain for one object, including the terminating zero.
pub fn encode_eed(doc: &Document, w: &mut BitWriter, eed: &[Eed]) -> Result<()> {
    for group in eed {
        let mut sub = BitWriter::new(w.version());
        for value in &group.values {
            encode_item(&mut sub, value);
        }
        let data = sub.into_bytes();
        if data.len() > u16::MAX as usize {
            return Err(DwgError::Parse("EED group exceeds 64k".into()));
        }
        w.write_bs(data.len() as u16);
        let app = doc
            .ref_handle(group.app)
            .ok_or(DwgError::InvalidHandle(group.app.0 as u64))?;
        w.write_h(&crate::types::HandleReference::absolute(5, app))?;
        w.write_tf(&data);
    }
    w.write_bs(0);
    Ok(())
}

fn encode_item(w: &mut BitWriter, value: &EedValue) {
    w.write_rc(value.item_code());
    match value {
        EedValue::String(s) => {
            if w.version().is_unicode() {
                let units: Vec<u16> = s.encode_utf16().collect();
                w.write_rs(units.len() as u16);
                for unit in units {
                    w.write_rs(unit);
                }
            } else {
                w.write_rc(s.len().min(255) as u8);
                w.write_rs(30);
                w.write_tf(&s.as_bytes()[..s.len().min(255)]);
            }
        }
        EedValue::ControlMarker(close) => w.write_rc(*close as u8),
        EedValue::Binary(bytes) => {
            w.write_rc(bytes.len().min(255) as u8);
            w.write_tf(&bytes[..bytes.len().min(255)]);
        }
        EedValue::Handle(h) => w.write_rll(h.value()),
        EedValue::Point(p) => {
            w.write_rd(p.x);
            w.write_rd(p.y);
            w.write_rd(p.z);
        }
        EedValue::Real(v) => w.write_rd(*v),
        EedValue::Short(v) => w.write_rs(*v as u16),
        EedValue::Long(v) => w.write_rl(*v as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DwgVersion;

    fn round_trip(version: DwgVersion, eed: Vec<Eed>) -> (Document, Vec<Eed>) {
        let mut doc = Document::new(version);
        let mut w = BitWriter::new(version);
        encode_eed(&doc, &mut w, &eed).unwrap();
        let mut r = BitReader::new(w.into_bytes(), version);
        let decoded = decode_eed(&mut doc, &mut r, Handle::new(0x100)).unwrap();
        (doc, decoded)
    }

    fn sample_eed(doc: &mut Document) -> Eed {
        let acad = doc
            .find_table_handle(crate::object::TableKind::AppId, "ACAD")
            .unwrap();
        Eed {
            app: doc.add_absolute_ref(5, acad),
            values: vec![
                EedValue::String("payload".into()),
                EedValue::ControlMarker(false),
                EedValue::Short(42),
                EedValue::Real(1.25),
                EedValue::Long(-7),
                EedValue::Handle(Handle::new(0x1F)),
                EedValue::ControlMarker(true),
            ],
        }
    }

    #[test]
    fn test_empty_chain() {
        let (_, decoded) = round_trip(DwgVersion::AC1015, vec![]);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_chain_round_trip() {
        for version in [DwgVersion::AC1015, DwgVersion::AC1021] {
            let mut doc = Document::new(version);
            let eed = sample_eed(&mut doc);
            let mut w = BitWriter::new(version);
            encode_eed(&doc, &mut w, std::slice::from_ref(&eed)).unwrap();
            let mut r = BitReader::new(w.into_bytes(), version);
            let decoded = decode_eed(&mut doc, &mut r, Handle::new(0x100)).unwrap();
            assert_eq!(decoded.len(), 1);
            assert_eq!(decoded[0].values, eed.values);
            let app = doc.ref_handle(decoded[0].app).unwrap();
            assert_eq!(
                Some(app),
                doc.find_table_handle(crate::object::TableKind::AppId, "ACAD")
            );
        }
    }

    #[test]
    fn test_binary_and_point_items() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let acad = doc
            .find_table_handle(crate::object::TableKind::AppId, "ACAD")
            .unwrap();
        let eed = Eed {
            app: doc.add_absolute_ref(5, acad),
            values: vec![
                EedValue::Binary(vec![1, 2, 3, 4]),
                EedValue::Point(Vector3::new(1.0, 2.0, 3.0)),
            ],
        };
        let mut w = BitWriter::new(DwgVersion::AC1018);
        encode_eed(&doc, &mut w, std::slice::from_ref(&eed)).unwrap();
        let mut r = BitReader::new(w.into_bytes(), DwgVersion::AC1018);
        let decoded = decode_eed(&mut doc, &mut r, Handle::new(0x100)).unwrap();
        assert_eq!(decoded[0].values, eed.values);
    }
}
