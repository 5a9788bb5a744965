//! HATCH boundary paths.
//!
//! Boundary paths are the one construct the descriptor tables cannot
//! express: the paths are ragged (each has its own vertex count) and the
//! bulge vector is present per path, not per object. They trail the
//! fixed HATCH fields on the wire, sized by `num_paths`.
//!
//! Per path: `flag BL, num_verts BL, verts (2RD each), has_bulges B,
//! bulges (BD x num_verts, only when the flag bit is set)`.
//!
//! In the field map a path is `List[Int(flag), List(verts), List(bulges)]`
//! under the `"paths"` key; an empty bulge list means no bulges on the
//! wire.

use crate::codec::{BitReader, BitWriter};
use crate::document::Document;
use crate::engine::checked_count;
use crate::error::{DwgError, Result};
use crate::object::CadObject;
use crate::value::FieldValue;

/// Decode the boundary paths declared by the already-read `num_paths`.
pub fn decode_paths(doc: &mut Document, r: &mut BitReader, obj: &mut CadObject) -> Result<()> {
    let declared = obj.fields.int("num_paths").unwrap_or(0);
    let num_paths = checked_count(doc, declared)?;
    let mut paths = Vec::with_capacity(num_paths);
    for _ in 0..num_paths {
        let flag = r.read_bl()? as i64;
        let num_verts = checked_count(doc, r.read_bl()? as i64)?;
        let mut verts = Vec::with_capacity(num_verts);
        for _ in 0..num_verts {
            verts.push(FieldValue::Point2(r.read_2rd()?));
        }
        let mut bulges = Vec::new();
        if r.read_bit()? {
            bulges.reserve(num_verts);
            for _ in 0..num_verts {
                bulges.push(FieldValue::Double(r.read_bd()?));
            }
        }
        paths.push(FieldValue::List(vec![
            FieldValue::Int(flag),
            FieldValue::List(verts),
            FieldValue::List(bulges),
        ]));
    }
    obj.fields.set("paths", FieldValue::List(paths));
    Ok(())
}

/// Encode the boundary paths. `num_paths` has already been written from
/// the actual path count by the caller's count-sync rule, so the list is
/// authoritative here too.
pub fn encode_paths(_doc: &Document, w: &mut BitWriter, obj: &CadObject) -> Result<()> {
    let empty = Vec::new();
    let paths = obj
        .fields
        .get("paths")
        .and_then(FieldValue::as_list)
        .unwrap_or(&empty);
    for path in paths {
        let parts = path.as_list().ok_or_else(malformed)?;
        let flag = parts.first().and_then(FieldValue::as_int).ok_or_else(malformed)?;
        let verts = parts.get(1).and_then(FieldValue::as_list).ok_or_else(malformed)?;
        let bulges = parts.get(2).and_then(FieldValue::as_list).unwrap_or(&empty);

        w.write_bl(flag as u32);
        w.write_bl(verts.len() as u32);
        for v in verts {
            match v {
                FieldValue::Point2(p) => w.write_2rd(*p),
                _ => return Err(malformed()),
            }
        }
        if bulges.is_empty() {
            w.write_bit(false);
        } else {
            w.write_bit(true);
            for i in 0..verts.len() {
                let b = bulges.get(i).and_then(FieldValue::as_double).unwrap_or(0.0);
                w.write_bd(b);
            }
        }
    }
    Ok(())
}

fn malformed() -> DwgError {
    DwgError::Parse("malformed HATCH boundary path".into())
}

/// Build a `"paths"` value from plain vertex/bulge data, for callers
/// assembling a HATCH by hand (the DXF front-end uses this too).
pub fn make_path(flag: i64, verts: Vec<crate::types::Vector2>, bulges: Vec<f64>) -> FieldValue {
    FieldValue::List(vec![
        FieldValue::Int(flag),
        FieldValue::List(verts.into_iter().map(FieldValue::Point2).collect()),
        FieldValue::List(bulges.into_iter().map(FieldValue::Double).collect()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{decode_object_body, encode_object_body};
    use crate::object::{FixedType, Supertype};
    use crate::schema;
    use crate::types::{DwgVersion, Vector2};

    fn hatch_with_ragged_paths(doc: &mut Document) -> CadObject {
        let mut obj = CadObject::new(FixedType::Hatch, Supertype::Entity, "HATCH");
        obj.handle = doc.alloc_handle();
        obj.fields.set("name", FieldValue::Text("ANSI31".into()));
        obj.fields.set("solid_fill", FieldValue::Int(0));
        obj.fields.set("associative", FieldValue::Int(0));
        let triangle = make_path(
            2,
            vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(4.0, 0.0),
                Vector2::new(2.0, 3.0),
            ],
            vec![],
        );
        let bulged_pair = make_path(
            2,
            vec![Vector2::new(10.0, 0.0), Vector2::new(12.0, 0.0)],
            vec![0.5, -0.5],
        );
        obj.fields
            .set("paths", FieldValue::List(vec![triangle, bulged_pair]));
        obj.fields.set("num_paths", FieldValue::Int(2));
        obj
    }

    #[test]
    fn test_ragged_paths_round_trip() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let obj = hatch_with_ragged_paths(&mut doc);
        let schema = schema::schema_for_fixedtype(FixedType::Hatch).unwrap();

        let mut w = BitWriter::new(doc.version);
        encode_object_body(&doc, &mut w, schema, &obj).unwrap();
        let mut r = BitReader::new(w.into_bytes(), doc.version);
        let mut decoded = CadObject::new(FixedType::Hatch, Supertype::Entity, "HATCH");
        decoded.handle = obj.handle;
        decode_object_body(&mut doc, &mut r, schema, &mut decoded).unwrap();

        assert_eq!(decoded.fields.int("num_paths"), Some(2));
        assert_eq!(decoded.fields.get("paths"), obj.fields.get("paths"));
    }

    #[test]
    fn test_stale_path_count_is_corrected() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let mut obj = hatch_with_ragged_paths(&mut doc);
        obj.fields.set("num_paths", FieldValue::Int(40));
        let schema = schema::schema_for_fixedtype(FixedType::Hatch).unwrap();

        let mut w = BitWriter::new(doc.version);
        encode_object_body(&doc, &mut w, schema, &obj).unwrap();
        let mut r = BitReader::new(w.into_bytes(), doc.version);
        let mut decoded = CadObject::new(FixedType::Hatch, Supertype::Entity, "HATCH");
        decoded.handle = obj.handle;
        decode_object_body(&mut doc, &mut r, schema, &mut decoded).unwrap();
        assert_eq!(decoded.fields.int("num_paths"), Some(2));
    }

    #[test]
    fn test_no_paths() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let mut obj = CadObject::new(FixedType::Hatch, Supertype::Entity, "HATCH");
        obj.handle = doc.alloc_handle();
        let schema = schema::schema_for_fixedtype(FixedType::Hatch).unwrap();
        let mut w = BitWriter::new(doc.version);
        encode_object_body(&doc, &mut w, schema, &obj).unwrap();
        let mut r = BitReader::new(w.into_bytes(), doc.version);
        let mut decoded = CadObject::new(FixedType::Hatch, Supertype::Entity, "HATCH");
        decoded.handle = obj.handle;
        decode_object_body(&mut doc, &mut r, schema, &mut decoded).unwrap();
        assert_eq!(decoded.fields.int("num_paths"), Some(0));
        assert_eq!(decoded.fields.get("paths"), Some(&FieldValue::List(vec![])));
    }
}
