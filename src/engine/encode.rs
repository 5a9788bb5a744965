//! The encode pass: populated [`CadObject`] -> bit stream.
//!
//! Byte-for-byte symmetry with [`crate::engine::decode`] is the load-
//! bearing property here: every branch the decoder can take, the encoder
//! takes under the same condition. Count-source scalars are rewritten
//! from the actual list lengths so a caller who edited a vector but not
//! its count still produces a consistent stream.

use crate::codec::BitWriter;
use crate::document::Document;
use crate::engine::{eed, hatch};
use crate::error::{DwgError, Result};
use crate::object::{CadObject, Common, FixedType};
use crate::schema::{FieldDescriptor, ObjectSchema, Repeat, WireType};
use crate::types::{Handle, HandleReference, Vector2, Vector3};
use crate::value::FieldValue;

/// Encode the full object body: common block, schema fields, ragged
/// tails.
pub fn encode_object_body(
    doc: &Document,
    w: &mut BitWriter,
    schema: &ObjectSchema,
    obj: &CadObject,
) -> Result<()> {
    encode_common(doc, w, obj)?;
    encode_fields(doc, w, schema, obj)?;
    if obj.fixedtype == FixedType::Hatch {
        hatch::encode_paths(doc, w, obj)?;
    }
    Ok(())
}

/// Encode the common entity/object block.
pub fn encode_common(doc: &Document, w: &mut BitWriter, obj: &CadObject) -> Result<()> {
    eed::encode_eed(doc, w, obj.common.eed())?;
    w.write_bl(obj.common.reactors().len() as u32);
    w.write_bit(obj.common.xdict().is_none());

    match &obj.common {
        Common::Entity(e) => {
            w.write_bit(e.paper_space);
            w.write_cmc(&e.color);
            w.write_bd(e.linetype_scale);
            let ltype_flags: u8 = if e.linetype.is_some() { 3 } else { 0 };
            w.write_2bits(ltype_flags);
            w.write_bit(e.invisible);

            write_common_handle(doc, w, 4, e.owner)?;
            if doc.version.uses_entity_chain() {
                write_common_handle(doc, w, 4, e.prev_entity)?;
                write_common_handle(doc, w, 4, e.next_entity)?;
            }
            for &id in &e.reactors {
                write_common_handle(doc, w, 4, Some(id))?;
            }
            if let Some(xdict) = e.xdict {
                write_common_handle(doc, w, 3, Some(xdict))?;
            }
            write_common_handle(doc, w, 5, e.layer)?;
            if ltype_flags == 3 {
                write_common_handle(doc, w, 5, e.linetype)?;
            }
        }
        Common::Object(o) => {
            write_common_handle(doc, w, 4, o.owner)?;
            for &id in &o.reactors {
                write_common_handle(doc, w, 4, Some(id))?;
            }
            if let Some(xdict) = o.xdict {
                write_common_handle(doc, w, 3, Some(xdict))?;
            }
        }
    }
    Ok(())
}

fn write_common_handle(
    doc: &Document,
    w: &mut BitWriter,
    code: u8,
    id: Option<crate::value::RefId>,
) -> Result<()> {
    let handle = id.and_then(|id| doc.ref_handle(id)).unwrap_or(Handle::NULL);
    w.write_h(&HandleReference::absolute(code, handle))
}

/// Encode the type-specific fields in descriptor order.
///
/// Missing values encode as the wire type's zero; count-source scalars
/// encode the sized field's actual length, not the stored number.
pub fn encode_fields(
    doc: &Document,
    w: &mut BitWriter,
    schema: &ObjectSchema,
    obj: &CadObject,
) -> Result<()> {
    for d in schema.fields_for(doc.version) {
        match d.repeat {
            Repeat::One => {
                // HATCH paths live outside the table; their count scalar
                // still obeys the sync rule
                let ragged_len = (obj.fixedtype == FixedType::Hatch && d.name == "num_paths")
                    .then(|| {
                        obj.fields
                            .get("paths")
                            .and_then(FieldValue::as_list)
                            .map_or(0, |l| l.len())
                    });
                let value = match ragged_len.or_else(|| count_target_len(schema, d, obj)) {
                    Some(n) => FieldValue::Int(n as i64),
                    None => obj
                        .fields
                        .get(d.name)
                        .cloned()
                        .unwrap_or_else(|| default_value(d)),
                };
                write_value(doc, w, d, &value)?;
            }
            Repeat::Fixed(n) => {
                write_repeated(doc, w, d, obj, n as usize)?;
            }
            Repeat::Count(_) => {
                let n = stored_len(obj, d);
                write_repeated(doc, w, d, obj, n)?;
            }
        }
    }
    Ok(())
}

/// If `d` sizes a later Count field (and is itself in-window), the
/// length that must be written in its place.
fn count_target_len(schema: &ObjectSchema, d: &FieldDescriptor, obj: &CadObject) -> Option<usize> {
    let target = schema
        .fields
        .iter()
        .find(|t| matches!(t.repeat, Repeat::Count(sib) if sib == d.name))?;
    Some(stored_len(obj, target))
}

fn stored_len(obj: &CadObject, d: &FieldDescriptor) -> usize {
    match obj.fields.get(d.name) {
        Some(FieldValue::List(items)) => items.len(),
        Some(FieldValue::Bytes(bytes)) => bytes.len(),
        _ => 0,
    }
}

fn write_repeated(
    doc: &Document,
    w: &mut BitWriter,
    d: &FieldDescriptor,
    obj: &CadObject,
    n: usize,
) -> Result<()> {
    if d.wire == WireType::TF {
        let empty = Vec::new();
        let bytes = match obj.fields.get(d.name) {
            Some(FieldValue::Bytes(b)) => b,
            _ => &empty,
        };
        w.write_tf(&bytes[..n.min(bytes.len())]);
        for _ in bytes.len()..n {
            w.write_rc(0);
        }
        return Ok(());
    }
    let empty = Vec::new();
    let items = match obj.fields.get(d.name) {
        Some(FieldValue::List(items)) => items,
        _ => &empty,
    };
    let default = default_value(d);
    for i in 0..n {
        write_value(doc, w, d, items.get(i).unwrap_or(&default))?;
    }
    Ok(())
}

fn write_value(doc: &Document, w: &mut BitWriter, d: &FieldDescriptor, value: &FieldValue) -> Result<()> {
    use WireType::*;
    let type_err = || {
        DwgError::Parse(format!(
            "field {} holds a value incompatible with wire type {:?}",
            d.name, d.wire
        ))
    };
    match d.wire {
        B => w.write_bit(value.as_int().ok_or_else(type_err)? != 0),
        BB => w.write_2bits(value.as_int().ok_or_else(type_err)? as u8),
        RC => w.write_rc(value.as_int().ok_or_else(type_err)? as u8),
        RS => w.write_rs(value.as_int().ok_or_else(type_err)? as u16),
        RL => w.write_rl(value.as_int().ok_or_else(type_err)? as u32),
        RLL => w.write_rll(value.as_int().ok_or_else(type_err)? as u64),
        BS => w.write_bs(value.as_int().ok_or_else(type_err)? as u16),
        BL => w.write_bl(value.as_int().ok_or_else(type_err)? as u32),
        BLL => w.write_bll(value.as_int().ok_or_else(type_err)? as u64)?,
        MC => w.write_mc(value.as_int().ok_or_else(type_err)?),
        UMC => w.write_umc(value.as_int().ok_or_else(type_err)? as u64),
        MS => w.write_ms(value.as_int().ok_or_else(type_err)? as u32),
        RD => w.write_rd(value.as_double().ok_or_else(type_err)?),
        BD => w.write_bd(value.as_double().ok_or_else(type_err)?),
        DD => w.write_dd(value.as_double().ok_or_else(type_err)?, 0.0),
        BT => w.write_bt(value.as_double().ok_or_else(type_err)?),
        P2RD => w.write_2rd(point2(value).ok_or_else(type_err)?),
        P2BD => w.write_2bd(point2(value).ok_or_else(type_err)?),
        P3BD => w.write_3bd(value.as_point3().ok_or_else(type_err)?),
        BE => w.write_be(value.as_point3().ok_or_else(type_err)?),
        CMC => match value {
            FieldValue::Color(c) => w.write_cmc(c),
            _ => return Err(type_err()),
        },
        T => w.write_t(value.as_text().ok_or_else(type_err)?),
        H => {
            let handle = value
                .as_ref_id()
                .and_then(|id| doc.ref_handle(id))
                .unwrap_or(Handle::NULL);
            w.write_h(&HandleReference::absolute(d.handle_code, handle))?;
        }
        TF => return Err(type_err()),
    }
    Ok(())
}

fn point2(value: &FieldValue) -> Option<Vector2> {
    match value {
        FieldValue::Point2(p) => Some(*p),
        FieldValue::Point3(p) => Some(Vector2::new(p.x, p.y)),
        _ => None,
    }
}

/// The wire type's zero value, used for fields never populated.
fn default_value(d: &FieldDescriptor) -> FieldValue {
    use WireType::*;
    match d.wire {
        B => FieldValue::Bool(false),
        BB | RC | RS | RL | RLL | BS | BL | BLL | MC | UMC | MS => FieldValue::Int(0),
        RD | BD | DD | BT => FieldValue::Double(0.0),
        P2RD | P2BD => FieldValue::Point2(Vector2::ZERO),
        P3BD => FieldValue::Point3(Vector3::ZERO),
        BE => FieldValue::Point3(Vector3::UNIT_Z),
        CMC => FieldValue::Color(crate::types::Color::by_layer()),
        T => FieldValue::Text(String::new()),
        H => FieldValue::Ref(crate::value::RefId(usize::MAX)),
        TF => FieldValue::Bytes(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BitReader;
    use crate::engine::decode::decode_object_body;
    use crate::object::Supertype;
    use crate::schema;
    use crate::types::DwgVersion;

    fn line(doc: &mut Document) -> CadObject {
        let mut obj = CadObject::new(FixedType::Line, Supertype::Entity, "LINE");
        obj.handle = doc.alloc_handle();
        obj.fields
            .set("start", FieldValue::Point3(Vector3::new(1.0, 2.0, 0.0)));
        obj.fields
            .set("end", FieldValue::Point3(Vector3::new(4.0, 6.0, 0.0)));
        obj.fields.set("thickness", FieldValue::Double(0.0));
        obj.fields
            .set("extrusion", FieldValue::Point3(Vector3::UNIT_Z));
        let layer = doc
            .find_table_handle(crate::object::TableKind::Layer, "0")
            .unwrap();
        let layer_ref = doc.add_absolute_ref(5, layer);
        obj.entity_mut().unwrap().layer = Some(layer_ref);
        obj
    }

    fn body_round_trip(version: DwgVersion, obj: &CadObject, doc: &mut Document) -> CadObject {
        let schema = schema::schema_for_fixedtype(obj.fixedtype).unwrap();
        let mut w = BitWriter::new(version);
        encode_object_body(doc, &mut w, schema, obj).unwrap();
        let mut r = BitReader::new(w.into_bytes(), version);
        let mut decoded = CadObject::new(obj.fixedtype, obj.supertype, obj.dxf_name.clone());
        decoded.handle = obj.handle;
        decode_object_body(doc, &mut r, schema, &mut decoded).unwrap();
        decoded
    }

    #[test]
    fn test_line_body_round_trip() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let obj = line(&mut doc);
        let decoded = body_round_trip(DwgVersion::AC1018, &obj, &mut doc);
        assert_eq!(decoded.fields.get("start"), obj.fields.get("start"));
        assert_eq!(decoded.fields.get("end"), obj.fields.get("end"));
        let layer = decoded.entity().unwrap().layer.unwrap();
        assert_eq!(
            doc.ref_handle(layer),
            doc.find_table_handle(crate::object::TableKind::Layer, "0")
        );
    }

    #[test]
    fn test_missing_fields_encode_as_zero() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let mut obj = CadObject::new(FixedType::Circle, Supertype::Entity, "CIRCLE");
        obj.handle = doc.alloc_handle();
        // no payload at all; the stream must still be well formed
        let decoded = body_round_trip(DwgVersion::AC1015, &obj, &mut doc);
        assert_eq!(decoded.fields.double("radius"), Some(0.0));
        assert_eq!(
            decoded.fields.get("extrusion"),
            Some(&FieldValue::Point3(Vector3::UNIT_Z))
        );
    }

    #[test]
    fn test_count_scalar_rewritten_from_list() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let mut obj = CadObject::new(FixedType::LwPolyline, Supertype::Entity, "LWPOLYLINE");
        obj.handle = doc.alloc_handle();
        obj.fields.set(
            "points",
            FieldValue::List(vec![
                FieldValue::Point2(Vector2::new(0.0, 0.0)),
                FieldValue::Point2(Vector2::new(5.0, 0.0)),
                FieldValue::Point2(Vector2::new(5.0, 5.0)),
            ]),
        );
        // stale count: the engine must trust the list, not the scalar
        obj.fields.set("num_points", FieldValue::Int(99));
        let decoded = body_round_trip(DwgVersion::AC1015, &obj, &mut doc);
        assert_eq!(decoded.fields.int("num_points"), Some(3));
        assert_eq!(
            decoded.fields.get("points").and_then(FieldValue::as_list).map(|l| l.len()),
            Some(3)
        );
    }

    #[test]
    fn test_version_gating_changes_stream() {
        let mut doc15 = Document::new(DwgVersion::AC1015);
        let mut doc18 = Document::new(DwgVersion::AC1018);
        let schema = schema::schema_for_fixedtype(FixedType::Polyline2D).unwrap();
        let mut obj = CadObject::new(FixedType::Polyline2D, Supertype::Entity, "POLYLINE");
        obj.handle = Handle::new(0x50);

        let mut w15 = BitWriter::new(DwgVersion::AC1015);
        encode_fields(&doc15, &mut w15, schema, &obj).unwrap();
        let mut w18 = BitWriter::new(DwgVersion::AC1018);
        encode_fields(&doc18, &mut w18, schema, &obj).unwrap();
        // R2000 carries first/last vertex pointers, R2004 a count +
        // handle array; the byte streams cannot agree
        assert_ne!(w15.into_bytes(), w18.into_bytes());
    }

    #[test]
    fn test_object_common_round_trip() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let mut obj = CadObject::new(FixedType::XRecord, Supertype::Object, "XRECORD");
        obj.handle = doc.alloc_handle();
        let root = doc.objects()[0].handle;
        let owner = doc.add_absolute_ref(4, root);
        obj.common.set_owner(Some(owner));
        obj.fields.set("data", FieldValue::Bytes(vec![9, 8, 7]));
        obj.fields.set("data_size", FieldValue::Int(3));
        let decoded = body_round_trip(DwgVersion::AC1018, &obj, &mut doc);
        assert_eq!(decoded.fields.get("data"), Some(&FieldValue::Bytes(vec![9, 8, 7])));
        assert_eq!(
            decoded.common.owner().and_then(|id| doc.ref_handle(id)),
            Some(root)
        );
    }
}
