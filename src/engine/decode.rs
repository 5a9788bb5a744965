//! The decode pass: schema tables -> populated [`CadObject`].

use crate::codec::BitReader;
use crate::document::Document;
use crate::engine::{checked_count, eed, hatch};
use crate::error::{DwgError, Result};
use crate::object::{CadObject, Common, EntityCommon, FixedType, ObjectCommon, Supertype};
use crate::schema::{FieldDescriptor, ObjectSchema, Repeat, WireType};
use crate::types::Handle;
use crate::value::{FieldValue, RefId};

/// Decode the full object body: common block, schema fields, ragged
/// tails. The object must already carry its handle (read from the record
/// framing) so offset handle references can resolve against it.
pub fn decode_object_body(
    doc: &mut Document,
    r: &mut BitReader,
    schema: &ObjectSchema,
    obj: &mut CadObject,
) -> Result<()> {
    decode_common(doc, r, obj)?;
    decode_fields(doc, r, schema, obj)?;
    if obj.fixedtype == FixedType::Hatch {
        hatch::decode_paths(doc, r, obj)?;
    }
    Ok(())
}

/// Decode the common entity/object block (EED, reactors, xdict, and the
/// entity display fields).
pub fn decode_common(doc: &mut Document, r: &mut BitReader, obj: &mut CadObject) -> Result<()> {
    let eed = eed::decode_eed(doc, r, obj.handle)?;
    let num_reactors = checked_count(doc, r.read_bl()? as i64)?;
    let xdict_missing = r.read_bit()?;

    match obj.supertype {
        Supertype::Entity => {
            let paper_space = r.read_bit()?;
            let color = r.read_cmc()?;
            let linetype_scale = r.read_bd()?;
            let ltype_flags = r.read_2bits()?;
            let invisible = r.read_bit()?;

            let owner = read_common_handle(doc, r, obj.handle)?;
            let (prev_entity, next_entity) = if doc.version.uses_entity_chain() {
                (
                    read_common_handle(doc, r, obj.handle)?,
                    read_common_handle(doc, r, obj.handle)?,
                )
            } else {
                (None, None)
            };
            let mut reactors = Vec::with_capacity(num_reactors);
            for _ in 0..num_reactors {
                if let Some(id) = read_common_handle(doc, r, obj.handle)? {
                    reactors.push(id);
                }
            }
            let xdict = if xdict_missing {
                None
            } else {
                read_common_handle(doc, r, obj.handle)?
            };
            let layer = read_common_handle(doc, r, obj.handle)?;
            let linetype = if ltype_flags == 3 {
                read_common_handle(doc, r, obj.handle)?
            } else {
                None
            };

            obj.common = Common::Entity(EntityCommon {
                owner,
                layer,
                linetype,
                color,
                linetype_scale,
                invisible,
                paper_space,
                prev_entity,
                next_entity,
                eed,
                reactors,
                xdict,
            });
        }
        Supertype::Object => {
            let owner = read_common_handle(doc, r, obj.handle)?;
            let mut reactors = Vec::with_capacity(num_reactors);
            for _ in 0..num_reactors {
                if let Some(id) = read_common_handle(doc, r, obj.handle)? {
                    reactors.push(id);
                }
            }
            let xdict = if xdict_missing {
                None
            } else {
                read_common_handle(doc, r, obj.handle)?
            };
            obj.common = Common::Object(ObjectCommon {
                owner,
                eed,
                reactors,
                xdict,
            });
        }
    }
    Ok(())
}

fn read_common_handle(
    doc: &mut Document,
    r: &mut BitReader,
    base: Handle,
) -> Result<Option<RefId>> {
    let href = r.read_h()?;
    if href.is_null() {
        return Ok(None);
    }
    Ok(Some(doc.add_handle_ref(href, base)))
}

/// Decode the type-specific fields in descriptor order, honoring version
/// windows and cardinality rules.
pub fn decode_fields(
    doc: &mut Document,
    r: &mut BitReader,
    schema: &ObjectSchema,
    obj: &mut CadObject,
) -> Result<()> {
    for d in schema.fields_for(doc.version) {
        let value = match d.repeat {
            Repeat::One => read_value(doc, r, d, obj.handle)?,
            Repeat::Fixed(n) => read_repeated(doc, r, d, obj.handle, n as usize)?,
            Repeat::Count(sibling) => {
                let declared = obj.fields.int(sibling).unwrap_or(0);
                let n = checked_count(doc, declared)?;
                read_repeated(doc, r, d, obj.handle, n)?
            }
        };
        obj.fields.set(d.name, value);
    }
    Ok(())
}

fn read_repeated(
    doc: &mut Document,
    r: &mut BitReader,
    d: &FieldDescriptor,
    base: Handle,
    n: usize,
) -> Result<FieldValue> {
    // TF with a count is a single contiguous blob, not n one-byte items
    if d.wire == WireType::TF {
        return Ok(FieldValue::Bytes(r.read_tf(n)?));
    }
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        items.push(read_value(doc, r, d, base)?);
    }
    Ok(FieldValue::List(items))
}

fn read_value(
    doc: &mut Document,
    r: &mut BitReader,
    d: &FieldDescriptor,
    base: Handle,
) -> Result<FieldValue> {
    use WireType::*;
    let value = match d.wire {
        B => FieldValue::Bool(r.read_bit()?),
        BB => FieldValue::Int(r.read_2bits()? as i64),
        RC => FieldValue::Int(r.read_rc()? as i64),
        RS => FieldValue::Int(r.read_rs()? as i64),
        RL => FieldValue::Int(r.read_rl()? as i64),
        RLL => FieldValue::Int(r.read_rll()? as i64),
        BS => FieldValue::Int(r.read_bs()? as i64),
        BL => FieldValue::Int(r.read_bl()? as i64),
        BLL => FieldValue::Int(r.read_bll()? as i64),
        MC => FieldValue::Int(r.read_mc()?),
        UMC => FieldValue::Int(r.read_umc()? as i64),
        MS => FieldValue::Int(r.read_ms()? as i64),
        RD => FieldValue::Double(r.read_rd()?),
        BD => FieldValue::Double(r.read_bd()?),
        DD => FieldValue::Double(r.read_dd(0.0)?),
        BT => FieldValue::Double(r.read_bt()?),
        P2RD => FieldValue::Point2(r.read_2rd()?),
        P2BD => FieldValue::Point2(r.read_2bd()?),
        P3BD => FieldValue::Point3(r.read_3bd()?),
        BE => FieldValue::Point3(r.read_be()?),
        CMC => FieldValue::Color(r.read_cmc()?),
        T => FieldValue::Text(r.read_t()?),
        H => {
            let href = r.read_h()?;
            FieldValue::Ref(doc.add_handle_ref(href, base))
        }
        TF => {
            return Err(DwgError::Parse(format!(
                "field {} uses TF without a length rule",
                d.name
            )))
        }
    };
    Ok(value)
}
