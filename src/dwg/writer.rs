//! Binary container emission.
//!
//! Sections are built independently, then the locator table is laid out
//! and the file assembled. The object map is rebuilt from scratch on
//! every save; nothing from a previous read survives except the object
//! records themselves.

use std::path::Path;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::codec::{crc16, BitWriter};
use crate::document::{known_handle, Document};
use crate::dwg::file_header::{
    section, FileHeader, SectionLocator, CLASSES_BEGIN, CLASSES_END, HEADER_BEGIN, HEADER_END,
    PREVIEW_BEGIN, PREVIEW_END,
};
use crate::engine::encode_object_body;
use crate::error::Result;
use crate::header::HEADER_FIELDS;
use crate::schema;
use crate::schema::WireType;
use crate::types::{Handle, HandleReference};
use crate::value::FieldValue;

/// Soft cap on object map chunk payloads, matching the format's
/// traditional 2KB sections.
const MAP_CHUNK_LIMIT: usize = 2000;

/// Serialize a document as a binary drawing file.
pub fn write_dwg(doc: &mut Document) -> Result<Vec<u8>> {
    crate::postprocess::link_block_runs(doc);
    doc.refresh_refs();
    let doc = &*doc;

    let header_section = wrap_section(&HEADER_BEGIN, &HEADER_END, encode_header(doc)?);
    let classes_section = wrap_section(&CLASSES_BEGIN, &CLASSES_END, encode_classes(doc));
    let (object_area, entries) = encode_objects(doc)?;
    let summary_section = encode_summary(doc);

    let mut fh = FileHeader::new(doc.version);
    let mut pos = 25 + 9 * 4 + 2 + 16; // header with four locators
    if let Some(thumb) = &doc.thumbnail {
        fh.preview_address = pos as u32;
        pos += 16 + 4 + thumb.len() + 16;
    }
    fh.locators.push(SectionLocator {
        number: section::HEADER,
        address: pos as u32,
        size: header_section.len() as u32,
    });
    pos += header_section.len();
    fh.locators.push(SectionLocator {
        number: section::CLASSES,
        address: pos as u32,
        size: classes_section.len() as u32,
    });
    pos += classes_section.len();

    let object_base = pos;
    pos += object_area.len();

    let entries: Vec<(Handle, usize)> = entries
        .into_iter()
        .map(|(h, rel)| (h, object_base + rel))
        .collect();
    let map_section = encode_object_map(doc, &entries);
    fh.locators.push(SectionLocator {
        number: section::OBJECT_MAP,
        address: pos as u32,
        size: map_section.len() as u32,
    });
    pos += map_section.len();
    fh.locators.push(SectionLocator {
        number: section::SUMMARY,
        address: pos as u32,
        size: summary_section.len() as u32,
    });
    pos += summary_section.len();

    let mut out = Vec::with_capacity(pos);
    out.extend_from_slice(&fh.to_bytes());
    if let Some(thumb) = &doc.thumbnail {
        out.extend_from_slice(&PREVIEW_BEGIN);
        out.write_u32::<LittleEndian>(thumb.len() as u32).ok();
        out.extend_from_slice(thumb);
        out.extend_from_slice(&PREVIEW_END);
    }
    out.extend_from_slice(&header_section);
    out.extend_from_slice(&classes_section);
    out.extend_from_slice(&object_area);
    out.extend_from_slice(&map_section);
    out.extend_from_slice(&summary_section);
    Ok(out)
}

/// Serialize a document to a file on disk.
pub fn write_dwg_file(path: impl AsRef<Path>, doc: &mut Document) -> Result<()> {
    let bytes = write_dwg(doc)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Frame a payload: begin sentinel, RL size, payload, RS CRC over size
/// and payload, end sentinel.
fn wrap_section(begin: &[u8; 16], end: &[u8; 16], payload: Vec<u8>) -> Vec<u8> {
    let mut inner = Vec::with_capacity(4 + payload.len());
    inner.write_u32::<LittleEndian>(payload.len() as u32).ok();
    inner.extend_from_slice(&payload);
    let crc = crc16(0, &inner);

    let mut out = Vec::with_capacity(16 + inner.len() + 2 + 16);
    out.extend_from_slice(begin);
    out.extend_from_slice(&inner);
    out.write_u16::<LittleEndian>(crc).ok();
    out.extend_from_slice(end);
    out
}

/// The well-known handle a header pointer variable falls back to when
/// the document never populated it.
fn default_header_handle(name: &str) -> Handle {
    let value = match name {
        "CLAYER" => known_handle::LAYER_ZERO,
        "TEXTSTYLE" => known_handle::STYLE_STANDARD,
        "CELTYPE" => known_handle::LTYPE_BYLAYER,
        "DIMSTYLE" => known_handle::DIMSTYLE_STANDARD,
        "BLOCK_CONTROL" => known_handle::BLOCK_CONTROL,
        "LAYER_CONTROL" => known_handle::LAYER_CONTROL,
        "STYLE_CONTROL" => known_handle::STYLE_CONTROL,
        "LTYPE_CONTROL" => known_handle::LTYPE_CONTROL,
        "APPID_CONTROL" => known_handle::APPID_CONTROL,
        "DIMSTYLE_CONTROL" => known_handle::DIMSTYLE_CONTROL,
        "DICTIONARY_NAMED_OBJECT" => known_handle::ROOT_DICTIONARY,
        "LTYPE_BYLAYER" => known_handle::LTYPE_BYLAYER,
        "LTYPE_BYBLOCK" => known_handle::LTYPE_BYBLOCK,
        "LTYPE_CONTINUOUS" => known_handle::LTYPE_CONTINUOUS,
        "MODEL_SPACE" => known_handle::MODEL_SPACE,
        "PAPER_SPACE" => known_handle::PAPER_SPACE,
        _ => return Handle::NULL,
    };
    Handle::new(value)
}

fn encode_header(doc: &Document) -> Result<Vec<u8>> {
    let mut w = BitWriter::new(doc.version);
    for d in HEADER_FIELDS.iter().filter(|d| d.in_version(doc.version)) {
        use WireType::*;
        let value = doc.header.fields.get(d.name);
        match d.wire {
            B => w.write_bit(value.and_then(FieldValue::as_int).unwrap_or(0) != 0),
            BS => w.write_bs(value.and_then(FieldValue::as_int).unwrap_or(0) as u16),
            BL => w.write_bl(value.and_then(FieldValue::as_int).unwrap_or(0) as u32),
            BLL => w.write_bll(value.and_then(FieldValue::as_int).unwrap_or(0) as u64)?,
            BD => w.write_bd(value.and_then(FieldValue::as_double).unwrap_or(0.0)),
            RD => w.write_rd(value.and_then(FieldValue::as_double).unwrap_or(0.0)),
            CMC => match value {
                Some(FieldValue::Color(c)) => w.write_cmc(c),
                _ => w.write_cmc(&crate::types::Color::by_layer()),
            },
            T => w.write_t(value.and_then(FieldValue::as_text).unwrap_or("")),
            H => {
                let handle = if d.name == "HANDSEED" {
                    doc.handle_seed()
                } else {
                    value
                        .and_then(FieldValue::as_ref_id)
                        .and_then(|id| doc.ref_handle(id))
                        .unwrap_or_else(|| default_header_handle(d.name))
                };
                w.write_h(&HandleReference::absolute(d.handle_code, handle))?;
            }
            other => {
                return Err(crate::error::DwgError::Parse(format!(
                    "header variable {} has unsupported wire type {other:?}",
                    d.name
                )))
            }
        }
    }
    Ok(w.into_bytes())
}

fn encode_classes(doc: &Document) -> Vec<u8> {
    let mut w = BitWriter::new(doc.version);
    for class in doc.classes.iter() {
        w.write_bs(class.class_number as u16);
        w.write_bl(class.proxy_flags as u32);
        w.write_t(&class.app_name);
        w.write_t(&class.cpp_name);
        w.write_t(&class.dxf_name);
        w.write_bit(class.was_proxy);
        w.write_bit(class.is_entity);
        w.align();
    }
    w.into_bytes()
}

/// Encode every live object. Returns the concatenated records and the
/// (handle, offset-within-area) list for the object map.
fn encode_objects(doc: &Document) -> Result<(Vec<u8>, Vec<(Handle, usize)>)> {
    let mut area = Vec::new();
    let mut entries = Vec::new();
    for obj in doc.objects() {
        if obj.is_freed() {
            continue;
        }
        let mut w = BitWriter::new(doc.version);
        if !obj.unknown_bits.is_empty() {
            // parked placeholder with its raw payload intact; re-emit
            // verbatim instead of running the (empty) schema over it
            w.write_bs(obj.raw_type as u16);
            w.write_h(&HandleReference::absolute(0, obj.handle))?;
            w.align();
            w.write_tf(&obj.unknown_bits);
        } else if let Some(schema) = schema::schema_for_fixedtype(obj.fixedtype)
            .filter(|_| !obj.fixedtype.is_unknown())
        {
            let code = obj
                .fixedtype
                .code()
                .or_else(|| doc.classes.by_dxf_name(schema.dxf_name).map(|c| c.class_number))
                .unwrap_or(obj.raw_type);
            w.write_bs(code as u16);
            w.write_h(&HandleReference::absolute(0, obj.handle))?;
            encode_object_body(doc, &mut w, schema, obj)?;
        } else {
            // a placeholder with neither schema nor bit image has
            // nothing sound to emit
            continue;
        }
        let body = w.into_bytes();

        let mut sizer = BitWriter::new(doc.version);
        sizer.write_ms(body.len() as u32);
        let mut record = sizer.into_bytes();
        record.extend_from_slice(&body);
        let crc = crc16(0xC0C1, &record);

        entries.push((obj.handle, area.len()));
        area.extend_from_slice(&record);
        area.write_u16::<LittleEndian>(crc).ok();
    }
    Ok((area, entries))
}

fn encode_object_map(doc: &Document, entries: &[(Handle, usize)]) -> Vec<u8> {
    let mut sorted: Vec<(Handle, usize)> = entries.to_vec();
    sorted.sort_by_key(|(h, _)| h.value());

    let mut out = Vec::new();
    let mut chunk = BitWriter::new(doc.version);
    let mut prev_handle = 0u64;
    let mut prev_offset = 0i64;
    for (handle, offset) in sorted {
        chunk.write_umc(handle.value().wrapping_sub(prev_handle));
        chunk.write_mc(offset as i64 - prev_offset);
        prev_handle = handle.value();
        prev_offset = offset as i64;
        if chunk.bytes().len() >= MAP_CHUNK_LIMIT {
            flush_map_chunk(&mut out, std::mem::replace(&mut chunk, BitWriter::new(doc.version)));
        }
    }
    if !chunk.bytes().is_empty() {
        flush_map_chunk(&mut out, chunk);
    }
    // empty terminator chunk
    flush_map_chunk(&mut out, BitWriter::new(doc.version));
    out
}

fn flush_map_chunk(out: &mut Vec<u8>, chunk: BitWriter) {
    let body = chunk.into_bytes();
    let mut section = Vec::with_capacity(2 + body.len());
    section.write_u16::<BigEndian>((body.len() + 2) as u16).ok();
    section.extend_from_slice(&body);
    let crc = crc16(0xC0C1, &section);
    out.extend_from_slice(&section);
    out.write_u16::<BigEndian>(crc).ok();
}

fn encode_summary(doc: &Document) -> Vec<u8> {
    let mut w = BitWriter::new(doc.version);
    w.write_t(&doc.summary.title);
    w.write_t(&doc.summary.subject);
    w.write_t(&doc.summary.author);
    w.write_t(&doc.summary.keywords);
    w.write_t(&doc.summary.comments);
    w.write_t(&doc.summary.last_saved_by);
    let payload = w.into_bytes();

    let mut out = Vec::with_capacity(4 + payload.len() + 2);
    out.write_u32::<LittleEndian>(payload.len() as u32).ok();
    out.extend_from_slice(&payload);
    let crc = crc16(0, &out);
    out.write_u16::<LittleEndian>(crc).ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwg::reader::read_dwg;
    use crate::error::ErrorFlags;
    use crate::object::{CadObject, FixedType, Supertype, TableKind};
    use crate::types::{DwgVersion, Vector3};

    fn doc_with_line(version: DwgVersion) -> Document {
        let mut doc = Document::new(version);
        let mut obj = CadObject::new(FixedType::Line, Supertype::Entity, "LINE");
        obj.fields
            .set("start", FieldValue::Point3(Vector3::new(0.0, 0.0, 0.0)));
        obj.fields
            .set("end", FieldValue::Point3(Vector3::new(10.0, 5.0, 0.0)));
        obj.fields
            .set("extrusion", FieldValue::Point3(Vector3::UNIT_Z));
        let layer = doc.find_table_record(TableKind::Layer, "0").unwrap();
        let handle = doc.objects()[layer].handle;
        let layer_ref = doc.add_absolute_ref(5, handle);
        let ms = doc.model_space_index().unwrap();
        let owner = doc.add_absolute_ref(4, doc.objects()[ms].handle);
        let e = obj.entity_mut().unwrap();
        e.layer = Some(layer_ref);
        e.owner = Some(owner);
        doc.add_object(obj);
        doc
    }

    #[test]
    fn test_minimal_round_trip() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let bytes = write_dwg(&mut doc).unwrap();
        let back = read_dwg(&bytes).unwrap();
        assert_eq!(back.version, DwgVersion::AC1015);
        assert_eq!(back.len(), doc.len());
        assert!(!back.error_flags.contains(ErrorFlags::WRONG_CRC));
    }

    #[test]
    fn test_line_round_trip() {
        let mut doc = doc_with_line(DwgVersion::AC1018);
        let bytes = write_dwg(&mut doc).unwrap();
        let mut back = read_dwg(&bytes).unwrap();
        let lines = back.indexes_of_type(FixedType::Line);
        assert_eq!(lines.len(), 1);
        let line = back.object(lines[0]).unwrap();
        assert_eq!(
            line.fields.get("end"),
            Some(&FieldValue::Point3(Vector3::new(10.0, 5.0, 0.0)))
        );
        let layer = line.entity().unwrap().layer.unwrap();
        let layer_handle = back.ref_handle(layer).unwrap();
        let idx = back.index_of_handle(layer_handle).unwrap();
        assert_eq!(back.object(idx).unwrap().record_name(), Some("0"));
    }

    #[test]
    fn test_handle_seed_survives() {
        let mut doc = Document::new(DwgVersion::AC1015);
        doc.set_handle_seed(Handle::new(0x5000));
        let bytes = write_dwg(&mut doc).unwrap();
        let back = read_dwg(&bytes).unwrap();
        assert!(back.handle_seed().value() >= 0x5000);
    }

    #[test]
    fn test_summary_and_thumbnail_carried() {
        let mut doc = Document::new(DwgVersion::AC1015);
        doc.summary.title = "site plan".into();
        doc.summary.author = "surveyor".into();
        doc.thumbnail = Some(vec![0x42; 96]);
        let bytes = write_dwg(&mut doc).unwrap();
        let back = read_dwg(&bytes).unwrap();
        assert_eq!(back.summary.title, "site plan");
        assert_eq!(back.summary.author, "surveyor");
        assert_eq!(back.thumbnail.as_deref(), Some(&[0x42u8; 96][..]));
    }

    #[test]
    fn test_unknown_class_payload_preserved() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let number = doc.classes.register(crate::classes::DxfClass {
            class_number: 0,
            proxy_flags: 0,
            app_name: "ObjectDBX Classes".into(),
            cpp_name: "AcDbVbaProject".into(),
            dxf_name: "VBA_PROJECT".into(),
            is_entity: false,
            was_proxy: false,
        });
        let mut obj = CadObject::new(FixedType::UnknownObject, Supertype::Object, "VBA_PROJECT");
        obj.raw_type = number;
        obj.unknown_bits = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x17];
        doc.add_object(obj);
        let bytes = write_dwg(&mut doc).unwrap();
        let back = read_dwg(&bytes).unwrap();
        assert!(back.error_flags.contains(ErrorFlags::UNHANDLED_CLASS));
        let parked = back.indexes_of_type(FixedType::UnknownObject);
        assert_eq!(parked.len(), 1);
        let parked = back.object(parked[0]).unwrap();
        assert_eq!(parked.unknown_bits, vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x17]);
        assert_eq!(parked.dxf_name, "VBA_PROJECT");
    }

    #[test]
    fn test_freed_objects_not_written() {
        let mut doc = doc_with_line(DwgVersion::AC1015);
        let lines = doc.indexes_of_type(FixedType::Line);
        crate::engine::free_object(&mut doc, lines[0]);
        let mut bytes_doc = doc.clone();
        let bytes = write_dwg(&mut bytes_doc).unwrap();
        let back = read_dwg(&bytes).unwrap();
        assert!(back.indexes_of_type(FixedType::Line).is_empty());
        assert!(back.model_space_index().is_some());
    }

    #[test]
    fn test_corrupt_object_crc_sets_flag() {
        let mut doc = doc_with_line(DwgVersion::AC1015);
        let mut bytes = write_dwg(&mut doc).unwrap();
        // flip a byte inside the object area: find the map locator and
        // corrupt just before it
        let (fh, _) = FileHeader::parse(&bytes).unwrap();
        let map = fh.locator(section::OBJECT_MAP).unwrap().address as usize;
        bytes[map - 40] ^= 0x01;
        let back = read_dwg(&bytes).unwrap();
        assert!(back.error_flags.contains(ErrorFlags::WRONG_CRC));
    }
}
