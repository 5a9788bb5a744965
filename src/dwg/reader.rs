//! Binary container ingestion.
//!
//! The outer frame (locators, sentinels, CRCs) is parsed here; object
//! bodies are handed to the shared field engine. Damaged records degrade
//! to notifications and error flags rather than failing the whole file
//! wherever the surrounding structure is still navigable.

use std::io::Cursor;
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::codec::{crc16, BitReader};
use crate::document::Document;
use crate::dwg::file_header::{
    section, FileHeader, SectionLocator, CLASSES_BEGIN, CLASSES_END, HEADER_BEGIN, HEADER_END,
    PREVIEW_BEGIN, PREVIEW_END,
};
use crate::engine::decode_object_body;
use crate::error::{DwgError, ErrorFlags, Result};
use crate::header::HEADER_FIELDS;
use crate::notification::Severity;
use crate::object::{CadObject, FixedType, Supertype};
use crate::postprocess::postprocess;
use crate::resolver::NameResolution;
use crate::schema::{self, WireType};
use crate::types::Handle;
use crate::value::FieldValue;

/// Parse a binary drawing file from a byte buffer.
pub fn read_dwg(data: &[u8]) -> Result<Document> {
    read_dwg_with(data, NameResolution::BestEffort)
}

/// Parse a binary drawing file under an explicit name policy.
pub fn read_dwg_with(data: &[u8], policy: NameResolution) -> Result<Document> {
    let (header, _) = FileHeader::parse(data)?;
    let mut doc = Document::empty(header.version);

    read_header_section(&mut doc, data, &header)?;
    read_classes_section(&mut doc, data, &header)?;
    read_objects(&mut doc, data, &header)?;
    read_summary_section(&mut doc, data, &header)?;
    read_preview(&mut doc, data, &header)?;

    postprocess(&mut doc, policy)?;
    Ok(doc)
}

/// Parse a binary drawing file from disk.
pub fn read_dwg_file(path: impl AsRef<Path>) -> Result<Document> {
    let data = std::fs::read(path)?;
    read_dwg(&data)
}

fn section_slice<'a>(data: &'a [u8], locator: &SectionLocator) -> Result<&'a [u8]> {
    let start = locator.address as usize;
    let end = start + locator.size as usize;
    data.get(start..end).ok_or_else(|| {
        DwgError::InvalidFormat(format!(
            "section {} points past end of file ({start}..{end})",
            locator.number
        ))
    })
}

/// Unwrap a sentinel-framed section: begin sentinel, RL payload size,
/// payload, RS CRC, end sentinel. Returns the payload and whether its
/// CRC matched.
fn unwrap_section(slice: &[u8], begin: &[u8; 16], end: &[u8; 16], what: &str) -> Result<(Vec<u8>, bool)> {
    if slice.len() < 16 + 4 + 2 + 16 || slice[..16] != begin[..] {
        return Err(DwgError::InvalidSentinel(what.to_string()));
    }
    let size = Cursor::new(&slice[16..20]).read_u32::<LittleEndian>()? as usize;
    let data_end = 20 + size;
    let payload = slice
        .get(20..data_end)
        .ok_or_else(|| DwgError::InvalidFormat(format!("{what} section truncated")))?;
    let stored = Cursor::new(
        slice
            .get(data_end..data_end + 2)
            .ok_or_else(|| DwgError::InvalidFormat(format!("{what} section truncated")))?,
    )
    .read_u16::<LittleEndian>()?;
    let crc_ok = stored == crc16(0, &slice[16..data_end]);
    if slice.get(data_end + 2..data_end + 18) != Some(&end[..]) {
        return Err(DwgError::InvalidSentinel(what.to_string()));
    }
    Ok((payload.to_vec(), crc_ok))
}

fn note_bad_crc(doc: &mut Document, what: &str) {
    doc.error_flags |= ErrorFlags::WRONG_CRC;
    doc.notifications
        .notify(Severity::Warning, format!("{what} section CRC mismatch"));
}

fn read_header_section(doc: &mut Document, data: &[u8], header: &FileHeader) -> Result<()> {
    let Some(locator) = header.locator(section::HEADER) else {
        return Err(DwgError::InvalidFormat("missing header section".into()));
    };
    let slice = section_slice(data, locator)?;
    let (payload, crc_ok) = unwrap_section(slice, &HEADER_BEGIN, &HEADER_END, "header")?;
    if !crc_ok {
        note_bad_crc(doc, "header");
    }

    let version = doc.version;
    let mut r = BitReader::new(payload, version);
    for d in HEADER_FIELDS.iter().filter(|d| d.in_version(version)) {
        use WireType::*;
        let value = match d.wire {
            B => FieldValue::Bool(r.read_bit()?),
            BS => FieldValue::Int(r.read_bs()? as i64),
            BL => FieldValue::Int(r.read_bl()? as i64),
            BLL => FieldValue::Int(r.read_bll()? as i64),
            BD => FieldValue::Double(r.read_bd()?),
            RD => FieldValue::Double(r.read_rd()?),
            CMC => FieldValue::Color(r.read_cmc()?),
            T => FieldValue::Text(r.read_t()?),
            H => {
                let href = r.read_h()?;
                if d.name == "HANDSEED" {
                    // the allocator seed, not a reference into the graph
                    doc.set_handle_seed(href.resolve(Handle::NULL));
                    continue;
                }
                if href.is_null() {
                    continue;
                }
                FieldValue::Ref(doc.add_handle_ref(href, Handle::NULL))
            }
            other => {
                return Err(DwgError::Parse(format!(
                    "header variable {} has unsupported wire type {other:?}",
                    d.name
                )))
            }
        };
        doc.header.fields.set(d.name, value);
    }
    Ok(())
}

fn read_classes_section(doc: &mut Document, data: &[u8], header: &FileHeader) -> Result<()> {
    let Some(locator) = header.locator(section::CLASSES) else {
        doc.error_flags |= ErrorFlags::SECTION_NOT_FOUND;
        doc.notifications
            .notify(Severity::Warning, "no classes section");
        return Ok(());
    };
    let slice = section_slice(data, locator)?;
    let (payload, crc_ok) = unwrap_section(slice, &CLASSES_BEGIN, &CLASSES_END, "classes")?;
    if !crc_ok {
        note_bad_crc(doc, "classes");
    }

    let mut r = BitReader::new(payload, doc.version);
    while !r.at_end() {
        let mut class = crate::classes::DxfClass {
            class_number: r.read_bs()? as i16,
            proxy_flags: r.read_bl()? as i32,
            ..Default::default()
        };
        class.app_name = r.read_t()?;
        class.cpp_name = r.read_t()?;
        class.dxf_name = r.read_t()?;
        class.was_proxy = r.read_bit()?;
        class.is_entity = r.read_bit()?;
        doc.classes.register(class);
        // each registration is byte aligned so at_end stays exact
        r.align();
    }
    Ok(())
}

/// One object map entry: the handle and its absolute file offset.
fn read_object_map(doc: &mut Document, data: &[u8], header: &FileHeader) -> Result<Vec<(Handle, usize)>> {
    let Some(locator) = header.locator(section::OBJECT_MAP) else {
        return Err(DwgError::InvalidFormat("missing object map section".into()));
    };
    let slice = section_slice(data, locator)?;
    let mut entries = Vec::new();
    let mut pos = 0usize;
    let mut handle: u64 = 0;
    let mut offset: i64 = 0;
    loop {
        let chunk_size = Cursor::new(
            slice
                .get(pos..pos + 2)
                .ok_or_else(|| DwgError::InvalidFormat("object map truncated".into()))?,
        )
        // chunk sizes and CRCs are the one big-endian corner of the format
        .read_u16::<BigEndian>()? as usize;
        if chunk_size < 2 {
            return Err(DwgError::InvalidFormat("object map chunk undersized".into()));
        }
        let body = slice
            .get(pos + 2..pos + chunk_size)
            .ok_or_else(|| DwgError::InvalidFormat("object map truncated".into()))?;
        let stored = Cursor::new(
            slice
                .get(pos + chunk_size..pos + chunk_size + 2)
                .ok_or_else(|| DwgError::InvalidFormat("object map truncated".into()))?,
        )
        .read_u16::<BigEndian>()?;
        if stored != crc16(0xC0C1, &slice[pos..pos + chunk_size]) {
            note_bad_crc(doc, "object map");
        }
        if chunk_size == 2 {
            break;
        }
        let mut r = BitReader::new(body.to_vec(), doc.version);
        while !r.at_end() {
            handle = handle.wrapping_add(r.read_umc()?);
            offset = offset.wrapping_add(r.read_mc()?);
            if offset < 0 || offset as usize >= data.len() {
                return Err(DwgError::InvalidFormat(format!(
                    "object map offset {offset} out of range"
                )));
            }
            entries.push((Handle::new(handle), offset as usize));
        }
        pos += chunk_size + 2;
    }
    Ok(entries)
}

fn read_objects(doc: &mut Document, data: &[u8], header: &FileHeader) -> Result<()> {
    let entries = read_object_map(doc, data, header)?;
    for (map_handle, offset) in entries {
        if let Err(e) = read_object(doc, data, map_handle, offset) {
            doc.error_flags |= ErrorFlags::INVALID_DWG;
            doc.notifications.notify_on(
                Severity::Error,
                map_handle,
                format!("object at offset {offset} could not be decoded: {e}"),
            );
        }
    }
    Ok(())
}

fn read_object(doc: &mut Document, data: &[u8], map_handle: Handle, offset: usize) -> Result<()> {
    let tail = data
        .get(offset..)
        .ok_or_else(|| DwgError::InvalidFormat("object offset past end of file".into()))?;
    // the MS size prefix is byte oriented; measure how much it consumed
    let mut sizer = BitReader::new(tail[..tail.len().min(8)].to_vec(), doc.version);
    let size = sizer.read_ms()? as usize;
    let size_len = (sizer.bit_position() / 8) as usize;
    let body = tail
        .get(size_len..size_len + size)
        .ok_or_else(|| DwgError::InvalidFormat("object record truncated".into()))?;
    let stored = Cursor::new(
        tail.get(size_len + size..size_len + size + 2)
            .ok_or_else(|| DwgError::InvalidFormat("object record truncated".into()))?,
    )
    .read_u16::<LittleEndian>()?;
    if stored != crc16(0xC0C1, &tail[..size_len + size]) {
        note_bad_crc(doc, "object");
    }

    let mut r = BitReader::new(body.to_vec(), doc.version);
    let raw_type = r.read_bs()? as i16;
    let stream_handle = r.read_h()?.resolve(Handle::NULL);
    let handle = if stream_handle.is_null() {
        map_handle
    } else {
        if stream_handle != map_handle {
            doc.notifications.notify_on(
                Severity::Warning,
                map_handle,
                format!(
                    "object map and record disagree on handle ({:#X} vs {:#X})",
                    map_handle.value(),
                    stream_handle.value()
                ),
            );
        }
        stream_handle
    };

    let schema = match FixedType::from_code(raw_type) {
        Some(t) => schema::schema_for_fixedtype(t),
        None => doc
            .classes
            .by_number(raw_type)
            .and_then(|c| schema::schema_for_dxf_name(&c.dxf_name)),
    };
    let Some(schema) = schema else {
        park_unknown(doc, &mut r, raw_type, handle);
        return Ok(());
    };

    let mut obj = CadObject::new(schema.fixedtype, schema.supertype, schema.dxf_name);
    obj.raw_type = raw_type;
    obj.handle = handle;
    decode_object_body(doc, &mut r, schema, &mut obj)?;
    doc.add_object(obj);
    Ok(())
}

/// Keep a record we have no schema for: raw payload bits, preserved
/// verbatim so the writer can re-emit them.
fn park_unknown(doc: &mut Document, r: &mut BitReader, raw_type: i16, handle: Handle) {
    let (fixedtype, supertype, dxf_name) = match doc.classes.by_number(raw_type) {
        Some(c) if c.is_entity => (FixedType::UnknownEntity, Supertype::Entity, c.dxf_name.clone()),
        Some(c) => (FixedType::UnknownObject, Supertype::Object, c.dxf_name.clone()),
        None => (FixedType::UnknownObject, Supertype::Object, format!("UNKNOWN_{raw_type}")),
    };
    r.align();
    let from = (r.bit_position() / 8) as usize;
    let mut obj = CadObject::new(fixedtype, supertype, dxf_name.clone());
    obj.raw_type = raw_type;
    obj.handle = handle;
    obj.unknown_bits = r.bytes()[from..].to_vec();
    doc.error_flags |= ErrorFlags::UNHANDLED_CLASS;
    doc.notifications.notify_on(
        Severity::NotImplemented,
        handle,
        format!("no schema for type {raw_type} ({dxf_name})"),
    );
    doc.add_object(obj);
}

fn read_summary_section(doc: &mut Document, data: &[u8], header: &FileHeader) -> Result<()> {
    let Some(locator) = header.locator(section::SUMMARY) else {
        return Ok(());
    };
    let slice = section_slice(data, locator)?;
    let size = Cursor::new(
        slice
            .get(0..4)
            .ok_or_else(|| DwgError::InvalidFormat("summary section truncated".into()))?,
    )
    .read_u32::<LittleEndian>()? as usize;
    let payload = slice
        .get(4..4 + size)
        .ok_or_else(|| DwgError::InvalidFormat("summary section truncated".into()))?;
    let stored = Cursor::new(
        slice
            .get(4 + size..4 + size + 2)
            .ok_or_else(|| DwgError::InvalidFormat("summary section truncated".into()))?,
    )
    .read_u16::<LittleEndian>()?;
    if stored != crc16(0, &slice[..4 + size]) {
        note_bad_crc(doc, "summary");
    }
    let mut r = BitReader::new(payload.to_vec(), doc.version);
    doc.summary.title = r.read_t()?;
    doc.summary.subject = r.read_t()?;
    doc.summary.author = r.read_t()?;
    doc.summary.keywords = r.read_t()?;
    doc.summary.comments = r.read_t()?;
    doc.summary.last_saved_by = r.read_t()?;
    Ok(())
}

fn read_preview(doc: &mut Document, data: &[u8], header: &FileHeader) -> Result<()> {
    if header.preview_address == 0 {
        return Ok(());
    }
    let start = header.preview_address as usize;
    let slice = data
        .get(start..)
        .ok_or_else(|| DwgError::InvalidFormat("preview address past end of file".into()))?;
    if slice.len() < 16 + 4 || slice[..16] != PREVIEW_BEGIN[..] {
        return Err(DwgError::InvalidSentinel("preview".into()));
    }
    let len = Cursor::new(&slice[16..20]).read_u32::<LittleEndian>()? as usize;
    let blob = slice
        .get(20..20 + len)
        .ok_or_else(|| DwgError::InvalidFormat("preview truncated".into()))?;
    if slice.get(20 + len..20 + len + 16) != Some(&PREVIEW_END[..]) {
        return Err(DwgError::InvalidSentinel("preview".into()));
    }
    doc.thumbnail = Some(blob.to_vec());
    Ok(())
}
