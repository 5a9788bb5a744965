//! DXF emission.
//!
//! The writer walks the document and emits the pair stream section by
//! section, driven by the same field schemas the reader matches against.
//! Two [`PairSink`] framings exist: line-oriented ASCII and the
//! sentinel-prefixed binary variant.
//!
//! Handle-typed fields whose descriptor names a table resolve to the
//! record's symbolic name on the way out; plain handle fields emit hex.

use std::io::Write as _;

use crate::document::Document;
use crate::dxf::binary_reader::BINARY_SENTINEL;
use crate::dxf::code_pair::{code_kind, CodeKind, CodePair, PairSink, PairValue};
use crate::error::Result;
use crate::header::HEADER_FIELDS;
use crate::object::{Eed, EedValue, FixedType, Supertype, TableKind};
use crate::schema::{self, FieldDescriptor, ObjectSchema};
use crate::types::{Handle, Vector2};
use crate::value::{FieldValue, RefId};

/// Serialize a document as ASCII DXF.
pub fn write_dxf(doc: &mut Document) -> Result<Vec<u8>> {
    doc.refresh_refs();
    let mut writer = DxfWriter {
        doc,
        sink: TextPairWriter::new(),
    };
    writer.run()?;
    Ok(writer.sink.into_inner())
}

/// Serialize a document as binary DXF.
pub fn write_dxf_binary(doc: &mut Document) -> Result<Vec<u8>> {
    doc.refresh_refs();
    let mut writer = DxfWriter {
        doc,
        sink: BinaryPairWriter::new(),
    };
    writer.run()?;
    Ok(writer.sink.into_inner())
}

/// Line-oriented ASCII pair framing.
pub struct TextPairWriter {
    out: Vec<u8>,
}

impl TextPairWriter {
    pub fn new() -> Self {
        Self { out: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }
}

impl Default for TextPairWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PairSink for TextPairWriter {
    fn write_pair(&mut self, pair: &CodePair) -> Result<()> {
        writeln!(self.out, "{:>3}", pair.code)?;
        match &pair.value {
            PairValue::Str(s) => writeln!(self.out, "{s}")?,
            PairValue::F64(v) => writeln!(self.out, "{v:?}")?,
            PairValue::I16(v) => writeln!(self.out, "{v:>6}")?,
            PairValue::I32(v) => writeln!(self.out, "{v:>9}")?,
            PairValue::I64(v) => writeln!(self.out, "{v}")?,
            PairValue::Bool(v) => writeln!(self.out, "{:>6}", *v as u8)?,
            PairValue::Handle(v) => writeln!(self.out, "{v:X}")?,
            PairValue::Bytes(b) => {
                for byte in b {
                    write!(self.out, "{byte:02X}")?;
                }
                writeln!(self.out)?;
            }
        }
        Ok(())
    }
}

/// Sentinel-prefixed binary pair framing.
pub struct BinaryPairWriter {
    out: Vec<u8>,
}

impl BinaryPairWriter {
    pub fn new() -> Self {
        Self {
            out: BINARY_SENTINEL.to_vec(),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }
}

impl Default for BinaryPairWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PairSink for BinaryPairWriter {
    fn write_pair(&mut self, pair: &CodePair) -> Result<()> {
        self.out.extend_from_slice(&(pair.code as u16).to_le_bytes());
        match &pair.value {
            PairValue::Str(s) => {
                self.out.extend_from_slice(s.as_bytes());
                self.out.push(0);
            }
            PairValue::F64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PairValue::I16(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PairValue::I32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PairValue::I64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PairValue::Bool(v) => self.out.push(*v as u8),
            PairValue::Handle(v) => {
                // handles stay hex text in the binary framing
                self.out.extend_from_slice(format!("{v:X}").as_bytes());
                self.out.push(0);
            }
            PairValue::Bytes(b) => {
                self.out.push(b.len().min(255) as u8);
                self.out.extend_from_slice(&b[..b.len().min(255)]);
            }
        }
        Ok(())
    }
}

/// Build a pair whose value variant matches the code's classification,
/// coercing from a plain integer.
fn int_pair(code: i16, v: i64) -> CodePair {
    let value = match code_kind(code) {
        CodeKind::I16 => PairValue::I16(v as i16),
        CodeKind::I32 => PairValue::I32(v as i32),
        CodeKind::I64 => PairValue::I64(v),
        CodeKind::Bool => PairValue::Bool(v != 0),
        CodeKind::F64 => PairValue::F64(v as f64),
        CodeKind::Handle => PairValue::Handle(v as u64),
        CodeKind::Str => PairValue::Str(v.to_string()),
        CodeKind::Bytes => PairValue::Bytes(Vec::new()),
    };
    CodePair::new(code, value)
}

fn f64_pair(code: i16, v: f64) -> CodePair {
    CodePair::new(code, PairValue::F64(v))
}

fn handle_pair(code: i16, h: Handle) -> CodePair {
    CodePair::new(code, PairValue::Handle(h.value()))
}

/// The largest byte chunk one `310` pair carries.
const CHUNK: usize = 127;

struct DxfWriter<'d, S: PairSink> {
    doc: &'d Document,
    sink: S,
}

impl<'d, S: PairSink> DxfWriter<'d, S> {
    fn pair(&mut self, pair: CodePair) -> Result<()> {
        self.sink.write_pair(&pair)
    }

    fn marker(&mut self, name: &str) -> Result<()> {
        self.pair(CodePair::str(0, name))
    }

    fn section(&mut self, name: &str) -> Result<()> {
        self.marker("SECTION")?;
        self.pair(CodePair::str(2, name))
    }

    fn endsec(&mut self) -> Result<()> {
        self.marker("ENDSEC")
    }

    fn run(&mut self) -> Result<()> {
        self.header()?;
        self.thumbnail()?;
        self.classes()?;
        self.tables()?;
        self.blocks()?;
        self.entities()?;
        self.objects()?;
        self.marker("EOF")
    }

    // ---- reference plumbing -------------------------------------------

    /// Cached resolution; the caller refreshed the reference vector
    /// before the write started.
    fn target(&self, id: RefId) -> Option<usize> {
        self.doc.refs.get(id.0)?.resolved
    }

    fn target_name(&self, id: RefId) -> Option<&str> {
        self.doc.object(self.target(id)?)?.record_name()
    }

    fn target_handle(&self, id: RefId) -> Handle {
        self.doc.ref_handle(id).unwrap_or(Handle::NULL)
    }

    /// Entities directly owned by a block header, writer-side.
    fn owned_entities(&self, header: usize) -> Vec<usize> {
        let obj = &self.doc.objects()[header];
        if let Some(FieldValue::List(items)) = obj.fields.get("entity_handles") {
            let out: Vec<usize> = items
                .iter()
                .filter_map(FieldValue::as_ref_id)
                .filter_map(|id| self.target(id))
                .collect();
            // an empty or fully dangling handle vector says nothing;
            // fall through to the chain or the owner scan
            if !out.is_empty() {
                return out;
            }
        }
        if let Some(first) = obj.fields.ref_id("first_entity") {
            let mut out = Vec::new();
            let mut cursor = self.target(first);
            while let Some(i) = cursor {
                if out.contains(&i) {
                    break;
                }
                out.push(i);
                cursor = self
                    .doc
                    .object(i)
                    .and_then(|o| o.entity())
                    .and_then(|e| e.next_entity)
                    .and_then(|id| self.target(id));
            }
            if !out.is_empty() {
                return out;
            }
        }
        let handle = obj.handle;
        self.doc
            .objects()
            .iter()
            .enumerate()
            .filter(|(_, o)| {
                o.supertype == Supertype::Entity
                    && !o.is_freed()
                    && !matches!(
                        o.fixedtype,
                        FixedType::Block | FixedType::Endblk | FixedType::Vertex2D | FixedType::Seqend
                    )
            })
            .filter(|(_, o)| {
                o.common
                    .owner()
                    .map(|id| self.target_handle(id))
                    .is_some_and(|h| h == handle)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Child entities owned by a polyline or insert.
    fn run_children(&self, parent: usize, child: FixedType) -> Vec<usize> {
        let obj = &self.doc.objects()[parent];
        if let Some(FieldValue::List(items)) = obj.fields.get("vertex_handles") {
            return items
                .iter()
                .filter_map(FieldValue::as_ref_id)
                .filter_map(|id| self.target(id))
                .collect();
        }
        if let Some(first) = obj.fields.ref_id("first_vertex") {
            let mut out = Vec::new();
            let mut cursor = self.target(first);
            while let Some(i) = cursor {
                if out.contains(&i) {
                    break;
                }
                out.push(i);
                cursor = self
                    .doc
                    .object(i)
                    .and_then(|o| o.entity())
                    .and_then(|e| e.next_entity)
                    .and_then(|id| self.target(id));
            }
            return out;
        }
        let handle = obj.handle;
        self.doc
            .objects()
            .iter()
            .enumerate()
            .filter(|(_, o)| o.fixedtype == child && !o.is_freed())
            .filter(|(_, o)| {
                o.common
                    .owner()
                    .map(|id| self.target_handle(id))
                    .is_some_and(|h| h == handle)
            })
            .map(|(i, _)| i)
            .collect()
    }

    // ---- HEADER -------------------------------------------------------

    fn header(&mut self) -> Result<()> {
        self.section("HEADER")?;
        self.pair(CodePair::str(9, "$ACADVER"))?;
        self.pair(CodePair::str(1, self.doc.version.as_str()))?;
        self.pair(CodePair::str(9, "$HANDSEED"))?;
        self.pair(handle_pair(5, self.doc.handle_seed()))?;
        for d in HEADER_FIELDS {
            if d.dxf == 0 || d.name == "HANDSEED" || !d.in_version(self.doc.version) {
                continue;
            }
            let Some(value) = self.doc.header.fields.get(d.name) else {
                continue;
            };
            let pairs = self.scalar_pairs(d, value);
            if pairs.is_empty() {
                continue;
            }
            self.pair(CodePair::str(9, format!("${}", d.name)))?;
            for p in pairs {
                self.pair(p)?;
            }
        }
        self.endsec()
    }

    // ---- THUMBNAILIMAGE -----------------------------------------------

    fn thumbnail(&mut self) -> Result<()> {
        let Some(image) = self.doc.thumbnail.clone() else {
            return Ok(());
        };
        self.section("THUMBNAILIMAGE")?;
        self.pair(int_pair(90, image.len() as i64))?;
        for chunk in image.chunks(CHUNK) {
            self.pair(CodePair::new(310, PairValue::Bytes(chunk.to_vec())))?;
        }
        self.endsec()
    }

    // ---- CLASSES ------------------------------------------------------

    fn classes(&mut self) -> Result<()> {
        if self.doc.classes.is_empty() {
            return Ok(());
        }
        self.section("CLASSES")?;
        let classes: Vec<_> = self.doc.classes.iter().cloned().collect();
        for class in classes {
            self.marker("CLASS")?;
            self.pair(CodePair::str(1, class.dxf_name))?;
            self.pair(CodePair::str(2, class.cpp_name))?;
            self.pair(CodePair::str(3, class.app_name))?;
            self.pair(int_pair(90, class.proxy_flags as i64))?;
            self.pair(int_pair(280, class.was_proxy as i64))?;
            self.pair(int_pair(281, class.is_entity as i64))?;
        }
        self.endsec()
    }

    // ---- TABLES -------------------------------------------------------

    fn tables(&mut self) -> Result<()> {
        self.section("TABLES")?;
        for (name, kind) in [
            ("LTYPE", TableKind::LType),
            ("LAYER", TableKind::Layer),
            ("STYLE", TableKind::Style),
            ("APPID", TableKind::AppId),
            ("DIMSTYLE", TableKind::DimStyle),
            ("BLOCK_RECORD", TableKind::Block),
        ] {
            self.table(name, kind)?;
        }
        self.endsec()
    }

    /// Dedicated control slots followed by the entry list, in stored
    /// order.
    fn table_members(&self, control: usize) -> Vec<usize> {
        let ctl = &self.doc.objects()[control];
        let mut members = Vec::new();
        for slot in ["model_space", "paper_space", "bylayer", "byblock"] {
            if let Some(i) = ctl.fields.ref_id(slot).and_then(|id| self.target(id)) {
                members.push(i);
            }
        }
        if let Some(FieldValue::List(items)) = ctl.fields.get("entries") {
            for i in items
                .iter()
                .filter_map(FieldValue::as_ref_id)
                .filter_map(|id| self.target(id))
            {
                if !members.contains(&i) {
                    members.push(i);
                }
            }
        }
        members
    }

    fn table(&mut self, name: &str, kind: TableKind) -> Result<()> {
        let Some(control) = self.doc.control_index(kind) else {
            return Ok(());
        };
        let members = self.table_members(control);
        self.marker("TABLE")?;
        self.pair(CodePair::str(2, name))?;
        self.pair(handle_pair(5, self.doc.objects()[control].handle))?;
        self.pair(CodePair::str(100, "AcDbSymbolTable"))?;
        self.pair(int_pair(70, members.len() as i64))?;
        for i in members {
            self.table_record(i)?;
        }
        self.marker("ENDTAB")
    }

    fn table_record(&mut self, index: usize) -> Result<()> {
        let obj = &self.doc.objects()[index];
        let Some(schema) = schema::schema_for_fixedtype(obj.fixedtype) else {
            return Ok(());
        };
        self.marker(schema.dxf_name)?;
        self.pair(handle_pair(5, obj.handle))?;
        self.object_prefix(index)?;
        self.pair(CodePair::str(100, "AcDbSymbolTableRecord"))?;
        if !schema.subclass.is_empty() {
            self.pair(CodePair::str(100, schema.subclass))?;
        }
        self.fields(index, schema)?;
        self.eed_chain(index)
    }

    // ---- BLOCKS -------------------------------------------------------

    fn blocks(&mut self) -> Result<()> {
        self.section("BLOCKS")?;
        let ms = self.doc.model_space_index();
        let ps = self.doc.paper_space_index();
        let mut headers: Vec<usize> = Vec::new();
        headers.extend(ms);
        headers.extend(ps);
        for i in self.doc.indexes_of_type(FixedType::BlockHeader) {
            if !headers.contains(&i) {
                headers.push(i);
            }
        }
        for header in headers {
            // space-block contents go to the ENTITIES section
            let is_space = Some(header) == ms || Some(header) == ps;
            self.block(header, !is_space)?;
        }
        self.endsec()
    }

    fn block(&mut self, header: usize, with_entities: bool) -> Result<()> {
        let obj = &self.doc.objects()[header];
        let header_handle = obj.handle;
        let name = obj.record_name().unwrap_or("*U").to_string();
        let flag = obj.fields.int("flag").unwrap_or(0);
        let base = obj
            .fields
            .get("base_pt")
            .and_then(FieldValue::as_point3)
            .unwrap_or_default();
        let xref = obj.fields.text("xref_path").map(str::to_string);
        let begin = obj.fields.ref_id("block_entity").and_then(|id| self.target(id));
        let end = obj.fields.ref_id("endblk_entity").and_then(|id| self.target(id));
        let begin_handle = begin.map_or(Handle::NULL, |i| self.doc.objects()[i].handle);
        let end_handle = end.map_or(Handle::NULL, |i| self.doc.objects()[i].handle);
        let layer = begin
            .and_then(|i| self.doc.objects()[i].entity())
            .and_then(|e| e.layer)
            .and_then(|id| self.target_name(id))
            .unwrap_or("0")
            .to_string();

        self.marker("BLOCK")?;
        self.pair(handle_pair(5, begin_handle))?;
        self.pair(handle_pair(330, header_handle))?;
        self.pair(CodePair::str(100, "AcDbEntity"))?;
        self.pair(CodePair::str(8, layer.clone()))?;
        self.pair(CodePair::str(100, "AcDbBlockBegin"))?;
        self.pair(CodePair::str(2, name.clone()))?;
        self.pair(int_pair(70, flag))?;
        self.pair(f64_pair(10, base.x))?;
        self.pair(f64_pair(20, base.y))?;
        self.pair(f64_pair(30, base.z))?;
        self.pair(CodePair::str(3, name))?;
        if let Some(path) = xref {
            self.pair(CodePair::str(1, path))?;
        }
        if with_entities {
            for i in self.owned_entities(header) {
                self.entity(i)?;
            }
        }
        self.marker("ENDBLK")?;
        self.pair(handle_pair(5, end_handle))?;
        self.pair(handle_pair(330, header_handle))?;
        self.pair(CodePair::str(100, "AcDbEntity"))?;
        self.pair(CodePair::str(8, layer))?;
        self.pair(CodePair::str(100, "AcDbBlockEnd"))?;
        Ok(())
    }

    // ---- ENTITIES -----------------------------------------------------

    fn entities(&mut self) -> Result<()> {
        self.section("ENTITIES")?;
        let spaces: Vec<usize> = self
            .doc
            .model_space_index()
            .into_iter()
            .chain(self.doc.paper_space_index())
            .collect();
        for header in spaces {
            for i in self.owned_entities(header) {
                self.entity(i)?;
            }
        }
        self.endsec()
    }

    /// One entity plus its owned run (vertices/attribs and SEQEND).
    fn entity(&mut self, index: usize) -> Result<()> {
        let obj = &self.doc.objects()[index];
        if obj.supertype != Supertype::Entity || obj.is_freed() {
            return Ok(());
        }
        let fixedtype = obj.fixedtype;
        if matches!(fixedtype, FixedType::UnknownEntity) {
            let dxf_name = obj.dxf_name.clone();
            let handle = obj.handle;
            self.marker(&dxf_name)?;
            self.pair(handle_pair(5, handle))?;
            return Ok(());
        }
        let Some(schema) = schema::schema_for_fixedtype(fixedtype) else {
            return Ok(());
        };
        self.marker(schema.dxf_name)?;
        self.entity_prefix(index, schema)?;
        self.fields(index, schema)?;
        self.eed_chain(index)?;

        match fixedtype {
            FixedType::Polyline2D => {
                for child in self.run_children(index, FixedType::Vertex2D) {
                    self.entity(child)?;
                }
                self.seqend(index)?;
            }
            FixedType::Insert => {
                let children = self.run_children(index, FixedType::Attrib);
                if !children.is_empty() {
                    for child in children {
                        self.entity(child)?;
                    }
                    self.seqend(index)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn seqend(&mut self, parent: usize) -> Result<()> {
        let parent_obj = &self.doc.objects()[parent];
        let parent_handle = parent_obj.handle;
        let seqend = parent_obj
            .fields
            .ref_id("seqend")
            .and_then(|id| self.target(id));
        let handle = seqend.map_or(Handle::NULL, |i| self.doc.objects()[i].handle);
        self.marker("SEQEND")?;
        self.pair(handle_pair(5, handle))?;
        self.pair(handle_pair(330, parent_handle))?;
        self.pair(CodePair::str(100, "AcDbEntity"))?;
        Ok(())
    }

    fn entity_prefix(&mut self, index: usize, schema: &'static ObjectSchema) -> Result<()> {
        let obj = &self.doc.objects()[index];
        let handle = obj.handle;
        let Some(e) = obj.entity() else {
            return Ok(());
        };
        let owner = obj.common.owner().map(|id| self.target_handle(id));
        let reactors: Vec<Handle> = obj
            .common
            .reactors()
            .iter()
            .map(|&id| self.target_handle(id))
            .collect();
        let xdict = obj.common.xdict().map(|id| self.target_handle(id));
        let layer = e
            .layer
            .and_then(|id| self.target_name(id))
            .unwrap_or("0")
            .to_string();
        let ltype = e.linetype.and_then(|id| self.target_name(id)).map(str::to_string);
        let color = e.color.clone();
        let ltscale = e.linetype_scale;
        let invisible = e.invisible;
        let paper = e.paper_space;

        self.pair(handle_pair(5, handle))?;
        self.groups(reactors, xdict)?;
        if let Some(owner) = owner {
            self.pair(handle_pair(330, owner))?;
        }
        self.pair(CodePair::str(100, "AcDbEntity"))?;
        if paper {
            self.pair(int_pair(67, 1))?;
        }
        self.pair(CodePair::str(8, layer))?;
        if let Some(name) = ltype {
            self.pair(CodePair::str(6, name))?;
        }
        if !color.is_by_layer() {
            self.pair(int_pair(62, color.index as i64))?;
        }
        if let Some(rgb) = color.rgb {
            self.pair(int_pair(420, rgb as i64))?;
        }
        if ltscale != 1.0 {
            self.pair(f64_pair(48, ltscale))?;
        }
        if invisible {
            self.pair(int_pair(60, 1))?;
        }
        if !schema.subclass.is_empty() {
            self.pair(CodePair::str(100, schema.subclass))?;
        }
        Ok(())
    }

    /// Owner handle and the reactor/xdict groups for non-entities.
    fn object_prefix(&mut self, index: usize) -> Result<()> {
        let obj = &self.doc.objects()[index];
        let owner = obj.common.owner().map(|id| self.target_handle(id));
        let reactors: Vec<Handle> = obj
            .common
            .reactors()
            .iter()
            .map(|&id| self.target_handle(id))
            .collect();
        let xdict = obj.common.xdict().map(|id| self.target_handle(id));
        self.groups(reactors, xdict)?;
        if let Some(owner) = owner {
            self.pair(handle_pair(330, owner))?;
        }
        Ok(())
    }

    fn groups(&mut self, reactors: Vec<Handle>, xdict: Option<Handle>) -> Result<()> {
        if !reactors.is_empty() {
            self.pair(CodePair::str(102, "{ACAD_REACTORS"))?;
            for h in reactors {
                self.pair(handle_pair(330, h))?;
            }
            self.pair(CodePair::str(102, "}"))?;
        }
        if let Some(h) = xdict {
            self.pair(CodePair::str(102, "{ACAD_XDICTIONARY"))?;
            self.pair(handle_pair(360, h))?;
            self.pair(CodePair::str(102, "}"))?;
        }
        Ok(())
    }

    // ---- OBJECTS ------------------------------------------------------

    fn objects(&mut self) -> Result<()> {
        self.section("OBJECTS")?;
        for index in 0..self.doc.len() {
            let obj = &self.doc.objects()[index];
            if obj.supertype != Supertype::Object
                || obj.is_freed()
                || obj.fixedtype.is_control()
                || obj.fixedtype.table_kind().is_some()
            {
                continue;
            }
            if obj.fixedtype == FixedType::UnknownObject {
                let dxf_name = obj.dxf_name.clone();
                let handle = obj.handle;
                self.marker(&dxf_name)?;
                self.pair(handle_pair(5, handle))?;
                continue;
            }
            let Some(schema) = schema::schema_for_fixedtype(obj.fixedtype) else {
                continue;
            };
            let handle = obj.handle;
            self.marker(schema.dxf_name)?;
            self.pair(handle_pair(5, handle))?;
            self.object_prefix(index)?;
            if !schema.subclass.is_empty() {
                self.pair(CodePair::str(100, schema.subclass))?;
            }
            self.fields(index, schema)?;
            self.eed_chain(index)?;
        }
        self.endsec()
    }

    // ---- schema-driven field emission ---------------------------------

    fn fields(&mut self, index: usize, schema: &'static ObjectSchema) -> Result<()> {
        let is_hatch = self.doc.objects()[index].fixedtype == FixedType::Hatch;
        for d in schema.fields_for(self.doc.version) {
            if d.dxf == 0 {
                continue;
            }
            if is_hatch && d.name == "num_paths" {
                self.hatch_paths(index)?;
                continue;
            }
            let Some(value) = self.doc.objects()[index].fields.get(d.name).cloned() else {
                continue;
            };
            match value {
                FieldValue::List(items) => {
                    for item in items {
                        for p in self.scalar_pairs(d, &item) {
                            self.pair(p)?;
                        }
                    }
                }
                other => {
                    for p in self.scalar_pairs(d, &other) {
                        self.pair(p)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The pair(s) one scalar field value becomes. Points fan out to one
    /// pair per coordinate; byte blobs to length-capped chunks.
    fn scalar_pairs(&self, d: &'static FieldDescriptor, value: &FieldValue) -> Vec<CodePair> {
        match value {
            FieldValue::Bool(b) => vec![int_pair(d.dxf, *b as i64)],
            FieldValue::Int(v) => vec![int_pair(d.dxf, *v)],
            FieldValue::Double(v) => vec![f64_pair(d.dxf, *v)],
            FieldValue::Text(s) => vec![CodePair::str(d.dxf, s.clone())],
            FieldValue::Point2(p) => vec![f64_pair(d.dxf, p.x), f64_pair(d.dxf + 10, p.y)],
            FieldValue::Point3(p) => vec![
                f64_pair(d.dxf, p.x),
                f64_pair(d.dxf + 10, p.y),
                f64_pair(d.dxf + 20, p.z),
            ],
            FieldValue::Color(c) => {
                let mut out = vec![int_pair(d.dxf, c.index as i64)];
                if let Some(rgb) = c.rgb {
                    out.push(int_pair(420, rgb as i64));
                }
                out
            }
            FieldValue::Bytes(b) => b
                .chunks(CHUNK)
                .map(|chunk| CodePair::new(d.dxf, PairValue::Bytes(chunk.to_vec())))
                .collect(),
            FieldValue::Ref(id) => {
                if d.table.is_some() {
                    match self.target_name(*id) {
                        Some(name) => vec![CodePair::str(d.dxf, name.to_string())],
                        None => Vec::new(),
                    }
                } else {
                    vec![handle_pair(d.dxf, self.target_handle(*id))]
                }
            }
            FieldValue::List(_) => Vec::new(),
        }
    }

    fn hatch_paths(&mut self, index: usize) -> Result<()> {
        let paths = match self.doc.objects()[index].fields.get("paths") {
            Some(FieldValue::List(items)) => items.clone(),
            _ => Vec::new(),
        };
        self.pair(int_pair(91, paths.len() as i64))?;
        for path in &paths {
            let Some(parts) = path.as_list() else { continue };
            let flag = parts.first().and_then(FieldValue::as_int).unwrap_or(0);
            let verts: Vec<Vector2> = parts
                .get(1)
                .and_then(FieldValue::as_list)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| match v {
                            FieldValue::Point2(p) => Some(*p),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            let bulges: Vec<f64> = parts
                .get(2)
                .and_then(FieldValue::as_list)
                .map(|items| items.iter().filter_map(FieldValue::as_double).collect())
                .unwrap_or_default();
            self.pair(int_pair(92, flag))?;
            self.pair(int_pair(93, verts.len() as i64))?;
            for (i, v) in verts.iter().enumerate() {
                self.pair(f64_pair(10, v.x))?;
                self.pair(f64_pair(20, v.y))?;
                if let Some(&b) = bulges.get(i) {
                    self.pair(f64_pair(42, b))?;
                }
            }
        }
        Ok(())
    }

    // ---- extended data ------------------------------------------------

    fn eed_chain(&mut self, index: usize) -> Result<()> {
        let chain: Vec<Eed> = self.doc.objects()[index].common.eed().to_vec();
        for eed in chain {
            let app = self.target_name(eed.app).unwrap_or("ACAD").to_string();
            self.pair(CodePair::str(1001, app))?;
            for value in &eed.values {
                match value {
                    EedValue::String(s) => self.pair(CodePair::str(1000, s.clone()))?,
                    EedValue::ControlMarker(close) => {
                        self.pair(CodePair::str(1002, if *close { "}" } else { "{" }))?
                    }
                    EedValue::Binary(b) => {
                        self.pair(CodePair::new(1004, PairValue::Bytes(b.clone())))?
                    }
                    EedValue::Handle(h) => self.pair(handle_pair(1005, *h))?,
                    EedValue::Point(p) => {
                        self.pair(f64_pair(1010, p.x))?;
                        self.pair(f64_pair(1020, p.y))?;
                        self.pair(f64_pair(1030, p.z))?;
                    }
                    EedValue::Real(v) => self.pair(f64_pair(1040, *v))?,
                    EedValue::Short(v) => self.pair(int_pair(1070, *v as i64))?,
                    EedValue::Long(v) => self.pair(int_pair(1071, *v as i64))?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dxf::reader::read_dxf;
    use crate::types::{DwgVersion, Vector3};

    fn reread(doc: &mut Document) -> Document {
        let bytes = write_dxf(doc).expect("write");
        read_dxf(&bytes).expect("reread")
    }

    #[test]
    fn test_fresh_document_round_trip() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let out = reread(&mut doc);
        assert_eq!(out.version, DwgVersion::AC1018);
        assert!(out.model_space_index().is_some());
        assert!(out.find_table_record(TableKind::Layer, "0").is_some());
        assert!(out.find_table_record(TableKind::LType, "ByLayer").is_some());
        assert!(out.find_table_record(TableKind::AppId, "ACAD").is_some());
    }

    #[test]
    fn test_entity_round_trip() {
        let src = "  0\nSECTION\n  2\nHEADER\n  9\n$ACADVER\n  1\nAC1015\n  0\nENDSEC\n  0\nSECTION\n  2\nENTITIES\n  0\nLINE\n  8\nWALLS\n 62\n3\n 10\n1.0\n 20\n2.0\n 30\n3.0\n 11\n4.0\n 21\n5.0\n 31\n6.0\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = read_dxf(src.as_bytes()).unwrap();
        let mut out = reread(&mut doc);
        let lines = out.indexes_of_type(FixedType::Line);
        assert_eq!(lines.len(), 1);
        let line = &out.objects()[lines[0]];
        assert_eq!(
            line.fields.get("start").unwrap().as_point3().unwrap(),
            Vector3::new(1.0, 2.0, 3.0)
        );
        assert_eq!(line.entity().unwrap().color.index, 3);
        let layer_id = line.entity().unwrap().layer.unwrap();
        let i = out.resolve_silent(layer_id).unwrap();
        assert_eq!(out.objects()[i].record_name(), Some("WALLS"));
    }

    #[test]
    fn test_binary_round_trip() {
        let mut doc = Document::new(DwgVersion::AC1021);
        let bytes = write_dxf_binary(&mut doc).unwrap();
        assert!(crate::dxf::binary_reader::BinaryPairReader::detect(&bytes));
        let out = read_dxf(&bytes).unwrap();
        assert_eq!(out.version, DwgVersion::AC1021);
        assert!(out.model_space_index().is_some());
    }

    #[test]
    fn test_hatch_paths_round_trip() {
        let src = "  0\nSECTION\n  2\nENTITIES\n  0\nHATCH\n  2\nANSI31\n 70\n0\n 71\n0\n 91\n1\n 92\n2\n 93\n2\n 10\n0.0\n 20\n0.0\n 10\n1.0\n 20\n0.0\n 42\n0.5\n 75\n0\n 76\n1\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = read_dxf(src.as_bytes()).unwrap();
        let out = reread(&mut doc);
        let i = out
            .objects()
            .iter()
            .position(|o| o.fixedtype == FixedType::Hatch)
            .unwrap();
        let hatch = &out.objects()[i];
        assert_eq!(hatch.fields.int("num_paths"), Some(1));
        let paths = hatch.fields.get("paths").and_then(FieldValue::as_list).unwrap();
        let parts = paths[0].as_list().unwrap();
        assert_eq!(parts[0], FieldValue::Int(2));
        assert_eq!(parts[1].as_list().unwrap().len(), 2);
        assert_eq!(
            parts[2].as_list().unwrap(),
            &[FieldValue::Double(0.0), FieldValue::Double(0.5)]
        );
    }

    #[test]
    fn test_block_round_trip() {
        let src = "  0\nSECTION\n  2\nBLOCKS\n  0\nBLOCK\n  2\nDOOR\n 70\n0\n 10\n0.0\n 20\n0.0\n 30\n0.0\n  0\nCIRCLE\n 10\n0.5\n 20\n0.5\n 30\n0.0\n 40\n0.25\n  0\nENDBLK\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = read_dxf(src.as_bytes()).unwrap();
        let mut out = reread(&mut doc);
        let hdr = out.find_table_record(TableKind::Block, "DOOR").unwrap();
        let owned = out.block_entities(hdr);
        assert_eq!(owned.len(), 1);
        assert_eq!(out.objects()[owned[0]].fixedtype, FixedType::Circle);
    }

    #[test]
    fn test_eed_round_trip() {
        let src = "  0\nSECTION\n  2\nENTITIES\n  0\nCIRCLE\n 10\n0.0\n 20\n0.0\n 30\n0.0\n 40\n1.0\n1001\nACAD\n1000\nhello\n1070\n42\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = read_dxf(src.as_bytes()).unwrap();
        let out = reread(&mut doc);
        let i = out
            .objects()
            .iter()
            .position(|o| o.fixedtype == FixedType::Circle)
            .unwrap();
        let eed = out.objects()[i].common.eed();
        assert_eq!(eed.len(), 1);
        assert_eq!(
            eed[0].values,
            vec![EedValue::String("hello".into()), EedValue::Short(42)]
        );
    }

    #[test]
    fn test_xrecord_round_trip() {
        let src = "  0\nSECTION\n  2\nOBJECTS\n  0\nXRECORD\n  5\n65\n280\n1\n310\nDEADBEEF\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = read_dxf(src.as_bytes()).unwrap();
        let out = reread(&mut doc);
        let i = out
            .objects()
            .iter()
            .position(|o| o.fixedtype == FixedType::XRecord)
            .unwrap();
        assert_eq!(
            out.objects()[i].fields.get("data"),
            Some(&FieldValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]))
        );
    }

    #[test]
    fn test_text_framing_shapes() {
        let mut w = TextPairWriter::new();
        w.write_pair(&CodePair::str(0, "SECTION")).unwrap();
        w.write_pair(&f64_pair(40, 1.0)).unwrap();
        w.write_pair(&int_pair(70, 3)).unwrap();
        w.write_pair(&handle_pair(5, Handle::new(0x2A))).unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        assert_eq!(text, "  0\nSECTION\n 40\n1.0\n 70\n     3\n  5\n2A\n");
    }
}
