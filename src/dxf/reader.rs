//! DXF ingestion.
//!
//! The reader walks the `(code, value)` pair stream section by section
//! and populates a [`Document`]. Type-specific pairs are matched against
//! the same field schemas the binary codec uses, so the two front-ends
//! can never drift apart on what a field means.
//!
//! Symbolic names (layer, linetype, style, block) are turned into
//! references immediately; names that precede their table record are
//! parked on the deferred queue and drained by postprocessing under the
//! configured [`NameResolution`] policy.

use std::path::Path;

use crate::document::Document;
use crate::dxf::binary_reader::BinaryPairReader;
use crate::dxf::code_pair::{CodePair, PairSource};
use crate::dxf::text_reader::TextPairReader;
use crate::engine::hatch::make_path;
use crate::error::{DwgError, ErrorFlags, Result};
use crate::header::header_field;
use crate::notification::Severity;
use crate::object::{CadObject, Eed, EedValue, FixedType, Supertype, TableKind};
use crate::postprocess::postprocess;
use crate::resolver::NameResolution;
use crate::schema::{self, FieldDescriptor, ObjectSchema, Repeat, WireType};
use crate::types::{Color, DwgVersion, Handle, Vector2, Vector3};
use crate::value::FieldValue;

/// Knobs for a DXF read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// What to do with symbolic names that match no table record.
    pub names: NameResolution,
}

/// Read a DXF document from a full file image, auto-detecting the
/// binary variant by its sentinel.
pub fn read_dxf(data: &[u8]) -> Result<Document> {
    read_dxf_with(data, ReadOptions::default())
}

/// [`read_dxf`] with explicit options.
pub fn read_dxf_with(data: &[u8], options: ReadOptions) -> Result<Document> {
    if BinaryPairReader::detect(data) {
        DxfReader::new(BinaryPairReader::new(data.to_vec())?, options).run()
    } else {
        DxfReader::new(TextPairReader::new(data), options).run()
    }
}

/// Read a DXF document from a file on disk.
pub fn read_dxf_file(path: impl AsRef<Path>) -> Result<Document> {
    read_dxf(&std::fs::read(path)?)
}

/// Which `102 {...}` group the pair cursor is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupCtx {
    None,
    Reactors,
    XDict,
    /// An application group we do not model; members are dropped.
    Foreign,
}

/// A point field whose coordinates are still arriving.
struct PendingPoint {
    field: &'static str,
    base: i16,
    is_3d: bool,
    list: bool,
}

/// A HATCH boundary path under construction.
#[derive(Default)]
struct PathState {
    flag: i64,
    verts: Vec<Vector2>,
    bulges: Vec<f64>,
    pending_x: Option<f64>,
}

/// Per-object accumulation that spans multiple pairs.
#[derive(Default)]
struct ObjectState {
    point: Option<PendingPoint>,
    group: Option<GroupCtx>,
    eed: Option<Eed>,
    hatch_paths: Vec<FieldValue>,
    hatch_cur: Option<PathState>,
}

impl ObjectState {
    fn new() -> Self {
        Self::default()
    }

    fn group(&self) -> GroupCtx {
        self.group.unwrap_or(GroupCtx::None)
    }
}

struct DxfReader<S: PairSource> {
    source: S,
    peeked: Option<CodePair>,
    doc: Document,
    options: ReadOptions,
}

impl<S: PairSource> DxfReader<S> {
    fn new(source: S, options: ReadOptions) -> Self {
        Self {
            source,
            peeked: None,
            doc: Document::empty(DwgVersion::default()),
            options,
        }
    }

    fn next(&mut self) -> Result<Option<CodePair>> {
        if let Some(p) = self.peeked.take() {
            return Ok(Some(p));
        }
        self.source.next_pair()
    }

    fn push_back(&mut self, pair: CodePair) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(pair);
    }

    fn run(mut self) -> Result<Document> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("EOF") {
                break;
            }
            if !pair.is_marker("SECTION") {
                self.warn(format!("stray pair ({}, ...) outside any section", pair.code));
                continue;
            }
            let Some(name) = self.next()?.filter(|p| p.code == 2) else {
                return Err(DwgError::Parse("SECTION without a name".into()));
            };
            match name.as_str().unwrap_or("") {
                "HEADER" => self.read_header()?,
                "CLASSES" => self.read_classes()?,
                "TABLES" => self.read_tables()?,
                "BLOCKS" => self.read_blocks()?,
                "ENTITIES" => self.read_entities()?,
                "OBJECTS" => self.read_objects()?,
                "THUMBNAILIMAGE" => self.read_thumbnail()?,
                other => {
                    self.doc.notifications.notify(
                        Severity::NotSupported,
                        format!("section {other} skipped"),
                    );
                    self.skip_section()?;
                }
            }
        }
        postprocess(&mut self.doc, self.options.names)?;
        Ok(self.doc)
    }

    fn warn(&mut self, message: String) {
        self.doc.notifications.notify(Severity::Warning, message);
    }

    fn skip_section(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
        }
        Err(DwgError::Parse("unterminated section".into()))
    }

    // ---- HEADER -------------------------------------------------------

    fn read_header(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if pair.code != 9 {
                self.warn(format!("header: unexpected group {}", pair.code));
                continue;
            }
            let var = pair
                .as_str()
                .map(|s| s.trim_start_matches('$').to_string())
                .unwrap_or_default();
            let values = self.collect_var_values()?;
            self.apply_header_var(&var, &values)?;
        }
        Err(DwgError::Parse("unterminated HEADER section".into()))
    }

    /// Value pairs belonging to one `9 $NAME`, up to the next variable
    /// or section end.
    fn collect_var_values(&mut self) -> Result<Vec<CodePair>> {
        let mut values = Vec::new();
        while let Some(pair) = self.next()? {
            if pair.code == 9 || pair.code == 0 {
                self.push_back(pair);
                break;
            }
            values.push(pair);
        }
        Ok(values)
    }

    fn apply_header_var(&mut self, var: &str, values: &[CodePair]) -> Result<()> {
        let Some(first) = values.first() else {
            self.warn(format!("header: ${var} carries no value"));
            return Ok(());
        };
        match var {
            "ACADVER" => {
                let code = first.as_str().unwrap_or("");
                self.doc.version = DwgVersion::from_str_code(code)?;
                return Ok(());
            }
            "HANDSEED" => {
                if let Some(h) = first.as_handle() {
                    self.doc.set_handle_seed(Handle::new(h));
                }
                return Ok(());
            }
            _ => {}
        }
        let Some(d) = header_field(var) else {
            self.warn(format!("header: unknown variable ${var} ignored"));
            return Ok(());
        };
        if !d.in_version(self.doc.version) {
            self.warn(format!("header: ${var} not valid for {}", self.doc.version));
            return Ok(());
        }
        let Some(value) = self.pair_to_value(d, first) else {
            self.warn(format!("header: ${var} has mismatched value type"));
            return Ok(());
        };
        self.doc.header.fields.set(d.name, value);
        Ok(())
    }

    // ---- CLASSES ------------------------------------------------------

    fn read_classes(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if !pair.is_marker("CLASS") {
                continue;
            }
            let mut class = crate::classes::DxfClass::default();
            while let Some(p) = self.next()? {
                if p.code == 0 {
                    self.push_back(p);
                    break;
                }
                match p.code {
                    1 => class.dxf_name = p.as_str().unwrap_or("").to_string(),
                    2 => class.cpp_name = p.as_str().unwrap_or("").to_string(),
                    3 => class.app_name = p.as_str().unwrap_or("").to_string(),
                    90 => class.proxy_flags = p.as_i64().unwrap_or(0) as i32,
                    280 => class.was_proxy = p.as_i64().unwrap_or(0) != 0,
                    281 => class.is_entity = p.as_i64().unwrap_or(0) != 0,
                    _ => {}
                }
            }
            if class.dxf_name.is_empty() {
                self.warn("CLASS record without a DXF name".into());
            } else {
                self.doc.classes.register(class);
            }
        }
        Err(DwgError::Parse("unterminated CLASSES section".into()))
    }

    // ---- TABLES -------------------------------------------------------

    fn read_tables(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if !pair.is_marker("TABLE") {
                continue;
            }
            let Some(name) = self.next()?.filter(|p| p.code == 2) else {
                return Err(DwgError::Parse("TABLE without a name".into()));
            };
            let table = name.as_str().unwrap_or("").to_string();
            match table_kind(&table) {
                Some(kind) => self.read_table(kind)?,
                None => {
                    self.doc.notifications.notify(
                        Severity::NotSupported,
                        format!("table {table} skipped"),
                    );
                    self.skip_to_endtab()?;
                }
            }
        }
        Err(DwgError::Parse("unterminated TABLES section".into()))
    }

    fn skip_to_endtab(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDTAB") {
                return Ok(());
            }
        }
        Err(DwgError::Parse("unterminated TABLE".into()))
    }

    fn read_table(&mut self, kind: TableKind) -> Result<()> {
        let mut control_handle = 0u64;
        // table-level pairs: control handle, declared entry count
        while let Some(pair) = self.next()? {
            if pair.code == 0 {
                self.push_back(pair);
                break;
            }
            match pair.code {
                5 | 105 => control_handle = pair.as_handle().unwrap_or(0),
                70 | 100 | 330 | 360 | 102 => {}
                other => self.warn(format!("table header: group {other} ignored")),
            }
        }
        let control = self.doc.ensure_control(kind, control_handle);
        let control_handle = self.doc.objects()[control].handle;

        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDTAB") {
                return Ok(());
            }
            let record = pair.as_str().unwrap_or("").to_string();
            let Some(schema) = schema::schema_for_dxf_name(&record)
                .filter(|s| s.fixedtype.table_kind() == Some(kind))
            else {
                self.warn(format!("table record {record} skipped"));
                self.skip_record()?;
                continue;
            };
            let mut obj = CadObject::new(schema.fixedtype, Supertype::Object, schema.dxf_name);
            let mut state = ObjectState::new();
            self.read_record_pairs(&mut obj, schema, &mut state)?;
            self.finish_object(&mut obj, schema, state);
            if obj.common.owner().is_none() {
                let owner = self.doc.add_absolute_ref(4, control_handle);
                obj.common.set_owner(Some(owner));
            }
            self.doc.add_object(obj);
        }
        Err(DwgError::Parse("unterminated TABLE".into()))
    }

    /// Consume pairs until the next `(0, ...)` without interpreting them.
    fn skip_record(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.code == 0 {
                self.push_back(pair);
                return Ok(());
            }
        }
        Ok(())
    }

    // ---- BLOCKS -------------------------------------------------------

    fn read_blocks(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if !pair.is_marker("BLOCK") {
                continue;
            }
            self.read_block()?;
        }
        Err(DwgError::Parse("unterminated BLOCKS section".into()))
    }

    fn read_block(&mut self) -> Result<()> {
        // the BLOCK begin entity carries the header record's name, flags
        // and base point; read with the header schema and split after
        let hdr_schema = schema::schema_for_fixedtype(FixedType::BlockHeader)
            .ok_or_else(|| DwgError::Custom("BLOCK_HEADER schema missing".into()))?;
        let mut begin = CadObject::new(FixedType::Block, Supertype::Entity, "BLOCK");
        let mut state = ObjectState::new();
        self.read_record_pairs(&mut begin, hdr_schema, &mut state)?;
        self.finish_object(&mut begin, hdr_schema, state);

        let name = begin
            .fields
            .text("name")
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.doc
                    .notifications
                    .notify(Severity::Warning, "BLOCK without a name");
                format!("*U{}", self.doc.len())
            });
        let control = self.doc.ensure_control(TableKind::Block, 0);
        let header = self
            .doc
            .ensure_table_record(TableKind::Block, &name, 0, control);
        for field in ["flag", "base_pt", "xref_path"] {
            let Some(d) = hdr_schema.field(field) else {
                continue;
            };
            if let Some(value) = begin.fields.remove(field) {
                if self.doc.objects()[header].fields.get(field).is_none() {
                    self.doc.objects_mut()[header].fields.set(d.name, value);
                }
            }
        }
        let header_handle = self.doc.objects()[header].handle;

        let owner = self.doc.add_absolute_ref(4, header_handle);
        begin.common.set_owner(Some(owner));
        let begin_idx = self.doc.add_object(begin);
        let begin_handle = self.doc.objects()[begin_idx].handle;
        let rid = self.doc.add_absolute_ref(3, begin_handle);
        self.doc.objects_mut()[header]
            .fields
            .set("block_entity", FieldValue::Ref(rid));

        // owned entities until ENDBLK
        loop {
            let Some(pair) = self.next()? else {
                return Err(DwgError::Parse("unterminated BLOCK".into()));
            };
            if pair.code != 0 {
                self.warn(format!("BLOCK body: stray group {}", pair.code));
                continue;
            }
            let record = pair.as_str().unwrap_or("").to_string();
            if record == "ENDBLK" {
                let mut end = CadObject::new(FixedType::Endblk, Supertype::Entity, "ENDBLK");
                let end_schema = schema::schema_for_fixedtype(FixedType::Endblk)
                    .ok_or_else(|| DwgError::Custom("ENDBLK schema missing".into()))?;
                let mut state = ObjectState::new();
                self.read_record_pairs(&mut end, end_schema, &mut state)?;
                self.finish_object(&mut end, end_schema, state);
                let owner = self.doc.add_absolute_ref(4, header_handle);
                end.common.set_owner(Some(owner));
                let end_idx = self.doc.add_object(end);
                let end_handle = self.doc.objects()[end_idx].handle;
                let rid = self.doc.add_absolute_ref(3, end_handle);
                self.doc.objects_mut()[header]
                    .fields
                    .set("endblk_entity", FieldValue::Ref(rid));
                return Ok(());
            }
            if let Some(i) = self.read_entity(&record)? {
                if self.doc.objects()[i].common.owner().is_none() {
                    let owner = self.doc.add_absolute_ref(4, header_handle);
                    self.doc.objects_mut()[i].common.set_owner(Some(owner));
                }
            }
        }
    }

    // ---- ENTITIES -----------------------------------------------------

    fn read_entities(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if pair.code != 0 {
                self.warn(format!("ENTITIES: stray group {}", pair.code));
                continue;
            }
            let record = pair.as_str().unwrap_or("").to_string();
            let Some(i) = self.read_entity(&record)? else {
                continue;
            };
            if self.doc.objects()[i].common.owner().is_some() {
                continue;
            }
            let paper = self.doc.objects()[i]
                .entity()
                .is_some_and(|e| e.paper_space);
            let space = if paper { "*Paper_Space" } else { "*Model_Space" };
            let control = self.doc.ensure_control(TableKind::Block, 0);
            let header = self
                .doc
                .ensure_table_record(TableKind::Block, space, 0, control);
            let handle = self.doc.objects()[header].handle;
            let owner = self.doc.add_absolute_ref(4, handle);
            self.doc.objects_mut()[i].common.set_owner(Some(owner));
        }
        Err(DwgError::Parse("unterminated ENTITIES section".into()))
    }

    /// Read one entity record. Unknown record names become placeholder
    /// entities carrying only their handle.
    fn read_entity(&mut self, record: &str) -> Result<Option<usize>> {
        let Some(schema) = schema::schema_for_dxf_name(record)
            .filter(|s| s.supertype == Supertype::Entity)
        else {
            return self.read_unknown(record, Supertype::Entity).map(Some);
        };
        let mut obj = CadObject::new(schema.fixedtype, Supertype::Entity, schema.dxf_name);
        let mut state = ObjectState::new();
        self.read_record_pairs(&mut obj, schema, &mut state)?;
        self.finish_object(&mut obj, schema, state);
        Ok(Some(self.doc.add_object(obj)))
    }

    fn read_unknown(&mut self, record: &str, supertype: Supertype) -> Result<usize> {
        self.doc.error_flags |= ErrorFlags::UNHANDLED_CLASS;
        self.doc.notifications.notify(
            Severity::NotImplemented,
            format!("no schema for {record}; kept as placeholder"),
        );
        let fixedtype = match supertype {
            Supertype::Entity => FixedType::UnknownEntity,
            Supertype::Object => FixedType::UnknownObject,
        };
        let mut obj = CadObject::new(fixedtype, supertype, record);
        while let Some(pair) = self.next()? {
            if pair.code == 0 {
                self.push_back(pair);
                break;
            }
            match pair.code {
                5 | 105 => {
                    if let Some(h) = pair.as_handle() {
                        obj.handle = Handle::new(h);
                    }
                }
                330 => {
                    if let Some(h) = pair.as_handle() {
                        let owner = self.doc.add_absolute_ref(4, Handle::new(h));
                        obj.common.set_owner(Some(owner));
                    }
                }
                _ => {}
            }
        }
        Ok(self.doc.add_object(obj))
    }

    // ---- OBJECTS ------------------------------------------------------

    fn read_objects(&mut self) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if pair.code != 0 {
                self.warn(format!("OBJECTS: stray group {}", pair.code));
                continue;
            }
            let record = pair.as_str().unwrap_or("").to_string();
            let Some(schema) = schema::schema_for_dxf_name(&record)
                .filter(|s| s.supertype == Supertype::Object && s.fixedtype.table_kind().is_none())
            else {
                self.read_unknown(&record, Supertype::Object)?;
                continue;
            };
            let mut obj = CadObject::new(schema.fixedtype, Supertype::Object, schema.dxf_name);
            let mut state = ObjectState::new();
            self.read_record_pairs(&mut obj, schema, &mut state)?;
            self.finish_object(&mut obj, schema, state);
            self.doc.add_object(obj);
        }
        Err(DwgError::Parse("unterminated OBJECTS section".into()))
    }

    // ---- THUMBNAILIMAGE -----------------------------------------------

    fn read_thumbnail(&mut self) -> Result<()> {
        let mut image = Vec::new();
        while let Some(pair) = self.next()? {
            if pair.is_marker("ENDSEC") {
                if !image.is_empty() {
                    self.doc.thumbnail = Some(image);
                }
                return Ok(());
            }
            if pair.code == 310 {
                if let Some(chunk) = pair.as_bytes() {
                    image.extend_from_slice(chunk);
                }
            }
        }
        Err(DwgError::Parse("unterminated THUMBNAILIMAGE section".into()))
    }

    // ---- generic pair → object machinery ------------------------------

    fn read_record_pairs(
        &mut self,
        obj: &mut CadObject,
        schema: &'static ObjectSchema,
        state: &mut ObjectState,
    ) -> Result<()> {
        while let Some(pair) = self.next()? {
            if pair.code == 0 {
                self.push_back(pair);
                return Ok(());
            }
            self.apply_pair(obj, schema, state, pair)?;
        }
        Ok(())
    }

    fn apply_pair(
        &mut self,
        obj: &mut CadObject,
        schema: &'static ObjectSchema,
        state: &mut ObjectState,
        pair: CodePair,
    ) -> Result<()> {
        // application group framing first: it re-types the codes inside
        if pair.code == 102 {
            let v = pair.as_str().unwrap_or("");
            state.group = Some(match v {
                "{ACAD_REACTORS" => GroupCtx::Reactors,
                "{ACAD_XDICTIONARY" => GroupCtx::XDict,
                "}" => GroupCtx::None,
                _ => GroupCtx::Foreign,
            });
            if state.group() == GroupCtx::None {
                state.group = None;
            }
            return Ok(());
        }
        match state.group() {
            GroupCtx::Reactors => {
                if pair.code == 330 {
                    if let Some(h) = pair.as_handle() {
                        let rid = self.doc.add_absolute_ref(4, Handle::new(h));
                        obj.common.reactors_mut().push(rid);
                    }
                    return Ok(());
                }
            }
            GroupCtx::XDict => {
                if pair.code == 360 {
                    if let Some(h) = pair.as_handle() {
                        let rid = self.doc.add_absolute_ref(3, Handle::new(h));
                        obj.common.set_xdict(Some(rid));
                    }
                    return Ok(());
                }
            }
            GroupCtx::Foreign => return Ok(()),
            GroupCtx::None => {}
        }

        match pair.code {
            100 | 999 => return Ok(()),
            5 | 105 => {
                if let Some(h) = pair.as_handle() {
                    obj.handle = Handle::new(h);
                }
                return Ok(());
            }
            1000.. => return self.apply_eed_pair(obj, state, pair),
            _ => {}
        }

        if obj.fixedtype == FixedType::Hatch && self.apply_hatch_pair(state, &pair) {
            return Ok(());
        }

        // second/third coordinate of a pending point
        if let Some(p) = &state.point {
            if pair.code == p.base + 10 {
                if let Some(v) = pair.as_f64() {
                    set_coord(obj, p, 1, v);
                }
                return Ok(());
            }
            if p.is_3d && pair.code == p.base + 20 {
                if let Some(v) = pair.as_f64() {
                    set_coord(obj, p, 2, v);
                }
                return Ok(());
            }
        }

        if let Some(d) = schema.field_by_dxf(pair.code, self.doc.version) {
            return self.apply_schema_pair(obj, state, d, pair);
        }

        self.apply_common_pair(obj, pair);
        Ok(())
    }

    fn apply_schema_pair(
        &mut self,
        obj: &mut CadObject,
        state: &mut ObjectState,
        d: &'static FieldDescriptor,
        pair: CodePair,
    ) -> Result<()> {
        let repeated = d.repeat != Repeat::One;
        if matches!(
            d.wire,
            WireType::P2RD | WireType::P2BD | WireType::P3BD | WireType::BE
        ) {
            let Some(x) = pair.as_f64() else {
                self.warn(format!("group {}: expected coordinate", pair.code));
                return Ok(());
            };
            let is_3d = !matches!(d.wire, WireType::P2RD | WireType::P2BD);
            let point = if is_3d {
                FieldValue::Point3(Vector3::new(x, 0.0, 0.0))
            } else {
                FieldValue::Point2(Vector2::new(x, 0.0))
            };
            if repeated {
                match obj.fields.get_mut(d.name) {
                    Some(FieldValue::List(items)) => items.push(point),
                    _ => obj.fields.set(d.name, FieldValue::List(vec![point])),
                }
            } else {
                obj.fields.set(d.name, point);
            }
            state.point = Some(PendingPoint {
                field: d.name,
                base: d.dxf,
                is_3d,
                list: repeated,
            });
            return Ok(());
        }

        // TF blobs accumulate chunk pairs into one byte vector
        if d.wire == WireType::TF {
            if let Some(chunk) = pair.as_bytes() {
                match obj.fields.get_mut(d.name) {
                    Some(FieldValue::Bytes(blob)) => blob.extend_from_slice(chunk),
                    _ => obj.fields.set(d.name, FieldValue::Bytes(chunk.to_vec())),
                }
            }
            return Ok(());
        }

        let Some(value) = self.pair_to_value(d, &pair) else {
            self.warn(format!(
                "group {}: value type mismatch for {}",
                pair.code, d.name
            ));
            return Ok(());
        };
        if repeated {
            match obj.fields.get_mut(d.name) {
                Some(FieldValue::List(items)) => items.push(value),
                _ => obj.fields.set(d.name, FieldValue::List(vec![value])),
            }
        } else {
            obj.fields.set(d.name, value);
        }
        Ok(())
    }

    /// Convert a scalar pair per the descriptor's wire type. `None`
    /// means the value shape does not fit the field.
    fn pair_to_value(&mut self, d: &'static FieldDescriptor, pair: &CodePair) -> Option<FieldValue> {
        use WireType::*;
        let value = match d.wire {
            B => FieldValue::Bool(pair.as_i64()? != 0),
            BB | RC | RS | RL | RLL | BS | BL | BLL | MC | UMC | MS => {
                FieldValue::Int(pair.as_i64()?)
            }
            RD | BD | DD | BT => FieldValue::Double(pair.as_f64()?),
            T => FieldValue::Text(pair.as_str()?.to_string()),
            CMC => FieldValue::Color(Color::by_index(pair.as_i64()? as i16)),
            H => {
                if let (Some(kind), Some(name)) = (d.table, pair.as_str()) {
                    FieldValue::Ref(self.doc.ref_by_name(kind, name, d.handle_code))
                } else {
                    let h = Handle::new(pair.as_handle()?);
                    FieldValue::Ref(self.doc.add_absolute_ref(d.handle_code, h))
                }
            }
            TF => FieldValue::Bytes(pair.as_bytes()?.to_vec()),
            P2RD | P2BD | P3BD | BE => return None,
        };
        Some(value)
    }

    /// Extended data pairs (`1000..`). A `1001` application name opens a
    /// new record; everything else appends to the open one.
    fn apply_eed_pair(
        &mut self,
        obj: &mut CadObject,
        state: &mut ObjectState,
        pair: CodePair,
    ) -> Result<()> {
        if pair.code == 1001 {
            if let Some(done) = state.eed.take() {
                obj.common.eed_mut().push(done);
            }
            let name = pair.as_str().unwrap_or("").to_string();
            let app = self.doc.ref_by_name(TableKind::AppId, &name, 5);
            state.eed = Some(Eed {
                app,
                values: Vec::new(),
            });
            return Ok(());
        }
        let Some(eed) = state.eed.as_mut() else {
            self.warn(format!("group {} outside an extended-data record", pair.code));
            return Ok(());
        };
        match pair.code {
            1000 => eed
                .values
                .push(EedValue::String(pair.as_str().unwrap_or("").to_string())),
            1002 => eed
                .values
                .push(EedValue::ControlMarker(pair.as_str() == Some("}"))),
            1004 => {
                if let Some(b) = pair.as_bytes() {
                    eed.values.push(EedValue::Binary(b.to_vec()));
                }
            }
            1005 => {
                if let Some(h) = pair.as_handle() {
                    eed.values.push(EedValue::Handle(Handle::new(h)));
                }
            }
            1010..=1013 => {
                if let Some(x) = pair.as_f64() {
                    eed.values.push(EedValue::Point(Vector3::new(x, 0.0, 0.0)));
                }
            }
            1020..=1023 => {
                if let (Some(y), Some(EedValue::Point(p))) = (pair.as_f64(), eed.values.last_mut())
                {
                    p.y = y;
                }
            }
            1030..=1033 => {
                if let (Some(z), Some(EedValue::Point(p))) = (pair.as_f64(), eed.values.last_mut())
                {
                    p.z = z;
                }
            }
            1040..=1042 => {
                if let Some(v) = pair.as_f64() {
                    eed.values.push(EedValue::Real(v));
                }
            }
            1070 => {
                if let Some(v) = pair.as_i64() {
                    eed.values.push(EedValue::Short(v as i16));
                }
            }
            1071 => {
                if let Some(v) = pair.as_i64() {
                    eed.values.push(EedValue::Long(v as i32));
                }
            }
            other => self.warn(format!("extended-data group {other} ignored")),
        }
        Ok(())
    }

    /// HATCH boundary-path pairs live outside the schema. Returns true
    /// when the pair was consumed.
    fn apply_hatch_pair(&mut self, state: &mut ObjectState, pair: &CodePair) -> bool {
        match pair.code {
            92 => {
                if let Some(done) = state.hatch_cur.take() {
                    state
                        .hatch_paths
                        .push(make_path(done.flag, done.verts, done.bulges));
                }
                state.hatch_cur = Some(PathState {
                    flag: pair.as_i64().unwrap_or(0),
                    ..Default::default()
                });
                true
            }
            // declared vertex count; the vertex list is authoritative
            93 => state.hatch_cur.is_some(),
            10 => match state.hatch_cur.as_mut() {
                Some(cur) => {
                    cur.pending_x = pair.as_f64();
                    true
                }
                None => false,
            },
            20 => match state.hatch_cur.as_mut() {
                Some(cur) => {
                    if let (Some(x), Some(y)) = (cur.pending_x.take(), pair.as_f64()) {
                        cur.verts.push(Vector2::new(x, y));
                    }
                    true
                }
                None => false,
            },
            42 => match state.hatch_cur.as_mut() {
                Some(cur) => {
                    if let Some(b) = pair.as_f64() {
                        // a bulge belongs to the vertex before it; pad
                        // skipped vertices with zero
                        let upto = cur.verts.len().saturating_sub(1);
                        while cur.bulges.len() < upto {
                            cur.bulges.push(0.0);
                        }
                        cur.bulges.push(b);
                    }
                    true
                }
                None => false,
            },
            // boundary source-object bookkeeping we do not model
            72 | 73 | 97 | 330 => state.hatch_cur.is_some(),
            _ => false,
        }
    }

    /// Common entity/object codes not covered by the type schema.
    fn apply_common_pair(&mut self, obj: &mut CadObject, pair: CodePair) {
        let code = pair.code;
        if let Some(e) = obj.entity_mut() {
            match code {
                8 => {
                    if let Some(name) = pair.as_str() {
                        let name = name.to_string();
                        e.layer = Some(self.doc.ref_by_name(TableKind::Layer, &name, 5));
                    }
                    return;
                }
                6 => {
                    if let Some(name) = pair.as_str() {
                        if name.eq_ignore_ascii_case("BYLAYER") {
                            e.linetype = None;
                        } else {
                            let name = name.to_string();
                            e.linetype = Some(self.doc.ref_by_name(TableKind::LType, &name, 5));
                        }
                    }
                    return;
                }
                62 => {
                    if let Some(v) = pair.as_i64() {
                        let rgb = e.color.rgb;
                        e.color = Color::by_index(v as i16);
                        e.color.rgb = rgb;
                    }
                    return;
                }
                420 => {
                    if let Some(v) = pair.as_i64() {
                        e.color.rgb = Some(v as u32);
                    }
                    return;
                }
                48 => {
                    if let Some(v) = pair.as_f64() {
                        e.linetype_scale = v;
                    }
                    return;
                }
                60 => {
                    e.invisible = pair.as_i64().unwrap_or(0) != 0;
                    return;
                }
                67 => {
                    e.paper_space = pair.as_i64().unwrap_or(0) != 0;
                    return;
                }
                _ => {}
            }
        }
        match code {
            330 => {
                if let Some(h) = pair.as_handle() {
                    let rid = self.doc.add_absolute_ref(4, Handle::new(h));
                    obj.common.set_owner(Some(rid));
                }
            }
            360 => {
                if let Some(h) = pair.as_handle() {
                    let rid = self.doc.add_absolute_ref(3, Handle::new(h));
                    obj.common.set_xdict(Some(rid));
                }
            }
            other => self.warn(format!("group {other} ignored on {}", obj.dxf_name)),
        }
    }

    /// Flush per-object accumulation and re-derive count scalars from
    /// the lists actually read.
    fn finish_object(
        &mut self,
        obj: &mut CadObject,
        schema: &'static ObjectSchema,
        mut state: ObjectState,
    ) {
        if let Some(done) = state.eed.take() {
            obj.common.eed_mut().push(done);
        }
        if obj.fixedtype == FixedType::Hatch {
            if let Some(done) = state.hatch_cur.take() {
                state
                    .hatch_paths
                    .push(make_path(done.flag, done.verts, done.bulges));
            }
            let n = state.hatch_paths.len();
            obj.fields.set("paths", FieldValue::List(state.hatch_paths));
            obj.fields.set("num_paths", FieldValue::Int(n as i64));
        }
        for d in schema.fields {
            let Repeat::Count(sibling) = d.repeat else {
                continue;
            };
            let len = match obj.fields.get(d.name) {
                Some(FieldValue::List(items)) => items.len(),
                Some(FieldValue::Bytes(b)) => b.len(),
                _ => continue,
            };
            if let Some(s) = schema.field(sibling) {
                obj.fields.set(s.name, FieldValue::Int(len as i64));
            }
        }
    }
}

fn table_kind(name: &str) -> Option<TableKind> {
    match name {
        "APPID" => Some(TableKind::AppId),
        "BLOCK_RECORD" => Some(TableKind::Block),
        "DIMSTYLE" => Some(TableKind::DimStyle),
        "LAYER" => Some(TableKind::Layer),
        "LTYPE" => Some(TableKind::LType),
        "STYLE" => Some(TableKind::Style),
        _ => None,
    }
}

fn set_coord(obj: &mut CadObject, p: &PendingPoint, axis: u8, v: f64) {
    let Some(value) = obj.fields.get_mut(p.field) else {
        return;
    };
    let target = if p.list {
        match value {
            FieldValue::List(items) => match items.last_mut() {
                Some(t) => t,
                None => return,
            },
            _ => return,
        }
    } else {
        value
    };
    match target {
        FieldValue::Point2(pt) => match axis {
            0 => pt.x = v,
            1 => pt.y = v,
            _ => {}
        },
        FieldValue::Point3(pt) => match axis {
            0 => pt.x = v,
            1 => pt.y = v,
            _ => pt.z = v,
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxf(body: &str) -> Document {
        read_dxf(body.as_bytes()).expect("read")
    }

    const MINIMAL: &str = "  0\nSECTION\n  2\nHEADER\n  9\n$ACADVER\n  1\nAC1018\n  0\nENDSEC\n  0\nSECTION\n  2\nENTITIES\n  0\nENDSEC\n  0\nEOF\n";

    #[test]
    fn test_minimal_document() {
        let doc = dxf(MINIMAL);
        assert_eq!(doc.version, DwgVersion::AC1018);
        // postprocess seeds the mandatory records
        assert!(doc.model_space_index().is_some());
        assert!(doc.find_table_record(TableKind::Layer, "0").is_some());
    }

    #[test]
    fn test_line_entity() {
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nLINE\n  5\n4F\n  8\nWALLS\n 10\n1.0\n 20\n2.0\n 30\n3.0\n 11\n4.0\n 21\n5.0\n 31\n6.0\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let lines = doc.indexes_of_type(FixedType::Line);
        assert_eq!(lines.len(), 1);
        let line = &doc.objects()[lines[0]];
        assert_eq!(line.handle, Handle::new(0x4F));
        assert_eq!(
            line.fields.get("start").unwrap().as_point3().unwrap(),
            Vector3::new(1.0, 2.0, 3.0)
        );
        assert_eq!(
            line.fields.get("end").unwrap().as_point3().unwrap(),
            Vector3::new(4.0, 5.0, 6.0)
        );
        // the unseen layer was created best-effort
        let layer = doc.find_table_record(TableKind::Layer, "WALLS");
        assert!(layer.is_some());
        let layer_handle = doc.objects()[layer.unwrap()].handle;
        let id = doc.objects()[lines[0]].entity().unwrap().layer.unwrap();
        assert_eq!(doc.ref_handle(id), Some(layer_handle));
        // and it landed in model space
        let ms = doc.model_space_index().unwrap();
        assert_eq!(doc.block_entities(ms), lines);
    }

    #[test]
    fn test_strict_name_policy_fails() {
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nLINE\n  8\nNOPE\n 10\n0.0\n 20\n0.0\n 11\n1.0\n 21\n1.0\n  0\nENDSEC\n  0\nEOF\n";
        let err = read_dxf_with(
            body.as_bytes(),
            ReadOptions {
                names: NameResolution::Strict,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DwgError::UnresolvedName(_)));
    }

    #[test]
    fn test_layer_table() {
        let body = "  0\nSECTION\n  2\nTABLES\n  0\nTABLE\n  2\nLAYER\n  5\n2\n 70\n1\n  0\nLAYER\n  5\n31\n  2\nWALLS\n 70\n0\n 62\n3\n  6\nContinuous\n  0\nENDTAB\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let i = doc.find_table_record(TableKind::Layer, "WALLS").unwrap();
        let layer = &doc.objects()[i];
        assert_eq!(layer.handle, Handle::new(0x31));
        assert_eq!(
            layer.fields.get("color"),
            Some(&FieldValue::Color(Color::by_index(3)))
        );
        let lt = layer.fields.ref_id("ltype").unwrap();
        let cont = doc.find_table_handle(TableKind::LType, "Continuous").unwrap();
        assert_eq!(doc.ref_handle(lt), Some(cont));
        // reconciliation put WALLS into the control's entry list
        let ctl = doc.control_index(TableKind::Layer).unwrap();
        let entries = doc.objects()[ctl]
            .fields
            .get("entries")
            .and_then(FieldValue::as_list)
            .unwrap();
        assert!(entries.len() >= 2); // layer 0 + WALLS
    }

    #[test]
    fn test_lwpolyline_point_list() {
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nLWPOLYLINE\n 90\n9\n 70\n0\n 10\n0.0\n 20\n0.0\n 10\n5.0\n 20\n0.0\n 10\n5.0\n 20\n5.0\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let i = doc.indexes_of_type(FixedType::LwPolyline)[0];
        let pl = &doc.objects()[i];
        let points = pl.fields.get("points").and_then(FieldValue::as_list).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], FieldValue::Point2(Vector2::new(5.0, 0.0)));
        // the stale declared count (9) was replaced by the real one
        assert_eq!(pl.fields.int("num_points"), Some(3));
    }

    #[test]
    fn test_hatch_bulge_follows_vertex() {
        // one bulge pair arriving after the second vertex: the bulge
        // vector pads the first slot with zero
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nHATCH\n  2\nANSI31\n 70\n0\n 71\n0\n 91\n1\n 92\n2\n 93\n2\n 10\n0.0\n 20\n0.0\n 10\n1.0\n 20\n0.0\n 42\n0.5\n 75\n0\n 76\n1\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let i = doc.indexes_of_type(FixedType::Hatch)[0];
        let hatch = &doc.objects()[i];
        assert_eq!(hatch.fields.int("num_paths"), Some(1));
        let paths = hatch.fields.get("paths").and_then(FieldValue::as_list).unwrap();
        let path = paths[0].as_list().unwrap();
        let bulges = path[2].as_list().unwrap();
        assert_eq!(
            bulges,
            &[FieldValue::Double(0.0), FieldValue::Double(0.5)]
        );
    }

    #[test]
    fn test_eed_record() {
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nCIRCLE\n 10\n0.0\n 20\n0.0\n 30\n0.0\n 40\n1.0\n1001\nACAD\n1000\nhello\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let i = doc.indexes_of_type(FixedType::Circle)[0];
        let eed = doc.objects()[i].common.eed().to_vec();
        assert_eq!(eed.len(), 1);
        assert_eq!(eed[0].values, vec![EedValue::String("hello".into())]);
        let acad = doc.find_table_handle(TableKind::AppId, "ACAD").unwrap();
        assert_eq!(doc.ref_handle(eed[0].app), Some(acad));
    }

    #[test]
    fn test_reactors_group() {
        let body = "  0\nSECTION\n  2\nOBJECTS\n  0\nDICTIONARY\n  5\n60\n102\n{ACAD_REACTORS\n330\nC\n102\n}\n280\n1\n281\n1\n  0\nENDSEC\n  0\nEOF\n";
        let doc = dxf(body);
        let i = doc
            .objects()
            .iter()
            .position(|o| o.handle == Handle::new(0x60))
            .unwrap();
        let obj = &doc.objects()[i];
        assert_eq!(obj.common.reactors().len(), 1);
        assert_eq!(doc.ref_handle(obj.common.reactors()[0]), Some(Handle::new(0xC)));
    }

    #[test]
    fn test_blocks_section() {
        let body = "  0\nSECTION\n  2\nBLOCKS\n  0\nBLOCK\n  5\n40\n  8\n0\n  2\nDOOR\n 70\n0\n 10\n0.0\n 20\n0.0\n 30\n0.0\n  0\nLINE\n  5\n41\n 10\n0.0\n 20\n0.0\n 30\n0.0\n 11\n1.0\n 21\n0.0\n 31\n0.0\n  0\nENDBLK\n  5\n42\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let hdr = doc.find_table_record(TableKind::Block, "DOOR").unwrap();
        assert!(doc.objects()[hdr].fields.ref_id("block_entity").is_some());
        assert!(doc.objects()[hdr].fields.ref_id("endblk_entity").is_some());
        let owned = doc.block_entities(hdr);
        let lines = doc.indexes_of_type(FixedType::Line);
        assert_eq!(owned, lines);
    }

    #[test]
    fn test_paper_space_entity_placement() {
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nPOINT\n 67\n1\n 10\n1.0\n 20\n1.0\n 30\n0.0\n  0\nENDSEC\n  0\nEOF\n";
        let mut doc = dxf(body);
        let i = doc.indexes_of_type(FixedType::Point)[0];
        let ps = doc.paper_space_index().unwrap();
        assert_eq!(doc.block_entities(ps), vec![i]);
        let ms = doc.model_space_index().unwrap();
        assert!(doc.block_entities(ms).is_empty());
    }

    #[test]
    fn test_header_variables() {
        let body = "  0\nSECTION\n  2\nHEADER\n  9\n$ACADVER\n  1\nAC1015\n  9\n$LTSCALE\n 40\n2.0\n  9\n$CLAYER\n  8\n0\n  9\n$HANDSEED\n  5\n200\n  9\n$NOTAVAR\n 70\n1\n  0\nENDSEC\n  0\nEOF\n";
        let doc = dxf(body);
        assert_eq!(doc.version, DwgVersion::AC1015);
        assert_eq!(doc.header.fields.double("LTSCALE"), Some(2.0));
        assert!(doc.header.fields.ref_id("CLAYER").is_some());
        assert!(doc.handle_seed().value() >= 0x200);
        assert!(doc.notifications.has_severity(Severity::Warning));
    }

    #[test]
    fn test_unknown_entity_becomes_placeholder() {
        let body = "  0\nSECTION\n  2\nENTITIES\n  0\nWIPEOUT\n  5\n7A\n 90\n0\n  0\nENDSEC\n  0\nEOF\n";
        let doc = dxf(body);
        assert!(doc.error_flags.contains(ErrorFlags::UNHANDLED_CLASS));
        let i = doc
            .objects()
            .iter()
            .position(|o| o.fixedtype == FixedType::UnknownEntity)
            .unwrap();
        assert_eq!(doc.objects()[i].dxf_name, "WIPEOUT");
        assert_eq!(doc.objects()[i].handle, Handle::new(0x7A));
    }

    #[test]
    fn test_classes_section() {
        let body = "  0\nSECTION\n  2\nCLASSES\n  0\nCLASS\n  1\nWIPEOUT\n  2\nAcDbWipeout\n  3\nWipeOut\n 90\n0\n280\n0\n281\n1\n  0\nENDSEC\n  0\nEOF\n";
        let doc = dxf(body);
        let class = doc.classes.by_dxf_name("WIPEOUT").unwrap();
        assert!(class.is_entity);
        assert!(class.class_number >= 500);
    }

    #[test]
    fn test_xrecord_blob() {
        let body = "  0\nSECTION\n  2\nOBJECTS\n  0\nXRECORD\n  5\n65\n280\n1\n310\nDEAD\n310\nBEEF\n  0\nENDSEC\n  0\nEOF\n";
        let doc = dxf(body);
        let i = doc
            .objects()
            .iter()
            .position(|o| o.fixedtype == FixedType::XRecord)
            .unwrap();
        let x = &doc.objects()[i];
        assert_eq!(
            x.fields.get("data"),
            Some(&FieldValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]))
        );
        assert_eq!(x.fields.int("data_size"), Some(4));
    }

    #[test]
    fn test_rerun_postprocess_is_stable() {
        let mut doc = dxf(MINIMAL);
        let objects = doc.len();
        let refs = doc.refs.len();
        postprocess(&mut doc, NameResolution::BestEffort).unwrap();
        assert_eq!(doc.len(), objects);
        assert_eq!(doc.refs.len(), refs);
    }
}
