//! The in-memory document: object table, reference vector, header,
//! classes, and per-document diagnostics.
//!
//! Handle-typed fields never store handles directly; they store a
//! [`RefId`] index into [`Document::refs`]. Resolution from a reference
//! to an object index is lazy and cached; any structural change to the
//! object table sets `dirty_refs`, which forces the next resolution to
//! rebuild the handle index (see [`crate::resolver`]).

use ahash::AHashMap;

use crate::classes::ClassCollection;
use crate::error::ErrorFlags;
use crate::header::HeaderVariables;
use crate::notification::NotificationCollection;
use crate::object::{CadObject, FixedType, Supertype, TableKind};
use crate::resolver::DeferredName;
use crate::types::{DwgVersion, Handle, HandleReference};
use crate::value::{FieldValue, RefId};

/// One entry in the document reference vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjRef {
    /// The reference as read off the wire (or synthesized).
    pub href: HandleReference,
    /// The absolute target handle after applying the base offset.
    pub absolute: Handle,
    /// Cached object-table index, valid while `dirty_refs` is clear.
    pub resolved: Option<usize>,
}

/// Drawing property strings (the SUMMARYINFO record).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryInfo {
    pub title: String,
    pub subject: String,
    pub author: String,
    pub keywords: String,
    pub comments: String,
    pub last_saved_by: String,
}

/// Conventional handles for the records every drawing carries.
///
/// Writers are free to renumber; readers must look records up by name
/// first and fall back to these.
pub mod known_handle {
    pub const BLOCK_CONTROL: u64 = 0x01;
    pub const LAYER_CONTROL: u64 = 0x02;
    pub const STYLE_CONTROL: u64 = 0x03;
    pub const LTYPE_CONTROL: u64 = 0x05;
    pub const APPID_CONTROL: u64 = 0x09;
    pub const DIMSTYLE_CONTROL: u64 = 0x0A;
    pub const ROOT_DICTIONARY: u64 = 0x0C;
    pub const LAYER_ZERO: u64 = 0x10;
    pub const STYLE_STANDARD: u64 = 0x11;
    pub const APPID_ACAD: u64 = 0x12;
    pub const LTYPE_BYBLOCK: u64 = 0x14;
    pub const LTYPE_BYLAYER: u64 = 0x15;
    pub const LTYPE_CONTINUOUS: u64 = 0x16;
    pub const DIMSTYLE_STANDARD: u64 = 0x1D;
    pub const MODEL_SPACE: u64 = 0x1F;
    pub const PAPER_SPACE: u64 = 0x20;
}

/// A complete in-memory drawing.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: DwgVersion,
    pub header: HeaderVariables,
    pub classes: ClassCollection,
    pub summary: SummaryInfo,
    /// Raw preview image bytes, if the source carried one.
    pub thumbnail: Option<Vec<u8>>,
    objects: Vec<CadObject>,
    /// Document-global reference vector; fields hold [`RefId`] indexes
    /// into this.
    pub refs: Vec<ObjRef>,
    handle_index: AHashMap<u64, usize>,
    /// Set whenever the object table changes shape; forces the next
    /// resolution to rebuild the handle index.
    pub dirty_refs: bool,
    /// Symbolic names seen before their table records; drained by
    /// postprocessing.
    pub deferred: Vec<DeferredName>,
    pub notifications: NotificationCollection,
    pub error_flags: ErrorFlags,
    next_handle: u64,
}

impl Document {
    /// A bare document with nothing seeded. Readers start here.
    pub fn empty(version: DwgVersion) -> Self {
        Self {
            version,
            header: HeaderVariables::with_defaults(),
            classes: ClassCollection::new(),
            summary: SummaryInfo::default(),
            thumbnail: None,
            objects: Vec::new(),
            refs: Vec::new(),
            handle_index: AHashMap::new(),
            dirty_refs: false,
            deferred: Vec::new(),
            notifications: NotificationCollection::new(),
            error_flags: ErrorFlags::empty(),
            next_handle: 1,
        }
    }

    /// A new drawing with the mandatory records seeded: the six table
    /// controls, layer `0`, style `Standard`, the three stock linetypes,
    /// dimstyle `Standard`, appid `ACAD`, the root dictionary, and the
    /// model/paper space block headers.
    pub fn new(version: DwgVersion) -> Self {
        let mut doc = Self::empty(version);
        doc.seed_defaults();
        doc
    }

    // ---- object table -------------------------------------------------

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, index: usize) -> Option<&CadObject> {
        self.objects.get(index)
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut CadObject> {
        self.objects.get_mut(index)
    }

    pub fn objects(&self) -> &[CadObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [CadObject] {
        &mut self.objects
    }

    /// Add an object, assigning a handle if it has none. Returns the
    /// object-table index.
    pub fn add_object(&mut self, mut obj: CadObject) -> usize {
        if obj.handle.is_null() {
            obj.handle = self.alloc_handle();
        } else if obj.handle.value() >= self.next_handle {
            self.next_handle = obj.handle.value() + 1;
        }
        let index = self.objects.len();
        self.handle_index.insert(obj.handle.value(), index);
        self.objects.push(obj);
        self.dirty_refs = true;
        index
    }

    /// Allocate the next free handle.
    pub fn alloc_handle(&mut self) -> Handle {
        let h = Handle::new(self.next_handle);
        self.next_handle += 1;
        h
    }

    /// The next handle a fresh object would get (the HANDSEED value).
    pub fn handle_seed(&self) -> Handle {
        Handle::new(self.next_handle)
    }

    /// Raise the handle allocator to at least `seed`. Never lowers it:
    /// a stale HANDSEED in the input must not cause handle reuse.
    pub fn set_handle_seed(&mut self, seed: Handle) {
        if seed.value() > self.next_handle {
            self.next_handle = seed.value();
        }
    }

    /// Rebuild the handle → index map from scratch. Freed objects are
    /// excluded; on duplicate handles the first occurrence wins.
    pub fn rebuild_handle_index(&mut self) {
        self.handle_index.clear();
        for (i, obj) in self.objects.iter().enumerate() {
            if !obj.is_freed() && obj.handle.is_valid() {
                self.handle_index.entry(obj.handle.value()).or_insert(i);
            }
        }
    }

    /// Object-table index for an absolute handle.
    pub fn index_of_handle(&mut self, handle: Handle) -> Option<usize> {
        if handle.is_null() {
            return None;
        }
        if self.dirty_refs {
            self.rebuild_handle_index();
        }
        self.handle_index.get(&handle.value()).copied()
    }

    // ---- reference vector ---------------------------------------------

    /// Record a wire reference, resolving offset codes against `base`
    /// (the referencing object's own handle).
    pub fn add_handle_ref(&mut self, href: HandleReference, base: Handle) -> RefId {
        let absolute = href.resolve(base);
        self.push_ref(href, absolute)
    }

    /// Record an absolute reference with the given reference code.
    pub fn add_absolute_ref(&mut self, code: u8, handle: Handle) -> RefId {
        self.push_ref(HandleReference::absolute(code, handle), handle)
    }

    fn push_ref(&mut self, href: HandleReference, absolute: Handle) -> RefId {
        let id = RefId(self.refs.len());
        self.refs.push(ObjRef {
            href,
            absolute,
            resolved: None,
        });
        id
    }

    /// The absolute handle a reference points at.
    pub fn ref_handle(&self, id: RefId) -> Option<Handle> {
        self.refs.get(id.0).map(|r| r.absolute)
    }

    /// Retarget a reference at another object, keeping its code.
    pub fn retarget_ref(&mut self, id: RefId, handle: Handle) {
        if let Some(r) = self.refs.get_mut(id.0) {
            r.href = HandleReference::absolute(r.href.code, handle);
            r.absolute = handle;
            r.resolved = None;
        }
    }

    // ---- lookups ------------------------------------------------------

    /// Find a live table record by kind and name (case-insensitive).
    pub fn find_table_record(&self, kind: TableKind, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| {
            !o.is_freed()
                && o.fixedtype.table_kind() == Some(kind)
                && o.record_name().is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }

    /// Find the control record for a table kind.
    pub fn control_index(&self, kind: TableKind) -> Option<usize> {
        let want = FixedType::control_of(kind);
        self.objects
            .iter()
            .position(|o| !o.is_freed() && o.fixedtype == want)
    }

    /// Indexes of every live object of a fixed type, in table order.
    pub fn indexes_of_type(&self, fixedtype: FixedType) -> Vec<usize> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_freed() && o.fixedtype == fixedtype)
            .map(|(i, _)| i)
            .collect()
    }

    /// The model-space block header, if present.
    pub fn model_space_index(&self) -> Option<usize> {
        self.find_table_record(TableKind::Block, "*Model_Space")
    }

    /// The paper-space block header, if present.
    pub fn paper_space_index(&self) -> Option<usize> {
        self.find_table_record(TableKind::Block, "*Paper_Space")
    }

    /// Entities owned by a block header, in drawing order.
    ///
    /// Pre-R2004 documents chain entities through prev/next pointers
    /// from `first_entity`; R2004+ documents carry an explicit handle
    /// vector. A block with neither falls back to an owner scan.
    pub fn block_entities(&mut self, block: usize) -> Vec<usize> {
        let Some(obj) = self.objects.get(block) else {
            return Vec::new();
        };
        if let Some(FieldValue::List(items)) = obj.fields.get("entity_handles").cloned() {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(id) = item.as_ref_id() {
                    if let Some(i) = self.resolve_silent(id) {
                        out.push(i);
                    }
                }
            }
            // an empty or fully dangling handle vector says nothing;
            // fall through to the chain or the owner scan
            if !out.is_empty() {
                return out;
            }
        }
        if let Some(first) = self.objects[block].fields.ref_id("first_entity") {
            let mut out = Vec::new();
            let mut cursor = self.resolve_silent(first);
            while let Some(i) = cursor {
                if out.contains(&i) {
                    break;
                }
                out.push(i);
                cursor = self
                    .object(i)
                    .and_then(|o| o.entity())
                    .and_then(|e| e.next_entity)
                    .and_then(|id| self.resolve_silent(id));
            }
            if !out.is_empty() {
                return out;
            }
        }
        let block_handle = self.objects[block].handle;
        // the BLOCK/ENDBLK marker entities also point at the header but
        // are not part of the drawing-order run
        let owned: Vec<usize> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| {
                o.supertype == Supertype::Entity
                    && !o.is_freed()
                    && !matches!(o.fixedtype, FixedType::Block | FixedType::Endblk)
            })
            .filter(|(_, o)| {
                o.common
                    .owner()
                    .and_then(|id| self.ref_handle(id))
                    .is_some_and(|h| h == block_handle)
            })
            .map(|(i, _)| i)
            .collect();
        owned
    }

    // ---- seeding ------------------------------------------------------

    /// Create the mandatory records if missing and wire the header
    /// pointer variables at them. Idempotent: existing records (matched
    /// by name) are kept.
    pub fn seed_defaults(&mut self) {
        use known_handle as kh;

        let block_ctl = self.ensure_control(TableKind::Block, kh::BLOCK_CONTROL);
        let layer_ctl = self.ensure_control(TableKind::Layer, kh::LAYER_CONTROL);
        let style_ctl = self.ensure_control(TableKind::Style, kh::STYLE_CONTROL);
        let ltype_ctl = self.ensure_control(TableKind::LType, kh::LTYPE_CONTROL);
        let appid_ctl = self.ensure_control(TableKind::AppId, kh::APPID_CONTROL);
        let dim_ctl = self.ensure_control(TableKind::DimStyle, kh::DIMSTYLE_CONTROL);

        self.ensure_table_record(TableKind::Layer, "0", kh::LAYER_ZERO, layer_ctl);
        self.ensure_table_record(TableKind::Style, "Standard", kh::STYLE_STANDARD, style_ctl);
        self.ensure_table_record(TableKind::AppId, "ACAD", kh::APPID_ACAD, appid_ctl);
        let byblock =
            self.ensure_table_record(TableKind::LType, "ByBlock", kh::LTYPE_BYBLOCK, ltype_ctl);
        let bylayer =
            self.ensure_table_record(TableKind::LType, "ByLayer", kh::LTYPE_BYLAYER, ltype_ctl);
        self.ensure_table_record(TableKind::LType, "Continuous", kh::LTYPE_CONTINUOUS, ltype_ctl);
        self.ensure_table_record(TableKind::DimStyle, "Standard", kh::DIMSTYLE_STANDARD, dim_ctl);
        let ms = self.ensure_table_record(
            TableKind::Block,
            "*Model_Space",
            kh::MODEL_SPACE,
            block_ctl,
        );
        let ps = self.ensure_table_record(
            TableKind::Block,
            "*Paper_Space",
            kh::PAPER_SPACE,
            block_ctl,
        );
        self.ensure_root_dictionary();
        self.ensure_block_markers();

        // ByBlock/ByLayer live off the LTYPE_CONTROL's dedicated slots,
        // not its entry list. Same split for model/paper space blocks.
        for (ctl, field, idx) in [
            (ltype_ctl, "bylayer", bylayer),
            (ltype_ctl, "byblock", byblock),
            (block_ctl, "model_space", ms),
            (block_ctl, "paper_space", ps),
        ] {
            let handle = self.objects[idx].handle;
            if self.objects[ctl].fields.ref_id(field).is_none() {
                let rid = self.add_absolute_ref(3, handle);
                self.objects[ctl].fields.set(field, FieldValue::Ref(rid));
            }
        }

        self.wire_header_refs();
        self.dirty_refs = true;
    }

    pub(crate) fn ensure_control(&mut self, kind: TableKind, preferred: u64) -> usize {
        if let Some(i) = self.control_index(kind) {
            return i;
        }
        let fixedtype = FixedType::control_of(kind);
        let schema = crate::schema::schema_for_fixedtype(fixedtype);
        let dxf_name = schema.map_or("TABLE", |s| s.dxf_name);
        let mut obj = CadObject::new(fixedtype, Supertype::Object, dxf_name);
        obj.handle = self.claim_handle(preferred);
        obj.fields.set("num_entries", FieldValue::Int(0));
        obj.fields.set("entries", FieldValue::List(Vec::new()));
        self.add_object(obj)
    }

    pub(crate) fn ensure_table_record(
        &mut self,
        kind: TableKind,
        name: &str,
        preferred: u64,
        control: usize,
    ) -> usize {
        if let Some(i) = self.find_table_record(kind, name) {
            return i;
        }
        let fixedtype = match kind {
            TableKind::AppId => FixedType::AppId,
            TableKind::Block => FixedType::BlockHeader,
            TableKind::DimStyle => FixedType::DimStyle,
            TableKind::Layer => FixedType::Layer,
            TableKind::LType => FixedType::LType,
            TableKind::Style => FixedType::Style,
        };
        let schema = crate::schema::schema_for_fixedtype(fixedtype);
        let dxf_name = schema.map_or("RECORD", |s| s.dxf_name);
        let mut obj = CadObject::new(fixedtype, Supertype::Object, dxf_name);
        obj.handle = self.claim_handle(preferred);
        obj.fields.set("name", FieldValue::Text(name.to_string()));
        if fixedtype == FixedType::Layer {
            obj.fields
                .set("color", FieldValue::Color(crate::types::Color::by_index(7)));
        }
        let control_handle = self.objects[control].handle;
        let owner = self.add_absolute_ref(4, control_handle);
        obj.common.set_owner(Some(owner));
        let index = self.add_object(obj);

        // stock LTYPE slots and the space blocks stay out of the entry
        // list; everything else is appended
        let dedicated = matches!(name, "ByLayer" | "ByBlock")
            || name.eq_ignore_ascii_case("*Model_Space")
            || name.eq_ignore_ascii_case("*Paper_Space");
        if !dedicated {
            let handle = self.objects[index].handle;
            let rid = self.add_absolute_ref(2, handle);
            let ctl = &mut self.objects[control];
            match ctl.fields.get_mut("entries") {
                Some(FieldValue::List(items)) => items.push(FieldValue::Ref(rid)),
                _ => ctl
                    .fields
                    .set("entries", FieldValue::List(vec![FieldValue::Ref(rid)])),
            }
            let n = ctl
                .fields
                .get("entries")
                .and_then(FieldValue::as_list)
                .map_or(0, |l| l.len());
            ctl.fields.set("num_entries", FieldValue::Int(n as i64));
        }
        index
    }

    fn ensure_root_dictionary(&mut self) -> usize {
        if let Some(i) = self
            .objects
            .iter()
            .position(|o| !o.is_freed() && o.fixedtype == FixedType::Dictionary && o.common.owner().is_none())
        {
            return i;
        }
        let mut obj = CadObject::new(FixedType::Dictionary, Supertype::Object, "DICTIONARY");
        obj.handle = self.claim_handle(known_handle::ROOT_DICTIONARY);
        obj.fields.set("num_items", FieldValue::Int(0));
        obj.fields.set("names", FieldValue::List(Vec::new()));
        obj.fields.set("item_handles", FieldValue::List(Vec::new()));
        self.add_object(obj)
    }

    /// Every block header owns a BLOCK/ENDBLK marker entity pair; DXF
    /// emits them as the block wrapper records. Headers that already
    /// point at live markers are left alone.
    fn ensure_block_markers(&mut self) {
        let headers: Vec<usize> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_freed() && o.fixedtype == FixedType::BlockHeader)
            .map(|(i, _)| i)
            .collect();
        for header in headers {
            let header_handle = self.objects[header].handle;
            let name = self.objects[header].record_name().map(str::to_string);
            for (field, fixedtype, dxf_name) in [
                ("block_entity", FixedType::Block, "BLOCK"),
                ("endblk_entity", FixedType::Endblk, "ENDBLK"),
            ] {
                let target = self.objects[header]
                    .fields
                    .ref_id(field)
                    .and_then(|id| self.ref_handle(id));
                let live = target
                    .and_then(|h| self.index_of_handle(h))
                    .is_some_and(|i| !self.objects[i].is_freed());
                if live {
                    continue;
                }
                let mut obj = CadObject::new(fixedtype, Supertype::Entity, dxf_name);
                if fixedtype == FixedType::Block {
                    if let Some(n) = &name {
                        obj.fields.set("name", FieldValue::Text(n.clone()));
                    }
                }
                let owner = self.add_absolute_ref(4, header_handle);
                obj.common.set_owner(Some(owner));
                let i = self.add_object(obj);
                let marker_handle = self.objects[i].handle;
                let rid = self.add_absolute_ref(3, marker_handle);
                self.objects[header].fields.set(field, FieldValue::Ref(rid));
            }
        }
        self.dirty_refs = true;
    }

    /// Use `preferred` if free and non-null, otherwise allocate.
    fn claim_handle(&mut self, preferred: u64) -> Handle {
        let taken = preferred == 0
            || self
                .objects
                .iter()
                .any(|o| o.handle.value() == preferred && !o.is_freed());
        if taken {
            self.alloc_handle()
        } else {
            if preferred >= self.next_handle {
                self.next_handle = preferred + 1;
            }
            Handle::new(preferred)
        }
    }

    /// Point the header's handle variables at the seeded records.
    fn wire_header_refs(&mut self) {
        let pairs: &[(&'static str, TableKind, &str, u8)] = &[
            ("CLAYER", TableKind::Layer, "0", 5),
            ("TEXTSTYLE", TableKind::Style, "Standard", 5),
            ("CELTYPE", TableKind::LType, "ByLayer", 5),
            ("DIMSTYLE", TableKind::DimStyle, "Standard", 5),
            ("LTYPE_BYLAYER", TableKind::LType, "ByLayer", 5),
            ("LTYPE_BYBLOCK", TableKind::LType, "ByBlock", 5),
            ("LTYPE_CONTINUOUS", TableKind::LType, "Continuous", 5),
            ("MODEL_SPACE", TableKind::Block, "*Model_Space", 3),
            ("PAPER_SPACE", TableKind::Block, "*Paper_Space", 3),
        ];
        for &(var, kind, name, code) in pairs {
            if self.header.fields.ref_id(var).is_some() {
                continue;
            }
            if let Some(i) = self.find_table_record(kind, name) {
                let handle = self.objects[i].handle;
                let rid = self.add_absolute_ref(code, handle);
                self.header.fields.set(var, FieldValue::Ref(rid));
            }
        }
        let controls: &[(&'static str, TableKind)] = &[
            ("BLOCK_CONTROL", TableKind::Block),
            ("LAYER_CONTROL", TableKind::Layer),
            ("STYLE_CONTROL", TableKind::Style),
            ("LTYPE_CONTROL", TableKind::LType),
            ("APPID_CONTROL", TableKind::AppId),
            ("DIMSTYLE_CONTROL", TableKind::DimStyle),
        ];
        for &(var, kind) in controls {
            if self.header.fields.ref_id(var).is_some() {
                continue;
            }
            if let Some(i) = self.control_index(kind) {
                let handle = self.objects[i].handle;
                let rid = self.add_absolute_ref(3, handle);
                self.header.fields.set(var, FieldValue::Ref(rid));
            }
        }
        if self.header.fields.ref_id("DICTIONARY_NAMED_OBJECT").is_none() {
            let root = self
                .objects
                .iter()
                .position(|o| !o.is_freed() && o.fixedtype == FixedType::Dictionary);
            if let Some(i) = root {
                let handle = self.objects[i].handle;
                let rid = self.add_absolute_ref(3, handle);
                self.header
                    .fields
                    .set("DICTIONARY_NAMED_OBJECT", FieldValue::Ref(rid));
            }
        }
        // HANDSEED tracks the allocator, not an object
        let seed = self.handle_seed();
        match self.header.fields.ref_id("HANDSEED") {
            Some(id) => self.retarget_ref(id, seed),
            None => {
                let rid = self.add_absolute_ref(0, seed);
                self.header.fields.set("HANDSEED", FieldValue::Ref(rid));
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new(DwgVersion::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_defaults_present() {
        let doc = Document::new(DwgVersion::AC1018);
        assert!(doc.find_table_record(TableKind::Layer, "0").is_some());
        assert!(doc.find_table_record(TableKind::Style, "STANDARD").is_some());
        assert!(doc.find_table_record(TableKind::LType, "Continuous").is_some());
        assert!(doc.model_space_index().is_some());
        assert!(doc.paper_space_index().is_some());
        for kind in [
            TableKind::Block,
            TableKind::Layer,
            TableKind::Style,
            TableKind::LType,
            TableKind::AppId,
            TableKind::DimStyle,
        ] {
            assert!(doc.control_index(kind).is_some(), "missing control {kind:?}");
        }
    }

    #[test]
    fn test_space_blocks_carry_marker_entities() {
        let mut doc = Document::new(DwgVersion::AC1018);
        assert_eq!(doc.indexes_of_type(FixedType::Block).len(), 2);
        assert_eq!(doc.indexes_of_type(FixedType::Endblk).len(), 2);
        let ms = doc.model_space_index().unwrap();
        let begin = doc.objects()[ms]
            .fields
            .ref_id("block_entity")
            .and_then(|id| doc.ref_handle(id))
            .and_then(|h| doc.index_of_handle(h))
            .unwrap();
        assert_eq!(doc.objects()[begin].fixedtype, FixedType::Block);
        assert_eq!(doc.objects()[begin].record_name(), Some("*Model_Space"));
        // markers stay out of the drawing-order run
        assert!(doc.block_entities(ms).is_empty());
    }

    #[test]
    fn test_seeding_is_idempotent() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let before = doc.len();
        doc.seed_defaults();
        assert_eq!(doc.len(), before);
    }

    #[test]
    fn test_space_blocks_stay_out_of_entries() {
        let doc = Document::new(DwgVersion::AC1018);
        let ctl = doc.control_index(TableKind::Block).unwrap();
        let entries = doc.objects()[ctl]
            .fields
            .get("entries")
            .and_then(FieldValue::as_list)
            .unwrap();
        assert!(entries.is_empty());
        assert!(doc.objects()[ctl].fields.ref_id("model_space").is_some());
        assert!(doc.objects()[ctl].fields.ref_id("paper_space").is_some());
    }

    #[test]
    fn test_add_object_assigns_handles() {
        let mut doc = Document::empty(DwgVersion::AC1015);
        let i = doc.add_object(CadObject::new(FixedType::Line, Supertype::Entity, "LINE"));
        let j = doc.add_object(CadObject::new(FixedType::Line, Supertype::Entity, "LINE"));
        let (h1, h2) = (doc.objects()[i].handle, doc.objects()[j].handle);
        assert!(h1.is_valid());
        assert!(h2 > h1);
        assert!(doc.dirty_refs);
    }

    #[test]
    fn test_explicit_handle_bumps_seed() {
        let mut doc = Document::empty(DwgVersion::AC1015);
        let mut obj = CadObject::new(FixedType::Circle, Supertype::Entity, "CIRCLE");
        obj.handle = Handle::new(0x80);
        doc.add_object(obj);
        assert!(doc.alloc_handle().value() > 0x80);
    }

    #[test]
    fn test_index_of_handle() {
        let mut doc = Document::empty(DwgVersion::AC1015);
        let mut obj = CadObject::new(FixedType::Point, Supertype::Entity, "POINT");
        obj.handle = Handle::new(0x42);
        let i = doc.add_object(obj);
        assert_eq!(doc.index_of_handle(Handle::new(0x42)), Some(i));
        assert_eq!(doc.index_of_handle(Handle::NULL), None);
        assert_eq!(doc.index_of_handle(Handle::new(0x99)), None);
    }

    #[test]
    fn test_offset_ref_resolution() {
        let mut doc = Document::empty(DwgVersion::AC1015);
        let base = Handle::new(0x10);
        let id = doc.add_handle_ref(HandleReference::new(0xA, 1, 5), base);
        assert_eq!(doc.ref_handle(id), Some(Handle::new(0x15)));
    }

    #[test]
    fn test_handseed_header_var() {
        let doc = Document::new(DwgVersion::AC1018);
        let id = doc.header.fields.ref_id("HANDSEED").unwrap();
        assert_eq!(doc.ref_handle(id), Some(doc.handle_seed()));
    }
}
