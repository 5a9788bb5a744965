//! Structural reconciliation passes.
//!
//! Runs once after raw ingestion, before the graph is handed to
//! consumers. Every pass is idempotent; decisions compare handle values,
//! never table positions, so re-running over an already-clean document
//! changes nothing.

use crate::document::Document;
use crate::error::Result;
use crate::object::{CadObject, FixedType, Supertype, TableKind};
use crate::resolver::NameResolution;
use crate::types::{Handle, Vector3};
use crate::value::FieldValue;

/// Run the full pipeline: defaults, deferred names, canonical naming,
/// control reconciliation, SEQEND linkage, default backfill, and a final
/// reference refresh.
pub fn postprocess(doc: &mut Document, policy: NameResolution) -> Result<()> {
    doc.seed_defaults();
    doc.resolve_deferred(policy)?;
    normalize_names(doc);
    reconcile_controls(doc);
    fixup_seqend(doc);
    backfill_defaults(doc);
    doc.refresh_refs();
    Ok(())
}

/// Canonical casing for the well-known record names. Old writers carry
/// `STANDARD`, `BYLAYER`, `*MODEL_SPACE` and friends; the graph holds one
/// spelling so renames survive a round trip in both directions.
pub fn normalize_names(doc: &mut Document) {
    const CANONICAL: &[&str] = &[
        "Standard",
        "ByLayer",
        "ByBlock",
        "Continuous",
        "*Model_Space",
        "*Paper_Space",
    ];
    for obj in doc.objects_mut() {
        if obj.is_freed() || obj.fixedtype.table_kind().is_none() {
            continue;
        }
        let Some(name) = obj.record_name() else {
            continue;
        };
        if let Some(canon) = CANONICAL.iter().find(|c| c.eq_ignore_ascii_case(name)) {
            if name != *canon {
                obj.fields.set("name", FieldValue::Text((*canon).to_string()));
            }
        }
    }

    // the block header referenced as model space is *Model_Space, no
    // matter what the input called it
    if let Some(i) = model_space_target(doc) {
        let obj = &mut doc.objects_mut()[i];
        if obj.record_name() != Some("*Model_Space") {
            obj.fields
                .set("name", FieldValue::Text("*Model_Space".to_string()));
        }
    }
}

fn model_space_target(doc: &mut Document) -> Option<usize> {
    if let Some(ctl) = doc.control_index(TableKind::Block) {
        if let Some(id) = doc.objects()[ctl].fields.ref_id("model_space") {
            if let Some(i) = doc.resolve_silent(id) {
                return Some(i);
            }
        }
    }
    if let Some(i) = doc.model_space_index() {
        return Some(i);
    }
    // fall back to the first block header in table order
    doc.objects()
        .iter()
        .position(|o| !o.is_freed() && o.fixedtype == FixedType::BlockHeader)
}

/// Rebuild every control record's `entries[]` from the live records of
/// its kind, extracting the well-known singletons into their dedicated
/// slots. The result is independent of input ordering: entries follow
/// object-table order and singletons never occupy a generic slot.
pub fn reconcile_controls(doc: &mut Document) {
    for kind in [
        TableKind::Block,
        TableKind::Layer,
        TableKind::Style,
        TableKind::LType,
        TableKind::AppId,
        TableKind::DimStyle,
    ] {
        reconcile_one(doc, kind);
    }
    doc.dirty_refs = true;
}

fn singleton_slot(kind: TableKind, name: &str) -> Option<&'static str> {
    match kind {
        TableKind::LType if name.eq_ignore_ascii_case("ByLayer") => Some("bylayer"),
        TableKind::LType if name.eq_ignore_ascii_case("ByBlock") => Some("byblock"),
        TableKind::Block if name.eq_ignore_ascii_case("*Model_Space") => Some("model_space"),
        TableKind::Block if name.eq_ignore_ascii_case("*Paper_Space") => Some("paper_space"),
        _ => None,
    }
}

fn reconcile_one(doc: &mut Document, kind: TableKind) {
    let ctl = doc.ensure_control(kind, 0);
    let ctl_handle = doc.objects()[ctl].handle;

    let mut entry_handles = Vec::new();
    let mut slots: Vec<(&'static str, Handle)> = Vec::new();
    let mut members = Vec::new();
    for (i, obj) in doc.objects().iter().enumerate() {
        if obj.is_freed() || obj.fixedtype.table_kind() != Some(kind) {
            continue;
        }
        members.push(i);
        let slot = obj.record_name().and_then(|n| singleton_slot(kind, n));
        match slot {
            Some(slot) => slots.push((slot, obj.handle)),
            None => entry_handles.push(obj.handle),
        }
    }

    // entries[]: rewrite only when the handle sequence differs
    let current: Vec<Handle> = doc.objects()[ctl]
        .fields
        .get("entries")
        .and_then(FieldValue::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_ref_id())
                .filter_map(|id| doc.ref_handle(id))
                .collect()
        })
        .unwrap_or_default();
    if current != entry_handles {
        let refs: Vec<FieldValue> = entry_handles
            .iter()
            .map(|&h| FieldValue::Ref(doc.add_absolute_ref(2, h)))
            .collect();
        let ctl_obj = &mut doc.objects_mut()[ctl];
        ctl_obj.fields.set("entries", FieldValue::List(refs));
    }
    let n = entry_handles.len() as i64;
    doc.objects_mut()[ctl]
        .fields
        .set("num_entries", FieldValue::Int(n));

    for (slot, handle) in slots {
        let already = doc.objects()[ctl]
            .fields
            .ref_id(slot)
            .and_then(|id| doc.ref_handle(id));
        if already != Some(handle) {
            let rid = doc.add_absolute_ref(3, handle);
            doc.objects_mut()[ctl].fields.set(slot, FieldValue::Ref(rid));
        }
    }

    // every record points back at its control
    for i in members {
        let owner_ok = doc.objects()[i]
            .common
            .owner()
            .and_then(|id| doc.ref_handle(id))
            == Some(ctl_handle);
        if !owner_ok {
            let rid = doc.add_absolute_ref(4, ctl_handle);
            doc.objects_mut()[i].common.set_owner(Some(rid));
        }
    }
}

/// Locate each SEQEND's owner and synthesize the ownership linkage for
/// the contiguous run between owner and SEQEND.
///
/// The owner is taken from the SEQEND's own owner handle when it
/// resolves to a POLYLINE/INSERT-family entity; otherwise a backward
/// scan over the object table finds the nearest preceding one. Polyline
/// owners get the version-appropriate vertex linkage (first/last chain
/// before R2004, count plus handle array after).
pub fn fixup_seqend(doc: &mut Document) {
    let seqends: Vec<usize> = doc.indexes_of_type(FixedType::Seqend);
    for s in seqends {
        let owner = seqend_owner(doc, s);
        let Some(owner) = owner else {
            continue;
        };
        let owner_handle = doc.objects()[owner].handle;
        let seqend_handle = doc.objects()[s].handle;

        let existing = doc.objects()[s]
            .common
            .owner()
            .and_then(|id| doc.ref_handle(id));
        if existing != Some(owner_handle) {
            let rid = doc.add_absolute_ref(4, owner_handle);
            doc.objects_mut()[s].common.set_owner(Some(rid));
        }
        if doc.objects()[owner]
            .fields
            .ref_id("seqend")
            .and_then(|id| doc.ref_handle(id))
            != Some(seqend_handle)
        {
            let rid = doc.add_absolute_ref(3, seqend_handle);
            doc.objects_mut()[owner].fields.set("seqend", FieldValue::Ref(rid));
        }

        // the run is everything strictly between owner and seqend
        let run: Vec<usize> = ((owner + 1)..s)
            .filter(|&i| {
                let o = &doc.objects()[i];
                !o.is_freed() && o.supertype == Supertype::Entity
            })
            .collect();
        for &i in &run {
            let ok = doc.objects()[i]
                .common
                .owner()
                .and_then(|id| doc.ref_handle(id))
                == Some(owner_handle);
            if !ok {
                let rid = doc.add_absolute_ref(4, owner_handle);
                doc.objects_mut()[i].common.set_owner(Some(rid));
            }
        }
        if doc.objects()[owner].fixedtype == FixedType::Polyline2D {
            link_polyline_run(doc, owner, &run);
        }
    }
    doc.dirty_refs = true;
}

fn seqend_owner(doc: &mut Document, s: usize) -> Option<usize> {
    let owns_seqend = |t: FixedType| matches!(t, FixedType::Polyline2D | FixedType::Insert);
    if let Some(id) = doc.objects()[s].common.owner() {
        if let Some(i) = doc.resolve_silent(id) {
            if owns_seqend(doc.objects()[i].fixedtype) {
                return Some(i);
            }
        }
    }
    (0..s)
        .rev()
        .find(|&i| !doc.objects()[i].is_freed() && owns_seqend(doc.objects()[i].fixedtype))
}

fn link_polyline_run(doc: &mut Document, owner: usize, run: &[usize]) {
    if doc.version.uses_entity_chain() {
        if let (Some(&first), Some(&last)) = (run.first(), run.last()) {
            let first_h = doc.objects()[first].handle;
            let last_h = doc.objects()[last].handle;
            let first_ref = doc.add_absolute_ref(4, first_h);
            let last_ref = doc.add_absolute_ref(4, last_h);
            let obj = &mut doc.objects_mut()[owner];
            obj.fields.set("first_vertex", FieldValue::Ref(first_ref));
            obj.fields.set("last_vertex", FieldValue::Ref(last_ref));
        }
        // sibling chain through the run
        for w in 0..run.len() {
            let prev = w.checked_sub(1).map(|p| doc.objects()[run[p]].handle);
            let next = run.get(w + 1).map(|&n| doc.objects()[n].handle);
            let prev_ref = prev.map(|h| doc.add_absolute_ref(4, h));
            let next_ref = next.map(|h| doc.add_absolute_ref(4, h));
            if let Some(e) = doc.objects_mut()[run[w]].entity_mut() {
                e.prev_entity = prev_ref;
                e.next_entity = next_ref;
            }
        }
    } else {
        let refs: Vec<FieldValue> = run
            .iter()
            .map(|&i| doc.objects()[i].handle)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| FieldValue::Ref(doc.add_absolute_ref(3, h)))
            .collect();
        let obj = &mut doc.objects_mut()[owner];
        obj.fields.set("num_owned", FieldValue::Int(refs.len() as i64));
        obj.fields.set("vertex_handles", FieldValue::List(refs));
    }
}

/// Stamp each block header with its membership in the version's wire
/// form: first/last-entity pointers plus a sibling chain before R2004,
/// an owned-handle vector from R2004 on. Membership itself comes from
/// whatever the document has (handle vector, chain, or owner scan), so
/// a graph built by hand from owner references alone serializes whole.
pub fn link_block_runs(doc: &mut Document) {
    let headers: Vec<usize> = doc.indexes_of_type(FixedType::BlockHeader);
    for header in headers {
        let run = doc.block_entities(header);
        if doc.version.uses_entity_chain() {
            if let (Some(&first), Some(&last)) = (run.first(), run.last()) {
                let first_h = doc.objects()[first].handle;
                let last_h = doc.objects()[last].handle;
                let first_ref = doc.add_absolute_ref(4, first_h);
                let last_ref = doc.add_absolute_ref(4, last_h);
                let obj = &mut doc.objects_mut()[header];
                obj.fields.set("first_entity", FieldValue::Ref(first_ref));
                obj.fields.set("last_entity", FieldValue::Ref(last_ref));
            }
            for w in 0..run.len() {
                let prev = w.checked_sub(1).map(|p| doc.objects()[run[p]].handle);
                let next = run.get(w + 1).map(|&n| doc.objects()[n].handle);
                let prev_ref = prev.map(|h| doc.add_absolute_ref(4, h));
                let next_ref = next.map(|h| doc.add_absolute_ref(4, h));
                if let Some(e) = doc.objects_mut()[run[w]].entity_mut() {
                    e.prev_entity = prev_ref;
                    e.next_entity = next_ref;
                }
            }
        } else {
            let refs: Vec<FieldValue> = run
                .iter()
                .map(|&i| doc.objects()[i].handle)
                .collect::<Vec<_>>()
                .into_iter()
                .map(|h| FieldValue::Ref(doc.add_absolute_ref(3, h)))
                .collect();
            let obj = &mut doc.objects_mut()[header];
            obj.fields.set("num_owned", FieldValue::Int(refs.len() as i64));
            obj.fields.set("entity_handles", FieldValue::List(refs));
        }
    }
    doc.dirty_refs = true;
}

/// Compute version-dependent defaults that DXF text omits.
pub fn backfill_defaults(doc: &mut Document) {
    let version = doc.version;
    for obj in doc.objects_mut() {
        if obj.is_freed() {
            continue;
        }
        match obj.fixedtype {
            FixedType::Text | FixedType::Attrib => backfill_text(obj, version),
            FixedType::DimStyle => {
                if obj.fields.double("dim_scale").unwrap_or(0.0) == 0.0 {
                    obj.fields.set("dim_scale", FieldValue::Double(1.0));
                }
            }
            _ => {}
        }
        if let Some(schema) = crate::schema::schema_for_fixedtype(obj.fixedtype) {
            if schema.field("extrusion").is_some() && obj.fields.get("extrusion").is_none() {
                obj.fields
                    .set("extrusion", FieldValue::Point3(Vector3::UNIT_Z));
            }
        }
    }
}

/// TEXT/ATTRIB `dataflags` bits, derived from the sibling fields when the
/// input did not carry the mask (DXF text never does).
fn backfill_text(obj: &mut CadObject, version: crate::types::DwgVersion) {
    if version < crate::types::DwgVersion::AC1015 || obj.fields.get("dataflags").is_some() {
        return;
    }
    let mut flags = 0i64;
    if obj.fields.double("elevation").unwrap_or(0.0) != 0.0 {
        flags |= 0x01;
    }
    if obj.fields.get("alignment_pt").is_some() {
        flags |= 0x02;
    }
    if obj.fields.double("oblique_angle").unwrap_or(0.0) != 0.0 {
        flags |= 0x04;
    }
    if obj.fields.double("rotation").unwrap_or(0.0) != 0.0 {
        flags |= 0x08;
    }
    if obj.fields.double("width_factor").map_or(false, |w| w != 1.0 && w != 0.0) {
        flags |= 0x10;
    }
    if obj.fields.int("generation").unwrap_or(0) != 0 {
        flags |= 0x20;
    }
    if obj.fields.int("horiz_alignment").unwrap_or(0) != 0 {
        flags |= 0x40;
    }
    if obj.fields.int("vert_alignment").unwrap_or(0) != 0 {
        flags |= 0x80;
    }
    obj.fields.set("dataflags", FieldValue::Int(flags));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DwgVersion;

    fn table_record(kind: TableKind, name: &str) -> CadObject {
        let fixedtype = match kind {
            TableKind::AppId => FixedType::AppId,
            TableKind::Block => FixedType::BlockHeader,
            TableKind::DimStyle => FixedType::DimStyle,
            TableKind::Layer => FixedType::Layer,
            TableKind::LType => FixedType::LType,
            TableKind::Style => FixedType::Style,
        };
        let mut obj = CadObject::new(fixedtype, Supertype::Object, "RECORD");
        obj.fields.set("name", FieldValue::Text(name.to_string()));
        obj
    }

    #[test]
    fn test_singletons_extracted_regardless_of_order() {
        // records arrive singletons-first and singletons-last; the
        // reconciled control must not care
        for reversed in [false, true] {
            let mut doc = Document::empty(DwgVersion::AC1018);
            let mut names = vec!["ByLayer", "ByBlock", "DASHED", "CENTER"];
            if reversed {
                names.reverse();
            }
            for n in &names {
                doc.add_object(table_record(TableKind::LType, n));
            }
            reconcile_controls(&mut doc);

            let ctl = doc.control_index(TableKind::LType).unwrap();
            assert_eq!(doc.objects()[ctl].fields.int("num_entries"), Some(2));
            let entries: Vec<Handle> = doc.objects()[ctl]
                .fields
                .get("entries")
                .and_then(FieldValue::as_list)
                .unwrap()
                .iter()
                .map(|v| doc.ref_handle(v.as_ref_id().unwrap()).unwrap())
                .collect();
            let dashed = doc.find_table_handle(TableKind::LType, "DASHED").unwrap();
            let center = doc.find_table_handle(TableKind::LType, "CENTER").unwrap();
            assert!(entries.contains(&dashed) && entries.contains(&center));
            let bylayer = doc.find_table_handle(TableKind::LType, "ByLayer").unwrap();
            assert_eq!(
                doc.objects()[ctl]
                    .fields
                    .ref_id("bylayer")
                    .and_then(|id| doc.ref_handle(id)),
                Some(bylayer)
            );
        }
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut doc = Document::new(DwgVersion::AC1018);
        doc.add_object(table_record(TableKind::Layer, "WALLS"));
        reconcile_controls(&mut doc);
        let refs_before = doc.refs.len();
        let snapshot = doc.objects().to_vec();
        reconcile_controls(&mut doc);
        assert_eq!(doc.objects(), &snapshot[..]);
        assert_eq!(doc.refs.len(), refs_before);
    }

    fn doc_with_owned_lines(version: DwgVersion) -> (Document, usize, Vec<usize>) {
        let mut doc = Document::new(version);
        let ms = doc.model_space_index().unwrap();
        let ms_handle = doc.objects()[ms].handle;
        let mut lines = Vec::new();
        for x in [1.0, 2.0, 3.0] {
            let mut obj = CadObject::new(FixedType::Line, Supertype::Entity, "LINE");
            obj.fields
                .set("start", FieldValue::Point3(Vector3::new(x, 0.0, 0.0)));
            obj.fields
                .set("end", FieldValue::Point3(Vector3::new(x, 1.0, 0.0)));
            let rid = doc.add_absolute_ref(4, ms_handle);
            obj.entity_mut().unwrap().owner = Some(rid);
            lines.push(doc.add_object(obj));
        }
        (doc, ms, lines)
    }

    #[test]
    fn test_block_run_chain_linking() {
        // pre-R2004 block membership is a first/last pointer pair plus
        // a sibling chain through the run
        let (mut doc, ms, lines) = doc_with_owned_lines(DwgVersion::AC1015);
        link_block_runs(&mut doc);
        let first = doc.objects()[ms]
            .fields
            .ref_id("first_entity")
            .and_then(|id| doc.ref_handle(id));
        let last = doc.objects()[ms]
            .fields
            .ref_id("last_entity")
            .and_then(|id| doc.ref_handle(id));
        assert_eq!(first, Some(doc.objects()[lines[0]].handle));
        assert_eq!(last, Some(doc.objects()[lines[2]].handle));
        let next = doc.objects()[lines[0]]
            .entity()
            .unwrap()
            .next_entity
            .and_then(|id| doc.ref_handle(id));
        assert_eq!(next, Some(doc.objects()[lines[1]].handle));
        assert!(doc.objects()[lines[2]].entity().unwrap().next_entity.is_none());
    }

    #[test]
    fn test_block_run_handle_vector_linking() {
        let (mut doc, ms, lines) = doc_with_owned_lines(DwgVersion::AC1018);
        link_block_runs(&mut doc);
        assert_eq!(doc.objects()[ms].fields.int("num_owned"), Some(3));
        let members: Vec<usize> = doc.block_entities(ms);
        assert_eq!(members, lines);
        // a second pass reads back the vector it wrote
        link_block_runs(&mut doc);
        assert_eq!(doc.block_entities(ms), lines);
        assert_eq!(doc.objects()[ms].fields.int("num_owned"), Some(3));
    }

    #[test]
    fn test_empty_handle_vector_falls_back_to_owner_scan() {
        let (mut doc, ms, lines) = doc_with_owned_lines(DwgVersion::AC1018);
        doc.objects_mut()[ms]
            .fields
            .set("entity_handles", FieldValue::List(Vec::new()));
        doc.objects_mut()[ms].fields.set("num_owned", FieldValue::Int(0));
        assert_eq!(doc.block_entities(ms), lines);
    }

    #[test]
    fn test_seqend_backward_scan() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let pl = doc.add_object(CadObject::new(
            FixedType::Polyline2D,
            Supertype::Entity,
            "POLYLINE",
        ));
        let v1 = doc.add_object(CadObject::new(FixedType::Vertex2D, Supertype::Entity, "VERTEX"));
        let v2 = doc.add_object(CadObject::new(FixedType::Vertex2D, Supertype::Entity, "VERTEX"));
        let se = doc.add_object(CadObject::new(FixedType::Seqend, Supertype::Entity, "SEQEND"));

        fixup_seqend(&mut doc);

        let pl_handle = doc.objects()[pl].handle;
        assert_eq!(
            doc.objects()[se].common.owner().and_then(|id| doc.ref_handle(id)),
            Some(pl_handle)
        );
        // R2000: first/last chain
        let first = doc.objects()[pl].fields.ref_id("first_vertex").unwrap();
        assert_eq!(doc.ref_handle(first), Some(doc.objects()[v1].handle));
        let last = doc.objects()[pl].fields.ref_id("last_vertex").unwrap();
        assert_eq!(doc.ref_handle(last), Some(doc.objects()[v2].handle));
        let next = doc.objects()[v1].entity().unwrap().next_entity.unwrap();
        assert_eq!(doc.ref_handle(next), Some(doc.objects()[v2].handle));
    }

    #[test]
    fn test_seqend_vertex_array_on_modern_versions() {
        let mut doc = Document::new(DwgVersion::AC1018);
        let pl = doc.add_object(CadObject::new(
            FixedType::Polyline2D,
            Supertype::Entity,
            "POLYLINE",
        ));
        doc.add_object(CadObject::new(FixedType::Vertex2D, Supertype::Entity, "VERTEX"));
        doc.add_object(CadObject::new(FixedType::Seqend, Supertype::Entity, "SEQEND"));
        fixup_seqend(&mut doc);
        assert_eq!(doc.objects()[pl].fields.int("num_owned"), Some(1));
        assert_eq!(
            doc.objects()[pl]
                .fields
                .get("vertex_handles")
                .and_then(FieldValue::as_list)
                .map(|l| l.len()),
            Some(1)
        );
    }

    #[test]
    fn test_name_normalization() {
        let mut doc = Document::empty(DwgVersion::AC1015);
        doc.add_object(table_record(TableKind::Style, "STANDARD"));
        doc.add_object(table_record(TableKind::LType, "BYLAYER"));
        doc.add_object(table_record(TableKind::Block, "*MODEL_SPACE"));
        normalize_names(&mut doc);
        assert!(doc.find_table_record(TableKind::Style, "Standard").is_some());
        assert_eq!(
            doc.objects()
                .iter()
                .find(|o| o.fixedtype == FixedType::LType)
                .unwrap()
                .record_name(),
            Some("ByLayer")
        );
        assert_eq!(doc.model_space_index(), Some(2));
        assert_eq!(doc.objects()[2].record_name(), Some("*Model_Space"));
    }

    #[test]
    fn test_dataflags_backfill() {
        let mut doc = Document::new(DwgVersion::AC1015);
        let mut text = CadObject::new(FixedType::Text, Supertype::Entity, "TEXT");
        text.fields.set("rotation", FieldValue::Double(0.5));
        text.fields.set("vert_alignment", FieldValue::Int(1));
        let i = doc.add_object(text);
        backfill_defaults(&mut doc);
        assert_eq!(doc.objects()[i].fields.int("dataflags"), Some(0x08 | 0x80));
        // and never overwrites an explicit mask
        doc.objects_mut()[i].fields.set("dataflags", FieldValue::Int(0x01));
        backfill_defaults(&mut doc);
        assert_eq!(doc.objects()[i].fields.int("dataflags"), Some(0x01));
    }

    #[test]
    fn test_full_pipeline_seeds_missing_stock_linetypes() {
        // a document whose tables never mentioned ByLayer/ByBlock still
        // ends with the header pointers resolved
        let mut doc = Document::empty(DwgVersion::AC1018);
        doc.add_object(table_record(TableKind::Layer, "0"));
        postprocess(&mut doc, NameResolution::BestEffort).unwrap();
        for var in ["LTYPE_BYLAYER", "LTYPE_BYBLOCK"] {
            let id = doc.header.fields.ref_id(var).unwrap();
            let h = doc.ref_handle(id).unwrap();
            assert!(h.is_valid(), "{var} unresolved");
            assert!(doc.index_of_handle(h).is_some());
        }
    }
}
