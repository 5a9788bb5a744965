//! The free pass: release an object's owned resources and stamp it.
//!
//! The same descriptor tables that drive decode and encode drive release:
//! fields flagged OWNED (and any value that reports heap ownership) are
//! dropped first, then the residual scalars, the common block vectors,
//! and the raw payload. A freed object keeps its slot and handle but its
//! type becomes [`FixedType::Freed`], so the handle index skips it and
//! references to it stop resolving.
//!
//! Freeing is idempotent: a second pass over the same object is a no-op.

use crate::document::Document;
use crate::object::FixedType;
use crate::schema::FieldFlags;

/// Free one object by table index. Unknown indexes are ignored.
pub fn free_object(doc: &mut Document, index: usize) {
    let version = doc.version;
    let Some(obj) = doc.object_mut(index) else {
        return;
    };
    if obj.is_freed() {
        return;
    }

    if let Some(schema) = crate::schema::schema_for_fixedtype(obj.fixedtype) {
        for d in schema.fields_for(version) {
            let owned = d.flags.contains(FieldFlags::OWNED)
                || obj.fields.get(d.name).is_some_and(|v| v.owns_heap());
            if owned {
                obj.fields.remove(d.name);
            }
        }
    }
    obj.fields.clear();
    obj.common.eed_mut().clear();
    obj.common.reactors_mut().clear();
    obj.common.set_owner(None);
    obj.common.set_xdict(None);
    obj.unknown_bits.clear();
    obj.fixedtype = FixedType::Freed;
    doc.dirty_refs = true;
}

/// Free every object in the document.
pub fn free_document(doc: &mut Document) {
    for i in 0..doc.len() {
        free_object(doc, i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{CadObject, Supertype, TableKind};
    use crate::types::{DwgVersion, Handle};
    use crate::value::FieldValue;

    fn doc_with_text() -> (Document, usize) {
        let mut doc = Document::new(DwgVersion::AC1018);
        let mut obj = CadObject::new(FixedType::Text, Supertype::Entity, "TEXT");
        obj.fields
            .set("text_value", FieldValue::Text("hello".into()));
        obj.fields.set("height", FieldValue::Double(2.5));
        let i = doc.add_object(obj);
        (doc, i)
    }

    #[test]
    fn test_free_clears_and_stamps() {
        let (mut doc, i) = doc_with_text();
        free_object(&mut doc, i);
        let obj = doc.object(i).unwrap();
        assert!(obj.is_freed());
        assert!(obj.fields.is_empty());
        assert!(obj.handle.is_valid());
    }

    #[test]
    fn test_free_is_idempotent() {
        let (mut doc, i) = doc_with_text();
        free_object(&mut doc, i);
        let after_first = doc.object(i).unwrap().clone();
        free_object(&mut doc, i);
        assert_eq!(doc.object(i).unwrap(), &after_first);
    }

    #[test]
    fn test_freed_object_stops_resolving() {
        let (mut doc, i) = doc_with_text();
        let handle = doc.object(i).unwrap().handle;
        let id = doc.add_absolute_ref(5, handle);
        assert_eq!(doc.resolve_silent(id), Some(i));
        free_object(&mut doc, i);
        assert_eq!(doc.resolve_silent(id), None);
    }

    #[test]
    fn test_free_document_spares_nothing() {
        let mut doc = Document::new(DwgVersion::AC1018);
        free_document(&mut doc);
        assert!(doc.objects().iter().all(|o| o.is_freed()));
        assert!(doc.find_table_record(TableKind::Layer, "0").is_none());
    }

    #[test]
    fn test_free_out_of_range_is_noop() {
        let mut doc = Document::empty(DwgVersion::AC1015);
        free_object(&mut doc, 99);
        assert_eq!(doc.len(), 0);
        assert_eq!(doc.index_of_handle(Handle::new(1)), None);
    }
}
