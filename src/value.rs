//! Dynamic field values and the ordered per-object field map.
//!
//! Type-specific data is not modeled as one Rust struct per object type;
//! the per-type layout lives in declarative schemas (see [`crate::schema`])
//! and the populated values live in a [`FieldMap`] keyed by field name.
//! The map preserves declaration order because later fields' cardinality
//! can depend on earlier scalar fields.

use indexmap::IndexMap;

use crate::types::{Color, Vector2, Vector3};

/// Index into the document-global object reference vector
/// ([`crate::document::Document::refs`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(pub usize);

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Point2(Vector2),
    Point3(Vector3),
    Text(String),
    Bytes(Vec<u8>),
    /// A handle-typed field, held as an index into the document's
    /// reference vector so resolution stays lazy.
    Ref(RefId),
    Color(Color),
    /// Repeated field (vector/array shape).
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Integer view of the value, when it has one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Bool(b) => Some(*b as i64),
            FieldValue::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    /// Floating-point view of the value, when it has one.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(d) => Some(*d),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// String view of the value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Reference view of the value.
    pub fn as_ref_id(&self) -> Option<RefId> {
        match self {
            FieldValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// 3D point view of the value.
    pub fn as_point3(&self) -> Option<Vector3> {
        match self {
            FieldValue::Point3(p) => Some(*p),
            FieldValue::Point2(p) => Some((*p).into()),
            _ => None,
        }
    }

    /// List view of the value.
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the value owns heap memory that the free pass must clear.
    pub fn owns_heap(&self) -> bool {
        matches!(
            self,
            FieldValue::Text(_) | FieldValue::Bytes(_) | FieldValue::List(_)
        ) || matches!(self, FieldValue::Color(c) if c.name.is_some() || c.book_name.is_some())
    }
}

/// Ordered map of field name → value for one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: IndexMap<&'static str, FieldValue>,
}

impl FieldMap {
    /// Create an empty field map.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Set a field value, replacing any previous value.
    pub fn set(&mut self, name: &'static str, value: FieldValue) {
        self.entries.insert(name, value);
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.get(name)
    }

    /// Get a mutable field value by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.entries.get_mut(name)
    }

    /// Integer field shortcut.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    /// Double field shortcut.
    pub fn double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_double)
    }

    /// Text field shortcut.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Reference field shortcut.
    pub fn ref_id(&self, name: &str) -> Option<RefId> {
        self.get(name).and_then(FieldValue::as_ref_id)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.entries.shift_remove(name)
    }

    /// Drop every stored value. Used by the free pass.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no fields are populated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut m = FieldMap::new();
        m.set("radius", FieldValue::Double(2.5));
        m.set("count", FieldValue::Int(3));
        assert_eq!(m.double("radius"), Some(2.5));
        assert_eq!(m.int("count"), Some(3));
        assert_eq!(m.int("missing"), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut m = FieldMap::new();
        m.set("b", FieldValue::Int(1));
        m.set("a", FieldValue::Int(2));
        m.set("c", FieldValue::Int(3));
        let names: Vec<_> = m.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(FieldValue::Bool(true).as_int(), Some(1));
        assert_eq!(FieldValue::Int(7).as_double(), Some(7.0));
    }

    #[test]
    fn test_owns_heap() {
        assert!(FieldValue::Text("x".into()).owns_heap());
        assert!(FieldValue::List(vec![]).owns_heap());
        assert!(!FieldValue::Double(1.0).owns_heap());
    }

    #[test]
    fn test_clear() {
        let mut m = FieldMap::new();
        m.set("name", FieldValue::Text("Layer0".into()));
        m.clear();
        assert!(m.is_empty());
    }
}
