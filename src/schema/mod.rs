//! Declarative per-type field schemas.
//!
//! A schema is an ordered list of [`FieldDescriptor`]s the generic field
//! engine walks for decode, encode, and free alike. Descriptors are
//! immutable static data; adding an object type means adding a table in
//! [`builtin`], not touching the engine.
//!
//! Two lookup directions exist and must agree: by field name (binary
//! decode order) and by DXF group code (text ingestion). See
//! [`ObjectSchema::field`] and [`ObjectSchema::field_by_dxf`].

pub mod builtin;
pub mod registry;

use bitflags::bitflags;

use crate::object::{FixedType, Supertype, TableKind};
use crate::types::version::DwgVersion;

pub use registry::{schema_for_code, schema_for_dxf_name, schema_for_fixedtype, SchemaRegistry};

/// Wire-type tag. Names follow the format's conventional bit-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Single bit.
    B,
    /// Two bits.
    BB,
    /// Raw byte.
    RC,
    /// Raw 16-bit little-endian.
    RS,
    /// Raw 32-bit little-endian.
    RL,
    /// Raw 64-bit little-endian.
    RLL,
    /// Bit-compressed 16-bit.
    BS,
    /// Bit-compressed 32-bit.
    BL,
    /// Bit-compressed 64-bit.
    BLL,
    /// Signed modular char.
    MC,
    /// Unsigned modular char.
    UMC,
    /// Modular short.
    MS,
    /// Raw IEEE double.
    RD,
    /// Bit-compressed double.
    BD,
    /// Double with default delta encoding.
    DD,
    /// Two raw doubles.
    P2RD,
    /// Two bit-compressed doubles.
    P2BD,
    /// Three bit-compressed doubles.
    P3BD,
    /// Extrusion vector (compressed to one bit when (0,0,1), R2000+).
    BE,
    /// Thickness (compressed to one bit when 0.0, R2000+).
    BT,
    /// Color (index + version-gated rgb/name/book).
    CMC,
    /// Handle reference.
    H,
    /// Text, TU or TV depending on the document version.
    T,
    /// Raw byte block sized by the repeat rule.
    TF,
}

/// How many times a field occurs on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Exactly once.
    One,
    /// A fixed number of times.
    Fixed(u32),
    /// Sized by an earlier sibling scalar field, by name.
    Count(&'static str),
}

bitflags! {
    /// Per-field behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u8 {
        /// The value owns heap memory the free pass must release.
        const OWNED = 1 << 0;
        /// Absent values are expected; resolution failures stay silent.
        const OPTIONAL = 1 << 1;
    }
}

/// One field in a type schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    /// Field name, unique within its schema.
    pub name: &'static str,
    /// Wire-type tag dispatched on by the engine.
    pub wire: WireType,
    /// DXF group code, 0 when the field has no DXF representation.
    pub dxf: i16,
    /// First version the field appears in (inclusive).
    pub from: DwgVersion,
    /// Last version the field appears in (inclusive).
    pub to: DwgVersion,
    /// Cardinality rule.
    pub repeat: Repeat,
    /// Reference code written for H fields.
    pub handle_code: u8,
    /// Table a symbolic DXF name for this field resolves against.
    pub table: Option<TableKind>,
    pub flags: FieldFlags,
}

impl FieldDescriptor {
    /// A scalar field present in every version.
    pub const fn new(name: &'static str, wire: WireType, dxf: i16) -> Self {
        Self {
            name,
            wire,
            dxf,
            from: DwgVersion::OLDEST,
            to: DwgVersion::LATEST,
            repeat: Repeat::One,
            handle_code: 5,
            table: None,
            flags: FieldFlags::empty(),
        }
    }

    /// Restrict the field to versions >= `v`.
    pub const fn since(mut self, v: DwgVersion) -> Self {
        self.from = v;
        self
    }

    /// Restrict the field to versions <= `v`.
    pub const fn until(mut self, v: DwgVersion) -> Self {
        self.to = v;
        self
    }

    /// Size the field by an earlier sibling scalar.
    pub const fn count(mut self, sibling: &'static str) -> Self {
        self.repeat = Repeat::Count(sibling);
        self.flags = self.flags.union(FieldFlags::OWNED);
        self
    }

    /// Repeat the field a fixed number of times.
    pub const fn fixed(mut self, n: u32) -> Self {
        self.repeat = Repeat::Fixed(n);
        self.flags = self.flags.union(FieldFlags::OWNED);
        self
    }

    /// Set the handle reference code written for this field.
    pub const fn hcode(mut self, code: u8) -> Self {
        self.handle_code = code;
        self
    }

    /// Resolve DXF symbolic names for this field against a table.
    pub const fn table(mut self, kind: TableKind) -> Self {
        self.table = Some(kind);
        self
    }

    /// Mark the value as heap-owning.
    pub const fn owned(mut self) -> Self {
        self.flags = self.flags.union(FieldFlags::OWNED);
        self
    }

    /// Mark the field as optional / best-effort.
    pub const fn optional(mut self) -> Self {
        self.flags = self.flags.union(FieldFlags::OPTIONAL);
        self
    }

    /// Whether the field is on the wire for the given version.
    pub fn in_version(&self, v: DwgVersion) -> bool {
        self.from <= v && v <= self.to
    }
}

/// A complete type schema.
#[derive(Debug)]
pub struct ObjectSchema {
    /// Engine-internal type name (matches the DXF record name for fixed
    /// types).
    pub name: &'static str,
    /// DXF record name emitted/matched in text sections.
    pub dxf_name: &'static str,
    /// `AcDb*` subclass marker for DXF group 100, empty when none.
    pub subclass: &'static str,
    pub fixedtype: FixedType,
    pub supertype: Supertype,
    /// Descriptors in strict wire order.
    pub fields: &'static [FieldDescriptor],
}

impl ObjectSchema {
    /// Look up a descriptor by field name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|d| d.name == name)
    }

    /// Look up a descriptor by DXF group code, honoring the version
    /// window so context-dependent reuse of a code lands on the right
    /// field.
    pub fn field_by_dxf(&self, code: i16, version: DwgVersion) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|d| d.dxf == code && d.dxf != 0 && d.in_version(version))
    }

    /// Descriptors visible for a version, in wire order.
    pub fn fields_for(&self, version: DwgVersion) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields.iter().filter(move |d| d.in_version(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new("num_verts", WireType::BL, 90),
        FieldDescriptor::new("verts", WireType::P2BD, 10).count("num_verts"),
        FieldDescriptor::new("style", WireType::H, 7).since(DwgVersion::AC1015),
    ];

    #[test]
    fn test_version_window() {
        let d = FIELDS[2];
        assert!(!d.in_version(DwgVersion::AC1014));
        assert!(d.in_version(DwgVersion::AC1015));
        assert!(d.in_version(DwgVersion::AC1032));
    }

    #[test]
    fn test_count_marks_owned() {
        assert!(FIELDS[1].flags.contains(FieldFlags::OWNED));
        assert_eq!(FIELDS[1].repeat, Repeat::Count("num_verts"));
    }

    #[test]
    fn test_dual_lookup_agreement() {
        let schema = ObjectSchema {
            name: "TEST",
            dxf_name: "TEST",
            subclass: "",
            fixedtype: FixedType::Line,
            supertype: Supertype::Entity,
            fields: FIELDS,
        };
        let by_name = schema.field("num_verts").unwrap();
        let by_code = schema.field_by_dxf(90, DwgVersion::AC1015).unwrap();
        assert_eq!(by_name.name, by_code.name);
        // out-of-window fields are not matched by code
        assert!(schema.field_by_dxf(7, DwgVersion::AC1012).is_none());
    }
}
