//! The generic object graph node.
//!
//! Every node in the graph is a [`CadObject`]: the raw wire type code, a
//! normalized [`FixedType`], a [`Supertype`] deciding which common-field
//! layout applies, and the type-specific payload as a schema-driven
//! [`FieldMap`]. Entity and object common fields are a tagged enum — two
//! concrete structs sharing nothing by layout, only by value.

use crate::types::{Color, Handle};
use crate::value::{FieldMap, RefId};

/// The two top-level kinds of graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Supertype {
    /// Graphical entity (LINE, CIRCLE, ...).
    Entity,
    /// Non-graphical object (DICTIONARY, table records, ...).
    Object,
}

/// Table kinds that symbolic names can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    AppId,
    Block,
    DimStyle,
    Layer,
    LType,
    Style,
}

/// Normalized object type, distinct from the raw on-wire type code.
///
/// The numeric values are the fixed DWG type codes where one exists;
/// class-based and placeholder kinds have no stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedType {
    Unused,
    Text,
    Attrib,
    Block,
    Endblk,
    Seqend,
    Insert,
    Vertex2D,
    Polyline2D,
    Arc,
    Circle,
    Line,
    Point,
    Solid,
    Ellipse,
    Dictionary,
    MText,
    BlockControl,
    BlockHeader,
    LayerControl,
    Layer,
    StyleControl,
    Style,
    LTypeControl,
    LType,
    AppIdControl,
    AppId,
    DimStyleControl,
    DimStyle,
    LwPolyline,
    Hatch,
    XRecord,
    /// Entity with no registered schema; payload kept verbatim.
    UnknownEntity,
    /// Object with no registered schema; payload kept verbatim.
    UnknownObject,
    /// Stamp applied after a successful free pass.
    Freed,
}

impl FixedType {
    /// Fixed DWG wire type code, if this type has one.
    pub fn code(&self) -> Option<i16> {
        let code = match self {
            FixedType::Text => 0x01,
            FixedType::Attrib => 0x02,
            FixedType::Block => 0x04,
            FixedType::Endblk => 0x05,
            FixedType::Seqend => 0x06,
            FixedType::Insert => 0x07,
            FixedType::Vertex2D => 0x0A,
            FixedType::Polyline2D => 0x0F,
            FixedType::Arc => 0x11,
            FixedType::Circle => 0x12,
            FixedType::Line => 0x13,
            FixedType::Point => 0x1B,
            FixedType::Solid => 0x1F,
            FixedType::Ellipse => 0x23,
            FixedType::Dictionary => 0x2A,
            FixedType::MText => 0x2C,
            FixedType::BlockControl => 0x30,
            FixedType::BlockHeader => 0x31,
            FixedType::LayerControl => 0x32,
            FixedType::Layer => 0x33,
            FixedType::StyleControl => 0x34,
            FixedType::Style => 0x35,
            FixedType::LTypeControl => 0x38,
            FixedType::LType => 0x39,
            FixedType::AppIdControl => 0x42,
            FixedType::AppId => 0x43,
            FixedType::DimStyleControl => 0x44,
            FixedType::DimStyle => 0x45,
            FixedType::LwPolyline => 0x4D,
            FixedType::Hatch => 0x4E,
            FixedType::XRecord => 0x4F,
            _ => return None,
        };
        Some(code)
    }

    /// Normalize a raw wire type code.
    pub fn from_code(code: i16) -> Option<Self> {
        let t = match code {
            0x01 => FixedType::Text,
            0x02 => FixedType::Attrib,
            0x04 => FixedType::Block,
            0x05 => FixedType::Endblk,
            0x06 => FixedType::Seqend,
            0x07 => FixedType::Insert,
            0x0A => FixedType::Vertex2D,
            0x0F => FixedType::Polyline2D,
            0x11 => FixedType::Arc,
            0x12 => FixedType::Circle,
            0x13 => FixedType::Line,
            0x1B => FixedType::Point,
            0x1F => FixedType::Solid,
            0x23 => FixedType::Ellipse,
            0x2A => FixedType::Dictionary,
            0x2C => FixedType::MText,
            0x30 => FixedType::BlockControl,
            0x31 => FixedType::BlockHeader,
            0x32 => FixedType::LayerControl,
            0x33 => FixedType::Layer,
            0x34 => FixedType::StyleControl,
            0x35 => FixedType::Style,
            0x38 => FixedType::LTypeControl,
            0x39 => FixedType::LType,
            0x42 => FixedType::AppIdControl,
            0x43 => FixedType::AppId,
            0x44 => FixedType::DimStyleControl,
            0x45 => FixedType::DimStyle,
            0x4D => FixedType::LwPolyline,
            0x4E => FixedType::Hatch,
            0x4F => FixedType::XRecord,
            _ => return None,
        };
        Some(t)
    }

    /// Whether this is an unrecognized-class placeholder.
    pub fn is_unknown(&self) -> bool {
        matches!(self, FixedType::UnknownEntity | FixedType::UnknownObject)
    }

    /// Whether this is a table control record.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            FixedType::BlockControl
                | FixedType::LayerControl
                | FixedType::StyleControl
                | FixedType::LTypeControl
                | FixedType::AppIdControl
                | FixedType::DimStyleControl
        )
    }

    /// The table kind this record belongs to, for table entries.
    pub fn table_kind(&self) -> Option<TableKind> {
        match self {
            FixedType::BlockHeader => Some(TableKind::Block),
            FixedType::Layer => Some(TableKind::Layer),
            FixedType::Style => Some(TableKind::Style),
            FixedType::LType => Some(TableKind::LType),
            FixedType::AppId => Some(TableKind::AppId),
            FixedType::DimStyle => Some(TableKind::DimStyle),
            _ => None,
        }
    }

    /// The control record type owning entries of the given table kind.
    pub fn control_of(kind: TableKind) -> FixedType {
        match kind {
            TableKind::Block => FixedType::BlockControl,
            TableKind::Layer => FixedType::LayerControl,
            TableKind::Style => FixedType::StyleControl,
            TableKind::LType => FixedType::LTypeControl,
            TableKind::AppId => FixedType::AppIdControl,
            TableKind::DimStyle => FixedType::DimStyleControl,
        }
    }
}

/// A single value inside an extended-data record.
///
/// The discriminants are the DWG item codes; the DXF group code is the
/// item code plus 1000.
#[derive(Debug, Clone, PartialEq)]
pub enum EedValue {
    /// Item code 0 / DXF 1000.
    String(String),
    /// Item code 2 / DXF 1002: `{` (false) or `}` (true).
    ControlMarker(bool),
    /// Item code 4 / DXF 1004.
    Binary(Vec<u8>),
    /// Item code 5 / DXF 1005.
    Handle(Handle),
    /// Item code 10 / DXF 1010 (and 1020/1030 continuations).
    Point(crate::types::Vector3),
    /// Item code 40 / DXF 1040.
    Real(f64),
    /// Item code 70 / DXF 1070.
    Short(i16),
    /// Item code 71 / DXF 1071.
    Long(i32),
}

impl EedValue {
    /// The DWG item code for this value.
    pub fn item_code(&self) -> u8 {
        match self {
            EedValue::String(_) => 0,
            EedValue::ControlMarker(_) => 2,
            EedValue::Binary(_) => 4,
            EedValue::Handle(_) => 5,
            EedValue::Point(_) => 10,
            EedValue::Real(_) => 40,
            EedValue::Short(_) => 70,
            EedValue::Long(_) => 71,
        }
    }
}

/// One extended-data record: an APPID-tagged chain of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Eed {
    /// Reference to the owning APPID table record.
    pub app: RefId,
    /// The data values in wire order.
    pub values: Vec<EedValue>,
}

/// Common fields shared by all graphical entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCommon {
    /// Owning BLOCK_HEADER (or polyline for vertices).
    pub owner: Option<RefId>,
    /// Layer reference.
    pub layer: Option<RefId>,
    /// Linetype reference; `None` means ByLayer.
    pub linetype: Option<RefId>,
    pub color: Color,
    pub linetype_scale: f64,
    pub invisible: bool,
    /// True when the entity lives in paper space.
    pub paper_space: bool,
    /// Previous entity in the pre-R2004 block chain.
    pub prev_entity: Option<RefId>,
    /// Next entity in the pre-R2004 block chain.
    pub next_entity: Option<RefId>,
    pub eed: Vec<Eed>,
    pub reactors: Vec<RefId>,
    /// Extension dictionary owner handle.
    pub xdict: Option<RefId>,
}

impl EntityCommon {
    pub fn new() -> Self {
        Self {
            linetype_scale: 1.0,
            ..Default::default()
        }
    }
}

/// Common fields shared by all non-graphical objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectCommon {
    /// Owning object (dictionary or control record).
    pub owner: Option<RefId>,
    pub eed: Vec<Eed>,
    pub reactors: Vec<RefId>,
    pub xdict: Option<RefId>,
}

/// Tagged common-field storage. No layout aliasing: each supertype gets
/// its own struct and callers match on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Common {
    Entity(EntityCommon),
    Object(ObjectCommon),
}

impl Common {
    /// Create the appropriate empty common block for a supertype.
    pub fn for_supertype(supertype: Supertype) -> Self {
        match supertype {
            Supertype::Entity => Common::Entity(EntityCommon::new()),
            Supertype::Object => Common::Object(ObjectCommon::default()),
        }
    }

    /// The owner reference, whichever variant is active.
    pub fn owner(&self) -> Option<RefId> {
        match self {
            Common::Entity(e) => e.owner,
            Common::Object(o) => o.owner,
        }
    }

    /// Set the owner reference.
    pub fn set_owner(&mut self, owner: Option<RefId>) {
        match self {
            Common::Entity(e) => e.owner = owner,
            Common::Object(o) => o.owner = owner,
        }
    }

    /// The EED chain.
    pub fn eed(&self) -> &[Eed] {
        match self {
            Common::Entity(e) => &e.eed,
            Common::Object(o) => &o.eed,
        }
    }

    /// Mutable EED chain.
    pub fn eed_mut(&mut self) -> &mut Vec<Eed> {
        match self {
            Common::Entity(e) => &mut e.eed,
            Common::Object(o) => &mut o.eed,
        }
    }

    /// The reactor handle vector.
    pub fn reactors(&self) -> &[RefId] {
        match self {
            Common::Entity(e) => &e.reactors,
            Common::Object(o) => &o.reactors,
        }
    }

    /// Mutable reactor handle vector.
    pub fn reactors_mut(&mut self) -> &mut Vec<RefId> {
        match self {
            Common::Entity(e) => &mut e.reactors,
            Common::Object(o) => &mut o.reactors,
        }
    }

    /// The extension dictionary reference.
    pub fn xdict(&self) -> Option<RefId> {
        match self {
            Common::Entity(e) => e.xdict,
            Common::Object(o) => o.xdict,
        }
    }

    /// Set the extension dictionary reference.
    pub fn set_xdict(&mut self, xdict: Option<RefId>) {
        match self {
            Common::Entity(e) => e.xdict = xdict,
            Common::Object(o) => o.xdict = xdict,
        }
    }
}

/// A node in the object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CadObject {
    /// The object's own absolute handle.
    pub handle: Handle,
    /// Raw on-wire type code (class number for class-based types).
    pub raw_type: i16,
    /// Normalized type for dispatch.
    pub fixedtype: FixedType,
    pub supertype: Supertype,
    /// Schema identity; for unknown classes, the DXF record name seen.
    pub dxf_name: String,
    pub common: Common,
    /// Type-specific data, schema-driven.
    pub fields: FieldMap,
    /// Unparsed payload, kept for verbatim re-serialization of unknown
    /// classes.
    pub unknown_bits: Vec<u8>,
}

impl CadObject {
    /// Create a new object of the given type.
    pub fn new(fixedtype: FixedType, supertype: Supertype, dxf_name: impl Into<String>) -> Self {
        Self {
            handle: Handle::NULL,
            raw_type: fixedtype.code().unwrap_or(0),
            fixedtype,
            supertype,
            dxf_name: dxf_name.into(),
            common: Common::for_supertype(supertype),
            fields: FieldMap::new(),
            unknown_bits: Vec::new(),
        }
    }

    /// Whether this object has already been through the free pass.
    pub fn is_freed(&self) -> bool {
        self.fixedtype == FixedType::Freed
    }

    /// The table-record name, for table entries that carry one.
    pub fn record_name(&self) -> Option<&str> {
        self.fields.text("name")
    }

    /// Entity common fields, when this is an entity.
    pub fn entity(&self) -> Option<&EntityCommon> {
        match &self.common {
            Common::Entity(e) => Some(e),
            Common::Object(_) => None,
        }
    }

    /// Mutable entity common fields.
    pub fn entity_mut(&mut self) -> Option<&mut EntityCommon> {
        match &mut self.common {
            Common::Entity(e) => Some(e),
            Common::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for t in [
            FixedType::Line,
            FixedType::Circle,
            FixedType::BlockControl,
            FixedType::XRecord,
        ] {
            let code = t.code().unwrap();
            assert_eq!(FixedType::from_code(code), Some(t));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(FixedType::from_code(0x7FF), None);
        assert!(FixedType::UnknownEntity.code().is_none());
    }

    #[test]
    fn test_control_mapping() {
        assert!(FixedType::LTypeControl.is_control());
        assert!(!FixedType::LType.is_control());
        assert_eq!(FixedType::control_of(TableKind::Layer), FixedType::LayerControl);
        assert_eq!(FixedType::Layer.table_kind(), Some(TableKind::Layer));
    }

    #[test]
    fn test_common_accessors() {
        let mut obj = CadObject::new(FixedType::Line, Supertype::Entity, "LINE");
        assert!(obj.entity().is_some());
        obj.common.set_owner(Some(RefId(3)));
        assert_eq!(obj.common.owner(), Some(RefId(3)));
        obj.common.reactors_mut().push(RefId(1));
        assert_eq!(obj.common.reactors().len(), 1);
    }

    #[test]
    fn test_eed_item_codes() {
        assert_eq!(EedValue::String("x".into()).item_code(), 0);
        assert_eq!(EedValue::Handle(Handle::new(1)).item_code(), 5);
        assert_eq!(EedValue::Short(7).item_code(), 70);
    }
}
