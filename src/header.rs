//! Document header variables.
//!
//! Header variables get the same field-engine treatment as an object: a
//! declarative descriptor list in strict wire order, populated into a
//! [`FieldMap`]. In DXF text the variables are matched by `$NAME`; in the
//! binary format they are read/written in descriptor order, version
//! windows included.

use crate::object::TableKind;
use crate::schema::{FieldDescriptor, WireType};
use crate::types::version::DwgVersion;
use crate::value::{FieldMap, FieldValue};

use WireType::*;

const fn f(name: &'static str, wire: WireType, dxf: i16) -> FieldDescriptor {
    FieldDescriptor::new(name, wire, dxf)
}

/// Header variable descriptors, in binary wire order.
///
/// The `dxf` code is the value group code used after `9 $NAME` in the
/// HEADER section. Fields with dxf 0 have no DXF representation.
pub static HEADER_FIELDS: &[FieldDescriptor] = &[
    f("REQUIREDVERSIONS", BLL, 160).since(DwgVersion::AC1027),
    f("DIMASO", B, 70).until(DwgVersion::AC1014),
    f("DIMSHO", B, 70).until(DwgVersion::AC1014),
    f("PLINEGEN", B, 70),
    f("ORTHOMODE", B, 70),
    f("REGENMODE", B, 70),
    f("FILLMODE", B, 70),
    f("QTEXTMODE", B, 70),
    f("PSLTSCALE", B, 70),
    f("MIRRTEXT", B, 70),
    f("LTSCALE", BD, 40),
    f("TEXTSIZE", BD, 40),
    f("TRACEWID", BD, 40),
    f("PDSIZE", BD, 40),
    f("PDMODE", BS, 70),
    f("USERI1", BS, 70),
    f("USERR1", BD, 40),
    f("CELTSCALE", BD, 40).since(DwgVersion::AC1012),
    f("CECOLOR", CMC, 62),
    f("INSUNITS", BS, 70).since(DwgVersion::AC1015),
    f("PSVPSCALE", BD, 40).since(DwgVersion::AC1015),
    // HANDSEED's "target" is the next free handle, not an object.
    f("HANDSEED", H, 5).hcode(0).optional(),
    f("CLAYER", H, 8).hcode(5).table(TableKind::Layer),
    f("TEXTSTYLE", H, 7).hcode(5).table(TableKind::Style),
    f("CELTYPE", H, 6).hcode(5).table(TableKind::LType),
    f("DIMSTYLE", H, 2).hcode(5).table(TableKind::DimStyle),
    f("BLOCK_CONTROL", H, 0).hcode(3),
    f("LAYER_CONTROL", H, 0).hcode(3),
    f("STYLE_CONTROL", H, 0).hcode(3),
    f("LTYPE_CONTROL", H, 0).hcode(3),
    f("APPID_CONTROL", H, 0).hcode(3),
    f("DIMSTYLE_CONTROL", H, 0).hcode(3),
    f("DICTIONARY_NAMED_OBJECT", H, 0).hcode(3),
    f("LTYPE_BYLAYER", H, 0).hcode(5),
    f("LTYPE_BYBLOCK", H, 0).hcode(5),
    f("LTYPE_CONTINUOUS", H, 0).hcode(5),
    f("MODEL_SPACE", H, 0).hcode(3),
    f("PAPER_SPACE", H, 0).hcode(3),
];

/// Look up a header descriptor by variable name (no `$` prefix).
pub fn header_field(name: &str) -> Option<&'static FieldDescriptor> {
    HEADER_FIELDS.iter().find(|d| d.name == name)
}

/// The populated header variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderVariables {
    pub fields: FieldMap,
}

impl HeaderVariables {
    /// Fresh header with document defaults.
    pub fn with_defaults() -> Self {
        let mut fields = FieldMap::new();
        fields.set("PLINEGEN", FieldValue::Bool(false));
        fields.set("ORTHOMODE", FieldValue::Bool(false));
        fields.set("REGENMODE", FieldValue::Bool(true));
        fields.set("FILLMODE", FieldValue::Bool(true));
        fields.set("QTEXTMODE", FieldValue::Bool(false));
        fields.set("PSLTSCALE", FieldValue::Bool(true));
        fields.set("MIRRTEXT", FieldValue::Bool(false));
        fields.set("LTSCALE", FieldValue::Double(1.0));
        fields.set("TEXTSIZE", FieldValue::Double(2.5));
        fields.set("TRACEWID", FieldValue::Double(1.0));
        fields.set("PDSIZE", FieldValue::Double(0.0));
        fields.set("PDMODE", FieldValue::Int(0));
        fields.set("CELTSCALE", FieldValue::Double(1.0));
        fields.set("CECOLOR", FieldValue::Color(crate::types::Color::by_layer()));
        fields.set("INSUNITS", FieldValue::Int(4));
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert!(header_field("LTSCALE").is_some());
        assert!(header_field("$LTSCALE").is_none());
        assert!(header_field("NOPE").is_none());
    }

    #[test]
    fn test_version_windows() {
        let d = header_field("INSUNITS").unwrap();
        assert!(!d.in_version(DwgVersion::AC1014));
        assert!(d.in_version(DwgVersion::AC1015));
        let d = header_field("DIMASO").unwrap();
        assert!(d.in_version(DwgVersion::AC1012));
        assert!(!d.in_version(DwgVersion::AC1015));
    }

    #[test]
    fn test_defaults() {
        let h = HeaderVariables::with_defaults();
        assert_eq!(h.fields.double("LTSCALE"), Some(1.0));
        assert_eq!(h.fields.int("INSUNITS"), Some(4));
    }
}
