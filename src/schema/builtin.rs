//! Built-in type schemas.
//!
//! One static table per supported type, in strict wire order. These are
//! data: the engine never special-cases a type name except for the
//! documented ragged constructs (HATCH boundary paths).
//!
//! Version windows follow the format's historical layout changes; the
//! window is the single source of truth for whether a field exists on the
//! wire for a given document version.

use crate::object::{FixedType, Supertype, TableKind};
use crate::schema::{FieldDescriptor, ObjectSchema, WireType};
use crate::types::version::DwgVersion;

use WireType::*;

const fn f(name: &'static str, wire: WireType, dxf: i16) -> FieldDescriptor {
    FieldDescriptor::new(name, wire, dxf)
}

// ---------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------

pub static LINE: ObjectSchema = ObjectSchema {
    name: "LINE",
    dxf_name: "LINE",
    subclass: "AcDbLine",
    fixedtype: FixedType::Line,
    supertype: Supertype::Entity,
    fields: &[
        f("start", P3BD, 10),
        f("end", P3BD, 11),
        f("thickness", BT, 39),
        f("extrusion", BE, 210),
    ],
};

pub static POINT: ObjectSchema = ObjectSchema {
    name: "POINT",
    dxf_name: "POINT",
    subclass: "AcDbPoint",
    fixedtype: FixedType::Point,
    supertype: Supertype::Entity,
    fields: &[
        f("location", P3BD, 10),
        f("thickness", BT, 39),
        f("extrusion", BE, 210),
        f("x_axis_angle", BD, 50),
    ],
};

pub static CIRCLE: ObjectSchema = ObjectSchema {
    name: "CIRCLE",
    dxf_name: "CIRCLE",
    subclass: "AcDbCircle",
    fixedtype: FixedType::Circle,
    supertype: Supertype::Entity,
    fields: &[
        f("center", P3BD, 10),
        f("radius", BD, 40),
        f("thickness", BT, 39),
        f("extrusion", BE, 210),
    ],
};

pub static ARC: ObjectSchema = ObjectSchema {
    name: "ARC",
    dxf_name: "ARC",
    subclass: "AcDbArc",
    fixedtype: FixedType::Arc,
    supertype: Supertype::Entity,
    fields: &[
        f("center", P3BD, 10),
        f("radius", BD, 40),
        f("thickness", BT, 39),
        f("extrusion", BE, 210),
        f("start_angle", BD, 50),
        f("end_angle", BD, 51),
    ],
};

pub static ELLIPSE: ObjectSchema = ObjectSchema {
    name: "ELLIPSE",
    dxf_name: "ELLIPSE",
    subclass: "AcDbEllipse",
    fixedtype: FixedType::Ellipse,
    supertype: Supertype::Entity,
    fields: &[
        f("center", P3BD, 10),
        f("major_axis", P3BD, 11),
        f("extrusion", BE, 210),
        f("axis_ratio", BD, 40),
        f("start_param", BD, 41),
        f("end_param", BD, 42),
    ],
};

pub static TEXT: ObjectSchema = ObjectSchema {
    name: "TEXT",
    dxf_name: "TEXT",
    subclass: "AcDbText",
    fixedtype: FixedType::Text,
    supertype: Supertype::Entity,
    fields: &[
        // Bit-mask of which optional fields carry non-default values;
        // synthesized by the backfill pass when absent in DXF text.
        f("dataflags", RC, 0).since(DwgVersion::AC1015),
        f("elevation", RD, 30),
        f("ins_pt", P2RD, 10),
        f("alignment_pt", P2RD, 11).optional(),
        f("extrusion", BE, 210),
        f("thickness", BT, 39),
        f("oblique_angle", RD, 51),
        f("rotation", RD, 50),
        f("height", RD, 40),
        f("width_factor", RD, 41),
        f("text_value", T, 1).owned(),
        f("generation", BS, 71),
        f("horiz_alignment", BS, 72),
        f("vert_alignment", BS, 73),
        f("style", H, 7).hcode(5).table(TableKind::Style),
    ],
};

pub static MTEXT: ObjectSchema = ObjectSchema {
    name: "MTEXT",
    dxf_name: "MTEXT",
    subclass: "AcDbMText",
    fixedtype: FixedType::MText,
    supertype: Supertype::Entity,
    fields: &[
        f("ins_pt", P3BD, 10),
        f("extrusion", BE, 210),
        f("x_axis_dir", P3BD, 11),
        f("rect_width", BD, 41),
        f("text_height", BD, 40),
        f("attachment", BS, 71),
        f("flow_dir", BS, 72),
        f("text", T, 1).owned(),
        f("linespace_style", BS, 73).since(DwgVersion::AC1015),
        f("linespace_factor", BD, 44).since(DwgVersion::AC1015),
        f("style", H, 7).hcode(5).table(TableKind::Style),
    ],
};

pub static INSERT: ObjectSchema = ObjectSchema {
    name: "INSERT",
    dxf_name: "INSERT",
    subclass: "AcDbBlockReference",
    fixedtype: FixedType::Insert,
    supertype: Supertype::Entity,
    fields: &[
        f("ins_pt", P3BD, 10),
        f("scale", P3BD, 41),
        f("rotation", BD, 50),
        f("has_attribs", B, 66),
        f("block_header", H, 2).hcode(5).table(TableKind::Block),
        f("seqend", H, 0).hcode(3).optional(),
    ],
};

pub static ATTRIB: ObjectSchema = ObjectSchema {
    name: "ATTRIB",
    dxf_name: "ATTRIB",
    subclass: "AcDbAttribute",
    fixedtype: FixedType::Attrib,
    supertype: Supertype::Entity,
    fields: &[
        f("dataflags", RC, 0).since(DwgVersion::AC1015),
        f("elevation", RD, 30),
        f("ins_pt", P2RD, 10),
        f("alignment_pt", P2RD, 11).optional(),
        f("extrusion", BE, 210),
        f("thickness", BT, 39),
        f("oblique_angle", RD, 51),
        f("rotation", RD, 50),
        f("height", RD, 40),
        f("width_factor", RD, 41),
        f("text_value", T, 1).owned(),
        f("generation", BS, 71),
        f("tag", T, 2).owned(),
        f("field_length", BS, 73),
        f("attrib_flags", RC, 70),
        f("style", H, 7).hcode(5).table(TableKind::Style),
    ],
};

pub static SEQEND: ObjectSchema = ObjectSchema {
    name: "SEQEND",
    dxf_name: "SEQEND",
    subclass: "",
    fixedtype: FixedType::Seqend,
    supertype: Supertype::Entity,
    fields: &[],
};

pub static BLOCK: ObjectSchema = ObjectSchema {
    name: "BLOCK",
    dxf_name: "BLOCK",
    subclass: "AcDbBlockBegin",
    fixedtype: FixedType::Block,
    supertype: Supertype::Entity,
    fields: &[f("name", T, 2).owned()],
};

pub static ENDBLK: ObjectSchema = ObjectSchema {
    name: "ENDBLK",
    dxf_name: "ENDBLK",
    subclass: "AcDbBlockEnd",
    fixedtype: FixedType::Endblk,
    supertype: Supertype::Entity,
    fields: &[],
};

pub static VERTEX_2D: ObjectSchema = ObjectSchema {
    name: "VERTEX_2D",
    dxf_name: "VERTEX",
    subclass: "AcDb2dVertex",
    fixedtype: FixedType::Vertex2D,
    supertype: Supertype::Entity,
    fields: &[
        f("flag", RC, 70),
        f("point", P3BD, 10),
        f("start_width", BD, 40),
        f("end_width", BD, 41),
        f("bulge", BD, 42),
        f("tangent_dir", BD, 50),
    ],
};

pub static POLYLINE_2D: ObjectSchema = ObjectSchema {
    name: "POLYLINE_2D",
    dxf_name: "POLYLINE",
    subclass: "AcDb2dPolyline",
    fixedtype: FixedType::Polyline2D,
    supertype: Supertype::Entity,
    fields: &[
        f("flag", BS, 70),
        f("curve_type", BS, 75),
        f("start_width", BD, 40),
        f("end_width", BD, 41),
        f("thickness", BT, 39),
        f("elevation", BD, 30),
        f("extrusion", BE, 210),
        // Pre-R2004 the owned vertices hang off a first/last chain;
        // R2004+ stores an explicit handle array.
        f("first_vertex", H, 0).hcode(4).until(DwgVersion::AC1015).optional(),
        f("last_vertex", H, 0).hcode(4).until(DwgVersion::AC1015).optional(),
        f("num_owned", BL, 0).since(DwgVersion::AC1018),
        f("vertex_handles", H, 0).hcode(3).count("num_owned").since(DwgVersion::AC1018),
        f("seqend", H, 0).hcode(3).optional(),
    ],
};

pub static LWPOLYLINE: ObjectSchema = ObjectSchema {
    name: "LWPOLYLINE",
    dxf_name: "LWPOLYLINE",
    subclass: "AcDbPolyline",
    fixedtype: FixedType::LwPolyline,
    supertype: Supertype::Entity,
    fields: &[
        f("flag", BS, 70),
        f("const_width", BD, 43),
        f("elevation", BD, 38),
        f("thickness", BT, 39),
        f("extrusion", BE, 210),
        f("num_points", BL, 90),
        f("points", P2RD, 10).count("num_points"),
        f("num_bulges", BL, 0),
        f("bulges", BD, 42).count("num_bulges"),
    ],
};

pub static SOLID: ObjectSchema = ObjectSchema {
    name: "SOLID",
    dxf_name: "SOLID",
    subclass: "AcDbTrace",
    fixedtype: FixedType::Solid,
    supertype: Supertype::Entity,
    fields: &[
        f("thickness", BT, 39),
        f("elevation", BD, 38),
        f("corner1", P2RD, 10),
        f("corner2", P2RD, 11),
        f("corner3", P2RD, 12),
        f("corner4", P2RD, 13),
        f("extrusion", BE, 210),
    ],
};

pub static HATCH: ObjectSchema = ObjectSchema {
    name: "HATCH",
    dxf_name: "HATCH",
    subclass: "AcDbHatch",
    fixedtype: FixedType::Hatch,
    supertype: Supertype::Entity,
    fields: &[
        f("name", T, 2).owned(),
        f("solid_fill", BS, 70),
        f("associative", BS, 71),
        f("num_paths", BL, 91),
        // "paths" is a ragged construct handled by a dedicated
        // sub-codec; it never appears here. See engine::hatch.
        f("style", BS, 75),
        f("pattern_type", BS, 76),
        f("pattern_angle", BD, 52).optional(),
        f("pattern_scale", BD, 41).optional(),
    ],
};

// ---------------------------------------------------------------------
// Table records
// ---------------------------------------------------------------------

pub static BLOCK_HEADER: ObjectSchema = ObjectSchema {
    name: "BLOCK_HEADER",
    dxf_name: "BLOCK_RECORD",
    subclass: "AcDbBlockTableRecord",
    fixedtype: FixedType::BlockHeader,
    supertype: Supertype::Object,
    fields: &[
        f("name", T, 2).owned(),
        f("flag", BS, 70),
        f("base_pt", P3BD, 10),
        f("xref_path", T, 1).owned().optional(),
        f("first_entity", H, 0).hcode(4).until(DwgVersion::AC1015).optional(),
        f("last_entity", H, 0).hcode(4).until(DwgVersion::AC1015).optional(),
        f("num_owned", BL, 0).since(DwgVersion::AC1018),
        f("entity_handles", H, 0).hcode(3).count("num_owned").since(DwgVersion::AC1018),
        f("block_entity", H, 0).hcode(3).optional(),
        f("endblk_entity", H, 0).hcode(3).optional(),
    ],
};

pub static LAYER: ObjectSchema = ObjectSchema {
    name: "LAYER",
    dxf_name: "LAYER",
    subclass: "AcDbLayerTableRecord",
    fixedtype: FixedType::Layer,
    supertype: Supertype::Object,
    fields: &[
        f("name", T, 2).owned(),
        f("flag", BS, 70),
        f("color", CMC, 62),
        f("plotflag", B, 290).since(DwgVersion::AC1015),
        f("linewt", RC, 370).since(DwgVersion::AC1015),
        f("ltype", H, 6).hcode(5).table(TableKind::LType),
        f("plotstyle", H, 390).hcode(5).since(DwgVersion::AC1015).optional(),
    ],
};

pub static LTYPE: ObjectSchema = ObjectSchema {
    name: "LTYPE",
    dxf_name: "LTYPE",
    subclass: "AcDbLinetypeTableRecord",
    fixedtype: FixedType::LType,
    supertype: Supertype::Object,
    fields: &[
        f("name", T, 2).owned(),
        f("flag", BS, 70),
        f("description", T, 3).owned(),
        f("pattern_len", BD, 40),
        f("alignment", RC, 72),
        f("num_dashes", RC, 73),
        f("dashes", BD, 49).count("num_dashes"),
    ],
};

pub static STYLE: ObjectSchema = ObjectSchema {
    name: "STYLE",
    dxf_name: "STYLE",
    subclass: "AcDbTextStyleTableRecord",
    fixedtype: FixedType::Style,
    supertype: Supertype::Object,
    fields: &[
        f("name", T, 2).owned(),
        f("flag", BS, 70),
        f("text_height", BD, 40),
        f("width_factor", BD, 41),
        f("oblique_angle", BD, 50),
        f("generation", RC, 71),
        f("last_height", BD, 42),
        f("font_file", T, 3).owned(),
        f("bigfont_file", T, 4).owned().optional(),
    ],
};

pub static APPID: ObjectSchema = ObjectSchema {
    name: "APPID",
    dxf_name: "APPID",
    subclass: "AcDbRegAppTableRecord",
    fixedtype: FixedType::AppId,
    supertype: Supertype::Object,
    fields: &[f("name", T, 2).owned(), f("flag", BS, 70)],
};

pub static DIMSTYLE: ObjectSchema = ObjectSchema {
    name: "DIMSTYLE",
    dxf_name: "DIMSTYLE",
    subclass: "AcDbDimStyleTableRecord",
    fixedtype: FixedType::DimStyle,
    supertype: Supertype::Object,
    fields: &[
        f("name", T, 2).owned(),
        f("flag", BS, 70),
        f("dim_scale", BD, 40),
        f("dim_asz", BD, 41),
        f("dim_exo", BD, 42),
        f("dim_exe", BD, 44),
        f("dim_txt", BD, 140),
        f("dim_gap", BD, 147).since(DwgVersion::AC1012),
        f("dim_tad", BS, 77),
        f("dim_txsty", H, 340).hcode(5).since(DwgVersion::AC1012).table(TableKind::Style).optional(),
    ],
};

// ---------------------------------------------------------------------
// Table control records
// ---------------------------------------------------------------------

const fn control_fields() -> [FieldDescriptor; 2] {
    [
        f("num_entries", BS, 70),
        f("entries", H, 0).hcode(2).count("num_entries"),
    ]
}

static CONTROL_FIELDS: [FieldDescriptor; 2] = control_fields();

pub static BLOCK_CONTROL: ObjectSchema = ObjectSchema {
    name: "BLOCK_CONTROL",
    dxf_name: "BLOCK_RECORD",
    subclass: "AcDbBlockTable",
    fixedtype: FixedType::BlockControl,
    supertype: Supertype::Object,
    fields: &[
        f("num_entries", BS, 70),
        f("entries", H, 0).hcode(2).count("num_entries"),
        // Model/Paper space live outside entries[]; the reconciliation
        // pass extracts them.
        f("model_space", H, 0).hcode(3).optional(),
        f("paper_space", H, 0).hcode(3).optional(),
    ],
};

pub static LAYER_CONTROL: ObjectSchema = ObjectSchema {
    name: "LAYER_CONTROL",
    dxf_name: "LAYER",
    subclass: "AcDbLayerTable",
    fixedtype: FixedType::LayerControl,
    supertype: Supertype::Object,
    fields: &CONTROL_FIELDS,
};

pub static STYLE_CONTROL: ObjectSchema = ObjectSchema {
    name: "STYLE_CONTROL",
    dxf_name: "STYLE",
    subclass: "AcDbTextStyleTable",
    fixedtype: FixedType::StyleControl,
    supertype: Supertype::Object,
    fields: &CONTROL_FIELDS,
};

pub static LTYPE_CONTROL: ObjectSchema = ObjectSchema {
    name: "LTYPE_CONTROL",
    dxf_name: "LTYPE",
    subclass: "AcDbLinetypeTable",
    fixedtype: FixedType::LTypeControl,
    supertype: Supertype::Object,
    fields: &[
        f("num_entries", BS, 70),
        f("entries", H, 0).hcode(2).count("num_entries"),
        f("bylayer", H, 0).hcode(3).optional(),
        f("byblock", H, 0).hcode(3).optional(),
    ],
};

pub static APPID_CONTROL: ObjectSchema = ObjectSchema {
    name: "APPID_CONTROL",
    dxf_name: "APPID",
    subclass: "AcDbRegAppTable",
    fixedtype: FixedType::AppIdControl,
    supertype: Supertype::Object,
    fields: &CONTROL_FIELDS,
};

pub static DIMSTYLE_CONTROL: ObjectSchema = ObjectSchema {
    name: "DIMSTYLE_CONTROL",
    dxf_name: "DIMSTYLE",
    subclass: "AcDbDimStyleTable",
    fixedtype: FixedType::DimStyleControl,
    supertype: Supertype::Object,
    fields: &CONTROL_FIELDS,
};

// ---------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------

pub static DICTIONARY: ObjectSchema = ObjectSchema {
    name: "DICTIONARY",
    dxf_name: "DICTIONARY",
    subclass: "AcDbDictionary",
    fixedtype: FixedType::Dictionary,
    supertype: Supertype::Object,
    fields: &[
        f("num_items", BL, 0),
        f("cloning", BS, 281).since(DwgVersion::AC1014),
        f("hard_owner", RC, 280).since(DwgVersion::AC1014),
        f("names", T, 3).count("num_items"),
        f("item_handles", H, 350).hcode(2).count("num_items"),
    ],
};

pub static XRECORD: ObjectSchema = ObjectSchema {
    name: "XRECORD",
    dxf_name: "XRECORD",
    subclass: "AcDbXrecord",
    fixedtype: FixedType::XRecord,
    supertype: Supertype::Object,
    fields: &[
        f("cloning", BS, 280).since(DwgVersion::AC1015),
        f("data_size", BL, 0),
        // The pair list is carried verbatim as a binary blob so unknown
        // content round-trips losslessly.
        f("data", TF, 310).count("data_size"),
    ],
};

pub static UNKNOWN_ENT: ObjectSchema = ObjectSchema {
    name: "UNKNOWN_ENT",
    dxf_name: "ACAD_PROXY_ENTITY",
    subclass: "",
    fixedtype: FixedType::UnknownEntity,
    supertype: Supertype::Entity,
    fields: &[],
};

pub static UNKNOWN_OBJ: ObjectSchema = ObjectSchema {
    name: "UNKNOWN_OBJ",
    dxf_name: "ACAD_PROXY_OBJECT",
    subclass: "",
    fixedtype: FixedType::UnknownObject,
    supertype: Supertype::Object,
    fields: &[],
};

/// Every built-in schema, in registry order.
pub static ALL: &[&ObjectSchema] = &[
    &LINE,
    &POINT,
    &CIRCLE,
    &ARC,
    &ELLIPSE,
    &TEXT,
    &MTEXT,
    &INSERT,
    &ATTRIB,
    &SEQEND,
    &BLOCK,
    &ENDBLK,
    &VERTEX_2D,
    &POLYLINE_2D,
    &LWPOLYLINE,
    &SOLID,
    &HATCH,
    &BLOCK_HEADER,
    &LAYER,
    &LTYPE,
    &STYLE,
    &APPID,
    &DIMSTYLE,
    &BLOCK_CONTROL,
    &LAYER_CONTROL,
    &STYLE_CONTROL,
    &LTYPE_CONTROL,
    &APPID_CONTROL,
    &DIMSTYLE_CONTROL,
    &DICTIONARY,
    &XRECORD,
    &UNKNOWN_ENT,
    &UNKNOWN_OBJ,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Repeat;

    #[test]
    fn test_all_schemas_registered() {
        assert!(ALL.len() >= 30);
    }

    #[test]
    fn test_count_fields_follow_their_size() {
        // every Count(sibling) must name an earlier field in the same
        // schema — the engine depends on strict declaration order
        for schema in ALL {
            for (i, d) in schema.fields.iter().enumerate() {
                if let Repeat::Count(sibling) = d.repeat {
                    let pos = schema
                        .fields
                        .iter()
                        .position(|s| s.name == sibling)
                        .unwrap_or_else(|| panic!("{}.{}: no sibling {}", schema.name, d.name, sibling));
                    assert!(pos < i, "{}.{} sized by later field", schema.name, d.name);
                }
            }
        }
    }

    #[test]
    fn test_field_names_unique() {
        for schema in ALL {
            for (i, d) in schema.fields.iter().enumerate() {
                assert!(
                    !schema.fields[..i].iter().any(|s| s.name == d.name),
                    "{} duplicates field {}",
                    schema.name,
                    d.name
                );
            }
        }
    }

    #[test]
    fn test_polyline_version_split() {
        let v2000 = DwgVersion::AC1015;
        let v2004 = DwgVersion::AC1018;
        assert!(POLYLINE_2D.field("first_vertex").unwrap().in_version(v2000));
        assert!(!POLYLINE_2D.field("first_vertex").unwrap().in_version(v2004));
        assert!(POLYLINE_2D.field("vertex_handles").unwrap().in_version(v2004));
        assert!(!POLYLINE_2D.field("vertex_handles").unwrap().in_version(v2000));
    }
}
