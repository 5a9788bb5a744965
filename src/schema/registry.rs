//! Schema registry.
//!
//! Built once at first use from the static tables in
//! [`crate::schema::builtin`]. Dispatch by fixed wire-type code, by
//! normalized [`FixedType`], or by DXF record name — adding or removing a
//! type is a data change in `builtin`, never a code change here.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::object::FixedType;
use crate::schema::{builtin, ObjectSchema};

/// Index over all registered schemas.
pub struct SchemaRegistry {
    by_code: HashMap<i16, &'static ObjectSchema>,
    by_fixedtype: HashMap<FixedType, &'static ObjectSchema>,
    by_dxf_name: HashMap<&'static str, &'static ObjectSchema>,
}

impl SchemaRegistry {
    fn build() -> Self {
        let mut by_code = HashMap::new();
        let mut by_fixedtype = HashMap::new();
        let mut by_dxf_name = HashMap::new();
        for schema in builtin::ALL {
            if let Some(code) = schema.fixedtype.code() {
                by_code.insert(code, *schema);
            }
            by_fixedtype.insert(schema.fixedtype, *schema);
            // control records share their table's DXF record name with
            // the entries; the entry schema wins the name index and the
            // TABLES state machine picks controls explicitly
            by_dxf_name.entry(schema.dxf_name).or_insert(*schema);
        }
        Self {
            by_code,
            by_fixedtype,
            by_dxf_name,
        }
    }

    /// Schema for a raw wire type code.
    pub fn by_code(&self, code: i16) -> Option<&'static ObjectSchema> {
        self.by_code.get(&code).copied()
    }

    /// Schema for a normalized type.
    pub fn by_fixedtype(&self, fixedtype: FixedType) -> Option<&'static ObjectSchema> {
        self.by_fixedtype.get(&fixedtype).copied()
    }

    /// Schema for a DXF record name.
    pub fn by_dxf_name(&self, name: &str) -> Option<&'static ObjectSchema> {
        self.by_dxf_name.get(name).copied()
    }
}

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::build);

/// Look up the schema for a raw wire type code.
pub fn schema_for_code(code: i16) -> Option<&'static ObjectSchema> {
    REGISTRY.by_code(code)
}

/// Look up the schema for a normalized type.
pub fn schema_for_fixedtype(fixedtype: FixedType) -> Option<&'static ObjectSchema> {
    REGISTRY.by_fixedtype(fixedtype)
}

/// Look up the schema for a DXF record name (entity/object dispatch).
pub fn schema_for_dxf_name(name: &str) -> Option<&'static ObjectSchema> {
    REGISTRY.by_dxf_name(name)
}
