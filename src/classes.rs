//! The CLASSES section: application-defined class registrations.
//!
//! Class-based object types carry a raw type code of 500 or higher; the
//! code is only meaningful through this table, which maps it to a DXF
//! record name.

/// One class registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfClass {
    /// Raw wire type code assigned to the class (>= 500).
    pub class_number: i16,
    /// Proxy capability flags (DXF group 90).
    pub proxy_flags: i32,
    /// Registering application name.
    pub app_name: String,
    /// C++ class name (DXF group 1).
    pub cpp_name: String,
    /// DXF record name (DXF group 2).
    pub dxf_name: String,
    /// Whether instances are graphical entities.
    pub is_entity: bool,
    /// Was-a-proxy flag (DXF group 280).
    pub was_proxy: bool,
}

/// The lowest raw type code a class registration may use.
pub const FIRST_CLASS_NUMBER: i16 = 500;

/// The document's class table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassCollection {
    classes: Vec<DxfClass>,
}

impl ClassCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered classes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DxfClass> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Look up a class by its raw type code.
    pub fn by_number(&self, number: i16) -> Option<&DxfClass> {
        self.classes.iter().find(|c| c.class_number == number)
    }

    /// Look up a class by DXF record name.
    pub fn by_dxf_name(&self, name: &str) -> Option<&DxfClass> {
        self.classes.iter().find(|c| c.dxf_name == name)
    }

    /// Add a registration, keeping class numbers unique. An existing
    /// registration with the same DXF name wins and its number is
    /// returned.
    pub fn register(&mut self, mut class: DxfClass) -> i16 {
        if let Some(existing) = self.by_dxf_name(&class.dxf_name) {
            return existing.class_number;
        }
        if class.class_number < FIRST_CLASS_NUMBER {
            class.class_number = self.next_number();
        }
        let number = class.class_number;
        self.classes.push(class);
        number
    }

    /// The next unused class number.
    pub fn next_number(&self) -> i16 {
        self.classes
            .iter()
            .map(|c| c.class_number)
            .max()
            .map_or(FIRST_CLASS_NUMBER, |n| n + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> DxfClass {
        DxfClass {
            class_number: 0,
            proxy_flags: 0,
            app_name: "ObjectDBX Classes".into(),
            cpp_name: format!("AcDb{name}"),
            dxf_name: name.to_uppercase(),
            is_entity: false,
            was_proxy: false,
        }
    }

    #[test]
    fn test_register_assigns_numbers() {
        let mut classes = ClassCollection::new();
        let a = classes.register(sample("Wipeout"));
        let b = classes.register(sample("RasterImage"));
        assert_eq!(a, FIRST_CLASS_NUMBER);
        assert_eq!(b, FIRST_CLASS_NUMBER + 1);
        assert_eq!(classes.by_number(a).unwrap().dxf_name, "WIPEOUT");
    }

    #[test]
    fn test_register_is_idempotent_by_name() {
        let mut classes = ClassCollection::new();
        let a = classes.register(sample("Wipeout"));
        let again = classes.register(sample("Wipeout"));
        assert_eq!(a, again);
        assert_eq!(classes.len(), 1);
    }
}
