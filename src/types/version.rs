//! Drawing file format versions.
//!
//! Every field in the per-type schemas carries a version window; the field
//! engine compares the document version against that window before touching
//! the wire. The enum is declared in chronological release order so the
//! derived `Ord` gives correct "since"/"until" comparisons.

use std::fmt;

use crate::error::{DwgError, Result};

/// A DWG/DXF format version, identified by its `$ACADVER` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DwgVersion {
    /// R11/R12
    AC1009,
    /// R13
    AC1012,
    /// R14
    AC1014,
    /// R2000
    AC1015,
    /// R2004
    AC1018,
    /// R2007
    AC1021,
    /// R2010
    AC1024,
    /// R2013
    AC1027,
    /// R2018
    AC1032,
}

impl DwgVersion {
    /// The oldest version the schemas describe.
    pub const OLDEST: DwgVersion = DwgVersion::AC1009;

    /// The newest supported version.
    pub const LATEST: DwgVersion = DwgVersion::AC1032;

    /// Parse a version from its `$ACADVER` / file magic string.
    pub fn from_str_code(code: &str) -> Result<Self> {
        match code.trim() {
            "AC1009" => Ok(Self::AC1009),
            // R13 pre-releases share the R13 wire layout.
            "AC1011" | "AC1012" => Ok(Self::AC1012),
            "AC1014" => Ok(Self::AC1014),
            "AC1015" => Ok(Self::AC1015),
            "AC1018" => Ok(Self::AC1018),
            "AC1021" => Ok(Self::AC1021),
            "AC1024" => Ok(Self::AC1024),
            "AC1027" => Ok(Self::AC1027),
            "AC1032" => Ok(Self::AC1032),
            other => Err(DwgError::UnsupportedVersion(other.to_string())),
        }
    }

    /// The `$ACADVER` string for this version.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AC1009 => "AC1009",
            Self::AC1012 => "AC1012",
            Self::AC1014 => "AC1014",
            Self::AC1015 => "AC1015",
            Self::AC1018 => "AC1018",
            Self::AC1021 => "AC1021",
            Self::AC1024 => "AC1024",
            Self::AC1027 => "AC1027",
            Self::AC1032 => "AC1032",
        }
    }

    /// Whether text on the wire is wide ("TU", UCS-2LE). True for R2007
    /// and newer; older versions use narrow code-page text ("TV").
    ///
    /// This is a property of the document, never of an individual field.
    pub fn is_unicode(&self) -> bool {
        *self >= DwgVersion::AC1021
    }

    /// Whether entities are chained through prev/next handles (pre-R2004)
    /// rather than explicit owned-handle arrays.
    pub fn uses_entity_chain(&self) -> bool {
        *self < DwgVersion::AC1018
    }
}

impl Default for DwgVersion {
    fn default() -> Self {
        DwgVersion::AC1032
    }
}

impl fmt::Display for DwgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chronological_order() {
        assert!(DwgVersion::AC1009 < DwgVersion::AC1012);
        assert!(DwgVersion::AC1015 < DwgVersion::AC1021);
        assert!(DwgVersion::AC1032 > DwgVersion::AC1027);
    }

    #[test]
    fn test_round_trip_str() {
        for v in [
            DwgVersion::AC1009,
            DwgVersion::AC1015,
            DwgVersion::AC1021,
            DwgVersion::AC1032,
        ] {
            assert_eq!(DwgVersion::from_str_code(v.as_str()).unwrap(), v);
        }
    }

    #[test]
    fn test_unicode_cutoff() {
        assert!(!DwgVersion::AC1018.is_unicode());
        assert!(DwgVersion::AC1021.is_unicode());
        assert!(DwgVersion::AC1032.is_unicode());
    }

    #[test]
    fn test_unknown_version() {
        assert!(DwgVersion::from_str_code("AC9999").is_err());
    }
}
