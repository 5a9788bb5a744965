//! The binary container front-end.
//!
//! A drawing file is a locator-table header followed by sentinel-framed
//! sections: header variables, class registrations, the object data
//! area, and the handle/offset object map. Object bodies inside the data
//! area are decoded and encoded by the shared field engine; this module
//! only owns the framing around them.

pub mod file_header;
pub mod reader;
pub mod writer;

pub use file_header::{FileHeader, SectionLocator};
pub use reader::{read_dwg, read_dwg_file, read_dwg_with};
pub use writer::{write_dwg, write_dwg_file};
