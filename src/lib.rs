//! # dwgcodec
//!
//! A pure Rust structural codec for CAD drawings: the DWG binary
//! container and DXF (ASCII and binary) front-ends over one shared,
//! schema-driven field engine.
//!
//! Instead of hand-written parse code per object type, every entity and
//! object is described by a static descriptor table (wire type, DXF
//! group code, version window, cardinality). The engine walks those
//! tables for decode, encode, and free alike, so the three passes can
//! never drift apart.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dwgcodec::dxf::{read_dxf_file, write_dxf};
//! use dwgcodec::dwg::read_dwg_file;
//!
//! // Read a drawing in either format
//! let mut doc = read_dwg_file("plan.dwg")?;
//!
//! // Walk the object graph
//! for obj in doc.objects() {
//!     println!("{} {:#X}", obj.dxf_name, obj.handle.value());
//! }
//!
//! // Convert to ASCII DXF
//! std::fs::write("plan.dxf", write_dxf(&mut doc)?)?;
//! # Ok::<(), dwgcodec::error::DwgError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`schema`] - static field descriptor tables, one per object type
//! - [`engine`] - the generic decode/encode/free passes over those tables
//! - [`codec`] - bit-stream primitives for the binary wire types
//! - [`document`] - the flat object graph with handle-based references
//! - [`dwg`] / [`dxf`] - container framing for each file format
//! - [`postprocess`] - name resolution, control reconciliation, repair

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod classes;
pub mod codec;
pub mod document;
pub mod dwg;
pub mod dxf;
pub mod engine;
pub mod error;
pub mod header;
pub mod notification;
pub mod object;
pub mod postprocess;
pub mod resolver;
pub mod schema;
pub mod types;
pub mod value;

// Re-export the everyday surface
pub use document::{Document, SummaryInfo};
pub use error::{DwgError, ErrorFlags, Result};
pub use object::{CadObject, FixedType, Supertype, TableKind};
pub use resolver::NameResolution;
pub use types::{Color, DwgVersion, Handle, HandleReference, Vector2, Vector3};
pub use value::{FieldValue, RefId};

pub use dwg::{read_dwg, read_dwg_file, write_dwg, write_dwg_file};
pub use dxf::{read_dxf, read_dxf_file, write_dxf, write_dxf_binary};

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
