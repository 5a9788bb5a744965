//! Core value types shared across the object model and the wire codecs.

pub mod color;
pub mod handle;
pub mod vector;
pub mod version;

pub use color::Color;
pub use handle::{Handle, HandleReference, ReferenceKind};
pub use vector::{Vector2, Vector3};
pub use version::DwgVersion;
