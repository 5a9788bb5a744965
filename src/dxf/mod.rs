//! The DXF text front-end.
//!
//! DXF carries the same object graph as the binary format as a stream of
//! `(group code, value)` pairs, in ASCII lines or a sentinel-prefixed
//! binary framing. Reader and writer both dispatch through the shared
//! field schemas, so anything the binary codec models round-trips through
//! text as well.

pub mod binary_reader;
pub mod code_pair;
pub mod reader;
pub mod text_reader;
pub mod writer;

pub use binary_reader::{BinaryPairReader, BINARY_SENTINEL};
pub use code_pair::{code_kind, CodeKind, CodePair, PairSink, PairSource, PairValue};
pub use reader::{read_dxf, read_dxf_file, read_dxf_with, ReadOptions};
pub use text_reader::TextPairReader;
pub use writer::{write_dxf, write_dxf_binary, BinaryPairWriter, TextPairWriter};
