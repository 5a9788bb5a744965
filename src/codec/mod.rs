//! Bit-stream codec: the primitive wire types of the binary format.
//!
//! The field engine never touches bytes itself; it dispatches wire-type
//! tags to the primitives here. `BitWriter` mirrors every `BitReader`
//! primitive so encode/decode stay symmetric by construction.

pub mod crc;
pub mod reader;
pub mod writer;

pub use crc::crc16;
pub use reader::BitReader;
pub use writer::BitWriter;
