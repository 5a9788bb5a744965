//! The generic field engine.
//!
//! One interpreter, three passes. The same schema tables drive binary
//! decode ([`decode`]), binary encode ([`encode`]), and resource release
//! ([`free`]); a type is supported by writing its descriptor table, not
//! by writing three functions. The only constructs the engine
//! special-cases are the documented ragged ones (HATCH boundary paths,
//! [`hatch`]).
//!
//! Wire layout per object body, identical for every type:
//!
//! 1. extended data chain ([`eed`])
//! 2. common entity or common object block
//! 3. schema fields in descriptor order, version-gated
//! 4. ragged tails (HATCH paths)

pub mod decode;
pub mod eed;
pub mod encode;
pub mod free;
pub mod hatch;

pub use decode::decode_object_body;
pub use encode::encode_object_body;
pub use free::{free_document, free_object};

use crate::error::{DwgError, ErrorFlags, Result};
use crate::document::Document;

/// Allocation sanity cap for wire-declared array lengths.
///
/// A count above this is taken as corruption, not as a real allocation
/// request: the object is abandoned and [`ErrorFlags::OUT_OF_MEM`] set.
pub const MAX_SANE_COUNT: u64 = 0x100_0000;

/// Validate a wire-declared element count against the sanity cap.
pub(crate) fn checked_count(doc: &mut Document, count: i64) -> Result<usize> {
    if count < 0 || count as u64 > MAX_SANE_COUNT {
        doc.error_flags |= ErrorFlags::OUT_OF_MEM;
        return Err(DwgError::CountTooLarge(count.max(0) as u64));
    }
    Ok(count as usize)
}
