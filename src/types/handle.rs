//! Handles and handle references.
//!
//! A [`Handle`] is the absolute 64-bit identity of an object within a
//! document. On the wire a handle is carried as a [`HandleReference`]:
//! `|CODE (4 bits)|COUNTER (4 bits)|VALUE bytes (counter)|`. The code
//! decides whether the value is the absolute handle or an offset from a
//! base object's own handle.

use std::fmt;

/// A unique identifier for CAD objects.
///
/// Handle 0 is reserved and means "null reference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(u64);

impl Handle {
    /// The null/invalid handle (0).
    pub const NULL: Handle = Handle(0);

    /// Create a new handle from a u64 value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Handle(value)
    }

    /// Get the raw u64 value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Check if this is the null handle.
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Check if this is a valid (non-null) handle.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Number of bytes needed to encode the raw value (0 for null).
    pub fn byte_count(&self) -> u8 {
        let mut n = 0u8;
        let mut v = self.0;
        while v != 0 {
            n += 1;
            v >>= 8;
        }
        n
    }
}

impl From<u64> for Handle {
    fn from(value: u64) -> Self {
        Handle(value)
    }
}

impl From<Handle> for u64 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

impl fmt::LowerHex for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

/// Handle reference code as stored in the upper nibble of the first
/// handle byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReferenceKind {
    /// Undefined reference (code 0) — absolute
    Undefined = 0,
    /// Soft ownership (code 2) — absolute
    SoftOwnership = 2,
    /// Hard ownership (code 3) — absolute
    HardOwnership = 3,
    /// Soft pointer (code 4) — absolute
    SoftPointer = 4,
    /// Hard pointer (code 5) — absolute
    HardPointer = 5,
    /// base + 1 (code 6)
    Plus1 = 6,
    /// base - 1 (code 8)
    Minus1 = 8,
    /// base + value (code 0xA)
    PlusOffset = 0xA,
    /// base - value (code 0xC)
    MinusOffset = 0xC,
}

impl ReferenceKind {
    /// Try to create a reference kind from a raw code nibble.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Undefined),
            2 => Some(Self::SoftOwnership),
            3 => Some(Self::HardOwnership),
            4 => Some(Self::SoftPointer),
            5 => Some(Self::HardPointer),
            6 => Some(Self::Plus1),
            8 => Some(Self::Minus1),
            0xA => Some(Self::PlusOffset),
            0xC => Some(Self::MinusOffset),
            _ => None,
        }
    }

    /// Whether this kind carries an absolute handle value.
    pub fn is_absolute(&self) -> bool {
        matches!(
            self,
            Self::Undefined
                | Self::SoftOwnership
                | Self::HardOwnership
                | Self::SoftPointer
                | Self::HardPointer
        )
    }
}

/// A raw handle reference as read off the wire.
///
/// Must be resolved against a base handle (the referencing object's own
/// handle) to obtain the absolute target handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleReference {
    /// The reference code (upper nibble of the first byte).
    pub code: u8,
    /// Number of value bytes (lower nibble of the first byte).
    pub counter: u8,
    /// The raw value assembled from `counter` bytes.
    pub value: u64,
}

impl HandleReference {
    /// Create a new handle reference.
    pub fn new(code: u8, counter: u8, value: u64) -> Self {
        Self {
            code,
            counter,
            value,
        }
    }

    /// Build an absolute reference with the given code for writing.
    pub fn absolute(code: u8, handle: Handle) -> Self {
        Self {
            code,
            counter: handle.byte_count(),
            value: handle.value(),
        }
    }

    /// Resolve the absolute handle given the base (referencing) handle.
    ///
    /// Codes 0/2/3/4/5 are absolute; 6 and 8 are base±1; 0xA/0xC are
    /// base±value. Unknown codes are treated as absolute.
    pub fn resolve(&self, base: Handle) -> Handle {
        let base = base.value();
        let abs = match self.code {
            0 | 2 | 3 | 4 | 5 => self.value,
            6 => base.wrapping_add(1),
            8 => base.wrapping_sub(1),
            0xA => base.wrapping_add(self.value),
            0xC => base.wrapping_sub(self.value),
            _ => self.value,
        };
        Handle::new(abs)
    }

    /// The reference kind, if the code nibble is recognized.
    pub fn kind(&self) -> Option<ReferenceKind> {
        ReferenceKind::from_code(self.code)
    }

    /// Whether this is a null reference (absolute zero).
    pub fn is_null(&self) -> bool {
        self.counter == 0 && self.value == 0 && self.kind().map_or(true, |k| k.is_absolute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_basics() {
        let h = Handle::new(0x1234);
        assert_eq!(h.value(), 0x1234);
        assert!(h.is_valid());
        assert!(Handle::NULL.is_null());
    }

    #[test]
    fn test_handle_display() {
        let h = Handle::new(0xABCD);
        assert_eq!(format!("{}", h), "0xABCD");
        assert_eq!(format!("{:x}", h), "abcd");
    }

    #[test]
    fn test_byte_count() {
        assert_eq!(Handle::NULL.byte_count(), 0);
        assert_eq!(Handle::new(0xFF).byte_count(), 1);
        assert_eq!(Handle::new(0x100).byte_count(), 2);
        assert_eq!(Handle::new(0x12345678).byte_count(), 4);
    }

    #[test]
    fn test_kind_from_code() {
        assert_eq!(ReferenceKind::from_code(2), Some(ReferenceKind::SoftOwnership));
        assert_eq!(ReferenceKind::from_code(5), Some(ReferenceKind::HardPointer));
        assert_eq!(ReferenceKind::from_code(7), None);
    }

    #[test]
    fn test_resolve_absolute() {
        let r = HandleReference::new(4, 2, 0x1A2);
        assert_eq!(r.resolve(Handle::new(0x50)).value(), 0x1A2);
    }

    #[test]
    fn test_resolve_offsets() {
        assert_eq!(
            HandleReference::new(6, 0, 0).resolve(Handle::new(0x10)).value(),
            0x11
        );
        assert_eq!(
            HandleReference::new(8, 0, 0).resolve(Handle::new(0x10)).value(),
            0x0F
        );
        assert_eq!(
            HandleReference::new(0xA, 1, 5).resolve(Handle::new(0x10)).value(),
            0x15
        );
        assert_eq!(
            HandleReference::new(0xC, 1, 3).resolve(Handle::new(0x10)).value(),
            0x0D
        );
    }

    #[test]
    fn test_null_reference() {
        assert!(HandleReference::new(5, 0, 0).is_null());
        assert!(!HandleReference::new(5, 1, 7).is_null());
        // offset encodings are never null even with value 0
        assert!(!HandleReference::new(6, 0, 0).is_null());
    }
}
