//! Color values (the "CMC" wire type).
//!
//! A color always carries an ACI index; since R2004 (AC1018) it may also
//! carry a true-color RGB value and, flag-gated, a color name and book
//! name. The sub-field presence is version-gated by the codec, not here.

/// A CAD color value.
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    /// ACI color index. 0 = ByBlock, 256 = ByLayer.
    pub index: i16,
    /// True-color RGB (`0x00RRGGBB`), present since AC1018.
    pub rgb: Option<u32>,
    /// Name/book presence flags as stored on the wire (bit 0 = name,
    /// bit 1 = book name).
    pub flag: u8,
    /// Color name, flag-gated, AC1018+.
    pub name: Option<String>,
    /// Color book name, flag-gated, AC1018+.
    pub book_name: Option<String>,
}

impl Color {
    /// ACI index for ByBlock.
    pub const BY_BLOCK_INDEX: i16 = 0;
    /// ACI index for ByLayer.
    pub const BY_LAYER_INDEX: i16 = 256;

    /// A plain indexed color.
    pub const fn by_index(index: i16) -> Self {
        Self {
            index,
            rgb: None,
            flag: 0,
            name: None,
            book_name: None,
        }
    }

    /// The ByLayer color.
    pub const fn by_layer() -> Self {
        Self::by_index(Self::BY_LAYER_INDEX)
    }

    /// The ByBlock color.
    pub const fn by_block() -> Self {
        Self::by_index(Self::BY_BLOCK_INDEX)
    }

    /// A true color from RGB components.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            index: 0,
            rgb: Some(((r as u32) << 16) | ((g as u32) << 8) | b as u32),
            flag: 0,
            name: None,
            book_name: None,
        }
    }

    /// Whether this is the ByLayer color.
    pub fn is_by_layer(&self) -> bool {
        self.index == Self::BY_LAYER_INDEX && self.rgb.is_none()
    }

    /// Whether this is the ByBlock color.
    pub fn is_by_block(&self) -> bool {
        self.index == Self::BY_BLOCK_INDEX && self.rgb.is_none()
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::by_layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert!(Color::default().is_by_layer());
        assert!(Color::by_block().is_by_block());
    }

    #[test]
    fn test_rgb_packing() {
        let c = Color::from_rgb(0x12, 0x34, 0x56);
        assert_eq!(c.rgb, Some(0x123456));
        assert!(!c.is_by_layer());
    }
}
