//! Bitmap filters applied to placed display objects.
//!
//! Filter colors always carry alpha. Mode bytes are kept raw so reserved
//! bits survive a round trip; accessors decode the individual flags.

use crate::codec::numeric::{Fixed, Fixed8};
use crate::model::datatypes::Color;

/// Flag byte shared by the shadow, glow and bevel filters.
///
/// Bit 7: inner, bit 6: knockout, bit 5: composite source, bit 4: on top
/// (bevels only). The low bits hold the number of passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilterMode(pub u8);

impl FilterMode {
    pub const INNER: u8 = 0x80;
    pub const KNOCKOUT: u8 = 0x40;
    pub const COMPOSITE: u8 = 0x20;
    pub const ON_TOP: u8 = 0x10;

    pub fn inner(&self) -> bool {
        self.0 & Self::INNER != 0
    }

    pub fn knockout(&self) -> bool {
        self.0 & Self::KNOCKOUT != 0
    }

    pub fn composite(&self) -> bool {
        self.0 & Self::COMPOSITE != 0
    }

    pub fn on_top(&self) -> bool {
        self.0 & Self::ON_TOP != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropShadowFilter {
    pub color: Color,
    pub blur_x: Fixed,
    pub blur_y: Fixed,
    pub angle: Fixed,
    pub distance: Fixed,
    pub strength: Fixed8,
    pub mode: FilterMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurFilter {
    pub blur_x: Fixed,
    pub blur_y: Fixed,
    /// Passes in the upper five bits; the low three are reserved.
    pub passes: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlowFilter {
    pub color: Color,
    pub blur_x: Fixed,
    pub blur_y: Fixed,
    pub strength: Fixed8,
    pub mode: FilterMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BevelFilter {
    pub shadow: Color,
    pub highlight: Color,
    pub blur_x: Fixed,
    pub blur_y: Fixed,
    pub angle: Fixed,
    pub distance: Fixed,
    pub strength: Fixed8,
    pub mode: FilterMode,
}

/// Layout shared by gradient glow and gradient bevel filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradientFilter {
    /// Colors paired with their ratio along the gradient.
    pub stops: Vec<(Color, u8)>,
    pub blur_x: Fixed,
    pub blur_y: Fixed,
    pub angle: Fixed,
    pub distance: Fixed,
    pub strength: Fixed8,
    pub mode: FilterMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionFilter {
    pub columns: u8,
    pub rows: u8,
    pub divisor: f32,
    pub bias: f32,
    /// `columns * rows` coefficients, row by row.
    pub matrix: Vec<f32>,
    pub default_color: Color,
    /// Bit 1: clamp, bit 0: preserve alpha.
    pub flags: u8,
}

/// A filter applied to a display object. The first byte of each encoded
/// filter selects the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    DropShadow(DropShadowFilter),
    Blur(BlurFilter),
    Glow(GlowFilter),
    Bevel(BevelFilter),
    GradientGlow(GradientFilter),
    Convolution(ConvolutionFilter),
    /// 4x5 color matrix, row by row.
    ColorMatrix([f32; 20]),
    GradientBevel(GradientFilter),
}

impl Filter {
    /// Returns the filter type code for wire encoding.
    pub fn filter_type(&self) -> u8 {
        match self {
            Filter::DropShadow(_) => 0,
            Filter::Blur(_) => 1,
            Filter::Glow(_) => 2,
            Filter::Bevel(_) => 3,
            Filter::GradientGlow(_) => 4,
            Filter::Convolution(_) => 5,
            Filter::ColorMatrix(_) => 6,
            Filter::GradientBevel(_) => 7,
        }
    }
}
