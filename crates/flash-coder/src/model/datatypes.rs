//! Geometry and color types shared by many records.
//!
//! Coordinates are in twips (1/20 of a pixel).

use crate::codec::numeric::{Fixed, Fixed8};

/// A rectangle in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, max_x, min_y, max_y }
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }
}

/// An RGBA color.
///
/// Whether the alpha channel is stored depends on the enclosing record;
/// colors decoded without one are opaque. Encoding into a record without
/// alpha writes only red, green and blue, so any alpha other than 255 is
/// lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue, alpha: 255 }
    }

    pub const fn rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self { red, green, blue, alpha }
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha == 255
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// An affine transform: scale, rotate/skew and translation.
///
/// Scale defaults to 1.0 and rotation to 0.0 when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordTransform {
    /// Scale terms (`a`, `d`), if stored.
    pub scale: Option<(Fixed, Fixed)>,
    /// Rotate/skew terms (`b`, `c`), if stored.
    pub rotate: Option<(Fixed, Fixed)>,
    /// Translation in twips.
    pub translate_x: i32,
    pub translate_y: i32,
}

impl CoordTransform {
    pub fn translate(x: i32, y: i32) -> Self {
        Self {
            translate_x: x,
            translate_y: y,
            ..Self::default()
        }
    }

    pub fn scaled(x: Fixed, y: Fixed) -> Self {
        Self {
            scale: Some((x, y)),
            ..Self::default()
        }
    }
}

/// A color transform: per-channel multiply then add.
///
/// The alpha terms are only stored when the enclosing record uses
/// transparent colors. Otherwise they are dropped on encode and decode as
/// the identity (multiply 256, add 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorTransform {
    /// Multiply terms (red, green, blue, alpha) in 8.8 fixed point.
    pub multiply: Option<[i16; 4]>,
    /// Add terms (red, green, blue, alpha).
    pub add: Option<[i16; 4]>,
}

/// How a gradient fills the area beyond its end points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Spread {
    #[default]
    Pad = 0,
    Reflect = 1,
    Repeat = 2,
    /// Reserved value, kept so it round-trips.
    Reserved = 3,
}

impl Spread {
    pub fn from_u8(v: u8) -> Spread {
        match v & 0x3 {
            0 => Spread::Pad,
            1 => Spread::Reflect,
            2 => Spread::Repeat,
            _ => Spread::Reserved,
        }
    }
}

/// Color space used to interpolate gradient colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Interpolation {
    #[default]
    Normal = 0,
    Linear = 1,
    Reserved2 = 2,
    Reserved3 = 3,
}

impl Interpolation {
    pub fn from_u8(v: u8) -> Interpolation {
        match v & 0x3 {
            0 => Interpolation::Normal,
            1 => Interpolation::Linear,
            2 => Interpolation::Reserved2,
            _ => Interpolation::Reserved3,
        }
    }
}

/// One control point of a gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientRecord {
    /// Position along the gradient, 0 to 255.
    pub ratio: u8,
    pub color: Color,
}

/// A gradient definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gradient {
    pub spread: Spread,
    pub interpolation: Interpolation,
    /// Up to 15 control points.
    pub records: Vec<GradientRecord>,
    /// Focal point, only stored for focal gradients.
    pub focal_point: Option<Fixed8>,
}
