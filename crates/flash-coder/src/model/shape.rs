//! Shapes: style arrays and the bit-packed records that draw outlines.

use crate::model::datatypes::{Color, CoordTransform, Gradient};

/// Kind of bitmap fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BitmapFillKind {
    RepeatingSmoothed = 0x40,
    ClippedSmoothed = 0x41,
    Repeating = 0x42,
    Clipped = 0x43,
}

impl BitmapFillKind {
    pub fn from_u8(v: u8) -> Option<BitmapFillKind> {
        match v {
            0x40 => Some(BitmapFillKind::RepeatingSmoothed),
            0x41 => Some(BitmapFillKind::ClippedSmoothed),
            0x42 => Some(BitmapFillKind::Repeating),
            0x43 => Some(BitmapFillKind::Clipped),
            _ => None,
        }
    }
}

/// How an area is filled. The first byte of each encoded style selects the
/// variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillStyle {
    Solid(Color),
    LinearGradient {
        transform: CoordTransform,
        gradient: Gradient,
    },
    RadialGradient {
        transform: CoordTransform,
        gradient: Gradient,
    },
    /// Radial gradient with a focal point; `gradient.focal_point` is set.
    FocalGradient {
        transform: CoordTransform,
        gradient: Gradient,
    },
    Bitmap {
        kind: BitmapFillKind,
        bitmap_id: u16,
        transform: CoordTransform,
    },
}

impl FillStyle {
    /// Returns the style type code for wire encoding.
    pub fn fill_type(&self) -> u8 {
        match self {
            FillStyle::Solid(_) => 0x00,
            FillStyle::LinearGradient { .. } => 0x10,
            FillStyle::RadialGradient { .. } => 0x12,
            FillStyle::FocalGradient { .. } => 0x13,
            FillStyle::Bitmap { kind, .. } => *kind as u8,
        }
    }
}

/// Width and color of an outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle {
    /// Width in twips.
    pub width: u16,
    pub color: Color,
}

/// Selects styles and moves the drawing point; may introduce new styles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShapeStyleChange {
    /// Absolute move target, in twips.
    pub move_to: Option<(i32, i32)>,
    /// 1-based index of the fill on the left of the path; 0 clears it.
    pub fill_style0: Option<u32>,
    /// 1-based index of the fill on the right of the path; 0 clears it.
    pub fill_style1: Option<u32>,
    /// 1-based index of the line style; 0 clears it.
    pub line_style: Option<u32>,
    /// Replacement style arrays. Indices in later records refer to these.
    pub new_styles: Option<(Vec<FillStyle>, Vec<LineStyle>)>,
}

/// A straight edge relative to the current drawing point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub dx: i32,
    pub dy: i32,
}

/// A quadratic Bezier edge relative to the current drawing point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curve {
    pub control_dx: i32,
    pub control_dy: i32,
    pub anchor_dx: i32,
    pub anchor_dy: i32,
}

/// One record of a shape outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeRecord {
    StyleChange(ShapeStyleChange),
    Line(Line),
    Curve(Curve),
}

/// A shape outline with the style arrays its records index into.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShapeWithStyle {
    pub fill_styles: Vec<FillStyle>,
    pub line_styles: Vec<LineStyle>,
    pub records: Vec<ShapeRecord>,
}
