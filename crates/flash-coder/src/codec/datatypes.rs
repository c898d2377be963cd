//! Coders for geometry, color and gradient types.
//!
//! Bit-packed values (bounds, transforms) store a field width followed by
//! fields of that width and end on a byte boundary.

use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::numeric::{Fixed, max_signed_bits, signed_bits};
use crate::codec::{Coder, bits_to_bytes};
use crate::error::{DecodeError, EncodeError};
use crate::model::datatypes::{
    Bounds, Color, ColorTransform, CoordTransform, Gradient, GradientRecord, Interpolation, Spread,
};

/// Largest field width that fits a 5-bit size field.
const MAX_FIELD_BITS: u32 = 31;

/// Largest field width that fits the 4-bit color transform size field.
const MAX_CXFORM_BITS: u32 = 15;

/// Largest number of control points a gradient can hold.
const MAX_GRADIENT_RECORDS: usize = 15;

fn checked_width(field: &'static str, bits: u32, max: u32) -> Result<u32, EncodeError> {
    if bits > max {
        return Err(EncodeError::ValueOutOfRange { field, value: bits as i64, bits: max });
    }
    Ok(bits)
}

// =============================================================================
// BOUNDS
// =============================================================================

impl Bounds {
    fn field_bits(&self) -> u32 {
        max_signed_bits(&[self.min_x, self.max_x, self.min_y, self.max_y])
    }
}

impl Coder for Bounds {
    fn decode(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let n = reader.read_ubits(5, "bounds")?;
        let min_x = reader.read_sbits(n, "bounds")?;
        let max_x = reader.read_sbits(n, "bounds")?;
        let min_y = reader.read_sbits(n, "bounds")?;
        let max_y = reader.read_sbits(n, "bounds")?;
        reader.align_to_byte();
        Ok(Bounds { min_x, max_x, min_y, max_y })
    }

    fn prepare_to_encode(&self, _ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        Ok(bits_to_bytes(5 + 4 * self.field_bits() as usize))
    }

    fn encode(&self, writer: &mut Writer<'_>, _ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        let n = checked_width("bounds", self.field_bits(), MAX_FIELD_BITS)?;
        writer.write_bits(n, 5)?;
        writer.write_sbits(self.min_x, n)?;
        writer.write_sbits(self.max_x, n)?;
        writer.write_sbits(self.min_y, n)?;
        writer.write_sbits(self.max_y, n)?;
        writer.align_to_byte();
        Ok(())
    }
}

// =============================================================================
// COLOR
// =============================================================================

/// Reads a color with alpha regardless of context.
pub(crate) fn read_rgba(reader: &mut Reader<'_>) -> Result<Color, DecodeError> {
    let bytes = reader.read_bytes(4, "color")?;
    Ok(Color::rgba(bytes[0], bytes[1], bytes[2], bytes[3]))
}

/// Writes a color with alpha regardless of context.
pub(crate) fn write_rgba(writer: &mut Writer<'_>, color: Color) -> Result<(), EncodeError> {
    writer.write_bytes(&[color.red, color.green, color.blue, color.alpha])
}

/// Colors carry alpha only when the enclosing record set `transparent`.
impl Coder for Color {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        if ctx.transparent()? {
            read_rgba(reader)
        } else {
            let bytes = reader.read_bytes(3, "color")?;
            Ok(Color::rgb(bytes[0], bytes[1], bytes[2]))
        }
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        Ok(if ctx.transparent()? { 4 } else { 3 })
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        if ctx.transparent()? {
            write_rgba(writer, *self)
        } else {
            writer.write_bytes(&[self.red, self.green, self.blue])
        }
    }
}

// =============================================================================
// COORDINATE TRANSFORM
// =============================================================================

impl CoordTransform {
    fn scale_bits(&self) -> Option<u32> {
        self.scale.map(|(x, y)| max_signed_bits(&[x.0, y.0]))
    }

    fn rotate_bits(&self) -> Option<u32> {
        self.rotate.map(|(b, c)| max_signed_bits(&[b.0, c.0]))
    }

    fn translate_bits(&self) -> u32 {
        max_signed_bits(&[self.translate_x, self.translate_y])
    }

    fn bit_len(&self) -> usize {
        let pair = |bits: Option<u32>| bits.map_or(1, |n| 1 + 5 + 2 * n as usize);
        pair(self.scale_bits()) + pair(self.rotate_bits()) + 5 + 2 * self.translate_bits() as usize
    }
}

impl Coder for CoordTransform {
    fn decode(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let read_pair = |reader: &mut Reader<'_>| -> Result<Option<(Fixed, Fixed)>, DecodeError> {
            if !reader.read_bool("transform")? {
                return Ok(None);
            }
            let n = reader.read_ubits(5, "transform")?;
            Ok(Some((reader.read_fixed_bits(n, "transform")?, reader.read_fixed_bits(n, "transform")?)))
        };
        let scale = read_pair(reader)?;
        let rotate = read_pair(reader)?;
        let n = reader.read_ubits(5, "transform")?;
        let translate_x = reader.read_sbits(n, "transform")?;
        let translate_y = reader.read_sbits(n, "transform")?;
        reader.align_to_byte();
        Ok(CoordTransform { scale, rotate, translate_x, translate_y })
    }

    fn prepare_to_encode(&self, _ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        Ok(bits_to_bytes(self.bit_len()))
    }

    fn encode(&self, writer: &mut Writer<'_>, _ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        for (pair, bits) in [(self.scale, self.scale_bits()), (self.rotate, self.rotate_bits())] {
            match (pair, bits) {
                (Some((first, second)), Some(n)) => {
                    let n = checked_width("transform", n, MAX_FIELD_BITS)?;
                    writer.write_bool(true)?;
                    writer.write_bits(n, 5)?;
                    writer.write_fixed_bits(first, n)?;
                    writer.write_fixed_bits(second, n)?;
                }
                _ => writer.write_bool(false)?,
            }
        }
        let n = checked_width("transform", self.translate_bits(), MAX_FIELD_BITS)?;
        writer.write_bits(n, 5)?;
        writer.write_sbits(self.translate_x, n)?;
        writer.write_sbits(self.translate_y, n)?;
        writer.align_to_byte();
        Ok(())
    }
}

// =============================================================================
// COLOR TRANSFORM
// =============================================================================

impl ColorTransform {
    /// Identity multiply terms in 8.8 fixed point.
    pub const IDENTITY_MULTIPLY: [i16; 4] = [256, 256, 256, 256];

    fn terms(&self, transparent: bool) -> impl Iterator<Item = i32> + '_ {
        let count = if transparent { 4 } else { 3 };
        self.multiply
            .iter()
            .chain(self.add.iter())
            .flat_map(move |terms| terms[..count].iter().map(|v| *v as i32))
    }

    fn field_bits(&self, transparent: bool) -> u32 {
        self.terms(transparent).map(signed_bits).max().unwrap_or(0)
    }
}

/// Alpha terms are present only when the enclosing record set
/// `transparent`; otherwise they decode as identity.
impl Coder for ColorTransform {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let transparent = ctx.transparent()?;
        let has_add = reader.read_bool("color transform")?;
        let has_multiply = reader.read_bool("color transform")?;
        let n = reader.read_ubits(4, "color transform")?;

        let read_terms = |reader: &mut Reader<'_>, default_alpha: i16| -> Result<[i16; 4], DecodeError> {
            let mut terms = [0i16; 4];
            for term in terms.iter_mut().take(3) {
                *term = reader.read_sbits(n, "color transform")? as i16;
            }
            terms[3] = if transparent {
                reader.read_sbits(n, "color transform")? as i16
            } else {
                default_alpha
            };
            Ok(terms)
        };
        let multiply = if has_multiply { Some(read_terms(reader, 256)?) } else { None };
        let add = if has_add { Some(read_terms(reader, 0)?) } else { None };
        reader.align_to_byte();
        Ok(ColorTransform { multiply, add })
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        let transparent = ctx.transparent()?;
        let terms = self.terms(transparent).count();
        Ok(bits_to_bytes(6 + terms * self.field_bits(transparent) as usize))
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        let transparent = ctx.transparent()?;
        let n = checked_width("color transform", self.field_bits(transparent), MAX_CXFORM_BITS)?;
        writer.write_bool(self.add.is_some())?;
        writer.write_bool(self.multiply.is_some())?;
        writer.write_bits(n, 4)?;
        for term in self.terms(transparent) {
            writer.write_sbits(term, n)?;
        }
        writer.align_to_byte();
        Ok(())
    }
}

// =============================================================================
// GRADIENT
// =============================================================================

/// Decodes a gradient; `focal` selects the layout with a trailing focal
/// point, which only the fill style type reveals.
pub(crate) fn decode_gradient(
    reader: &mut Reader<'_>,
    ctx: &mut Context<'_>,
    focal: bool,
) -> Result<Gradient, DecodeError> {
    let spread = Spread::from_u8(reader.read_ubits(2, "gradient")? as u8);
    let interpolation = Interpolation::from_u8(reader.read_ubits(2, "gradient")? as u8);
    let count = reader.read_ubits(4, "gradient")? as usize;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let ratio = reader.read_byte("gradient ratio")?;
        let color = Color::decode(reader, ctx)?;
        records.push(GradientRecord { ratio, color });
    }
    let focal_point = if focal { Some(reader.read_fixed8("focal point")?) } else { None };
    Ok(Gradient { spread, interpolation, records, focal_point })
}

pub(crate) fn gradient_size(gradient: &Gradient, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    let color = Color::BLACK.prepare_to_encode(ctx)?;
    let focal = if gradient.focal_point.is_some() { 2 } else { 0 };
    Ok(1 + gradient.records.len() * (1 + color) + focal)
}

pub(crate) fn encode_gradient(
    gradient: &Gradient,
    writer: &mut Writer<'_>,
    ctx: &mut Context<'_>,
) -> Result<(), EncodeError> {
    if gradient.records.len() > MAX_GRADIENT_RECORDS {
        return Err(EncodeError::LengthExceedsLimit {
            field: "gradient records",
            len: gradient.records.len(),
            max: MAX_GRADIENT_RECORDS,
        });
    }
    writer.write_bits(gradient.spread as u32, 2)?;
    writer.write_bits(gradient.interpolation as u32, 2)?;
    writer.write_bits(gradient.records.len() as u32, 4)?;
    for record in &gradient.records {
        writer.write_byte(record.ratio)?;
        record.color.encode(writer, ctx)?;
    }
    if let Some(focal) = gradient.focal_point {
        writer.write_fixed8(focal)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::numeric::Fixed8;
    use crate::codec::test_support::roundtrip;

    #[test]
    fn test_bounds_known_bytes() {
        let bounds = Bounds::new(0, 0, 11000, 8000);
        let bytes = roundtrip(&bounds, |_| {});
        assert_eq!(bytes, [0x78, 0x00, 0x05, 0x5F, 0x00, 0x00, 0x0F, 0xA0, 0x00]);
    }

    #[test]
    fn test_empty_bounds_is_one_byte() {
        let bytes = roundtrip(&Bounds::default(), |_| {});
        assert_eq!(bytes, [0x00]);
    }

    #[test]
    fn test_color_follows_transparent_context() {
        let data = [10, 20, 30, 40];

        let mut ctx = Context::new();
        ctx.set_transparent(false);
        let mut reader = Reader::new(&data);
        let color = Color::decode(&mut reader, &mut ctx).unwrap();
        assert_eq!(color, Color::rgba(10, 20, 30, 255));
        assert_eq!(reader.position(), 3);

        ctx.set_transparent(true);
        let mut reader = Reader::new(&data);
        let color = Color::decode(&mut reader, &mut ctx).unwrap();
        assert_eq!(color, Color::rgba(10, 20, 30, 40));
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_opaque_context_drops_alpha() {
        let mut ctx = Context::new();
        ctx.set_transparent(false);

        let color = Color::rgba(10, 20, 30, 0x40);
        assert_eq!(color.prepare_to_encode(&mut ctx).unwrap(), 3);
        let mut writer = Writer::new();
        color.encode(&mut writer, &mut ctx).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes, [10, 20, 30]);
        let decoded = Color::decode(&mut Reader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(decoded, Color::rgba(10, 20, 30, 255));

        let cxform = ColorTransform { multiply: Some([128, 256, 64, 100]), add: Some([-10, 0, 10, 50]) };
        let mut writer = Writer::new();
        cxform.encode(&mut writer, &mut ctx).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), cxform.prepare_to_encode(&mut ctx).unwrap());
        let decoded = ColorTransform::decode(&mut Reader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(decoded, ColorTransform { multiply: Some([128, 256, 64, 256]), add: Some([-10, 0, 10, 0]) });
    }

    #[test]
    fn test_color_without_context_is_an_error() {
        let mut ctx = Context::new();
        let err = Color::decode(&mut Reader::new(&[0, 0, 0]), &mut ctx).unwrap_err();
        assert!(matches!(err, DecodeError::MissingContext(_)));
    }

    #[test]
    fn test_transform_roundtrip() {
        let identity = CoordTransform::default();
        assert_eq!(roundtrip(&identity, |_| {}), [0x00]);

        let full = CoordTransform {
            scale: Some((Fixed::ONE, Fixed(-0x8000))),
            rotate: Some((Fixed(0x1234), Fixed(-1))),
            translate_x: -200,
            translate_y: 4000,
        };
        roundtrip(&full, |_| {});
        roundtrip(&CoordTransform::translate(20, -20), |_| {});
    }

    #[test]
    fn test_color_transform_alpha_terms() {
        let cxform = ColorTransform {
            multiply: Some([128, 256, 64, 200]),
            add: Some([-10, 0, 10, 5]),
        };
        let with_alpha = roundtrip(&cxform, |ctx| {
            ctx.set_transparent(true);
        });

        let opaque = ColorTransform {
            multiply: Some([128, 256, 64, 256]),
            add: Some([-10, 0, 10, 0]),
        };
        let without_alpha = roundtrip(&opaque, |ctx| {
            ctx.set_transparent(false);
        });
        assert!(without_alpha.len() < with_alpha.len());
    }

    #[test]
    fn test_gradient_focal_point() {
        let gradient = Gradient {
            spread: Spread::Reflect,
            interpolation: Interpolation::Linear,
            records: vec![
                GradientRecord { ratio: 0, color: Color::rgb(255, 0, 0) },
                GradientRecord { ratio: 255, color: Color::rgb(0, 0, 255) },
            ],
            focal_point: Some(Fixed8(-0x80)),
        };
        let mut ctx = Context::new();
        ctx.set_transparent(false);
        let size = gradient_size(&gradient, &mut ctx).unwrap();
        let mut writer = Writer::new();
        encode_gradient(&gradient, &mut writer, &mut ctx).unwrap();
        assert_eq!(writer.len(), size);
        assert_eq!(writer.as_bytes()[0], 0b0101_0010);

        let bytes = writer.into_bytes();
        let decoded = decode_gradient(&mut Reader::new(&bytes), &mut ctx, true).unwrap();
        assert_eq!(decoded, gradient);
    }

    #[test]
    fn test_too_many_gradient_records() {
        let gradient = Gradient {
            records: vec![GradientRecord { ratio: 0, color: Color::BLACK }; 16],
            ..Gradient::default()
        };
        let mut ctx = Context::new();
        ctx.set_transparent(true);
        let err = encode_gradient(&gradient, &mut Writer::new(), &mut ctx).unwrap_err();
        assert!(matches!(err, EncodeError::LengthExceedsLimit { max: 15, .. }));
    }
}
