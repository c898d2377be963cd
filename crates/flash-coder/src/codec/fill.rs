//! Coders for fill styles, line styles and the style arrays of a shape.

use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::datatypes::{decode_gradient, encode_gradient, gradient_size};
use crate::codec::registry::Factory;
use crate::codec::Coder;
use crate::error::{DecodeError, EncodeError};
use crate::limits::{ARRAY_LENGTH_ESCAPE, MAX_EXTENDED_ARRAY_LEN};
use crate::model::datatypes::{Color, CoordTransform};
use crate::model::shape::{BitmapFillKind, FillStyle, LineStyle};

const SOLID: u8 = 0x00;
const LINEAR: u8 = 0x10;
const RADIAL: u8 = 0x12;
const FOCAL: u8 = 0x13;

/// Fill styles are keyed by their first byte.
pub(crate) fn fill_type(reader: &Reader<'_>) -> Result<u16, DecodeError> {
    reader.scan_byte().map(u16::from)
}

pub(crate) fn register_defaults(factory: &mut Factory<FillStyle>) {
    factory.register(SOLID as u16, decode_solid);
    factory.register(LINEAR as u16, decode_gradient_fill);
    factory.register(RADIAL as u16, decode_gradient_fill);
    factory.register(FOCAL as u16, decode_gradient_fill);
    for kind in 0x40..=0x43 {
        factory.register(kind, decode_bitmap);
    }
}

fn decode_solid(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<FillStyle, DecodeError> {
    reader.read_byte("fill type")?;
    Ok(FillStyle::Solid(Color::decode(reader, ctx)?))
}

fn decode_gradient_fill(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<FillStyle, DecodeError> {
    let fill_type = reader.read_byte("fill type")?;
    let transform = CoordTransform::decode(reader, ctx)?;
    let gradient = decode_gradient(reader, ctx, fill_type == FOCAL)?;
    Ok(match fill_type {
        LINEAR => FillStyle::LinearGradient { transform, gradient },
        RADIAL => FillStyle::RadialGradient { transform, gradient },
        _ => FillStyle::FocalGradient { transform, gradient },
    })
}

fn decode_bitmap(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<FillStyle, DecodeError> {
    let code = reader.read_byte("fill type")?;
    let kind = BitmapFillKind::from_u8(code).ok_or(DecodeError::UnsupportedVariant {
        family: "fill style",
        code: code as u16,
        location: reader.location(),
    })?;
    let bitmap_id = reader.read_u16("bitmap id")?;
    let transform = CoordTransform::decode(reader, ctx)?;
    Ok(FillStyle::Bitmap { kind, bitmap_id, transform })
}

impl Coder for FillStyle {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let registry = ctx.registry()?;
        registry.fill_styles.get_object(reader, ctx)
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        let body = match self {
            FillStyle::Solid(color) => color.prepare_to_encode(ctx)?,
            FillStyle::LinearGradient { transform, gradient }
            | FillStyle::RadialGradient { transform, gradient }
            | FillStyle::FocalGradient { transform, gradient } => {
                transform.prepare_to_encode(ctx)? + gradient_size(gradient, ctx)?
            }
            FillStyle::Bitmap { transform, .. } => 2 + transform.prepare_to_encode(ctx)?,
        };
        Ok(1 + body)
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        writer.write_byte(self.fill_type())?;
        match self {
            FillStyle::Solid(color) => color.encode(writer, ctx),
            FillStyle::LinearGradient { transform, gradient }
            | FillStyle::RadialGradient { transform, gradient }
            | FillStyle::FocalGradient { transform, gradient } => {
                transform.encode(writer, ctx)?;
                encode_gradient(gradient, writer, ctx)
            }
            FillStyle::Bitmap { bitmap_id, transform, .. } => {
                writer.write_u16(*bitmap_id)?;
                transform.encode(writer, ctx)
            }
        }
    }
}

impl Coder for LineStyle {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let width = reader.read_u16("line width")?;
        let color = Color::decode(reader, ctx)?;
        Ok(LineStyle { width, color })
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        Ok(2 + self.color.prepare_to_encode(ctx)?)
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        writer.write_u16(self.width)?;
        self.color.encode(writer, ctx)
    }
}

// =============================================================================
// STYLE ARRAYS
// =============================================================================

/// Reads a style array count: one byte, where 0xFF escapes to a 16-bit
/// count if the enclosing shape allows extended arrays.
fn read_count(reader: &mut Reader<'_>, ctx: &Context<'_>) -> Result<usize, DecodeError> {
    let count = reader.read_byte("style count")?;
    if count == ARRAY_LENGTH_ESCAPE && ctx.array_extended()? {
        return Ok(reader.read_u16("style count")? as usize);
    }
    Ok(count as usize)
}

fn count_size(len: usize, ctx: &Context<'_>) -> Result<usize, EncodeError> {
    let extended = ctx.array_extended()?;
    Ok(if extended && len >= ARRAY_LENGTH_ESCAPE as usize { 3 } else { 1 })
}

fn write_count(writer: &mut Writer<'_>, len: usize, ctx: &Context<'_>) -> Result<(), EncodeError> {
    let extended = ctx.array_extended()?;
    let max = if extended { MAX_EXTENDED_ARRAY_LEN } else { u8::MAX as usize };
    if len > max {
        return Err(EncodeError::LengthExceedsLimit { field: "style array", len, max });
    }
    if extended && len >= ARRAY_LENGTH_ESCAPE as usize {
        writer.write_byte(ARRAY_LENGTH_ESCAPE)?;
        writer.write_u16(len as u16)
    } else {
        writer.write_byte(len as u8)
    }
}

fn decode_array<T: Coder>(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Vec<T>, DecodeError> {
    let count = read_count(reader, ctx)?;
    let mut items = Vec::with_capacity(count.min(reader.remaining_len()));
    for _ in 0..count {
        items.push(T::decode(reader, ctx)?);
    }
    Ok(items)
}

fn array_size<T: Coder>(items: &[T], ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    let mut size = count_size(items.len(), ctx)?;
    for item in items {
        size += item.prepare_to_encode(ctx)?;
    }
    Ok(size)
}

fn encode_array<T: Coder>(items: &[T], writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
    write_count(writer, items.len(), ctx)?;
    for item in items {
        item.encode(writer, ctx)?;
    }
    Ok(())
}

/// Decodes a fill style array followed by a line style array.
pub(crate) fn decode_styles(
    reader: &mut Reader<'_>,
    ctx: &mut Context<'_>,
) -> Result<(Vec<FillStyle>, Vec<LineStyle>), DecodeError> {
    let fills = decode_array(reader, ctx)?;
    let lines = decode_array(reader, ctx)?;
    Ok((fills, lines))
}

pub(crate) fn styles_size(
    fills: &[FillStyle],
    lines: &[LineStyle],
    ctx: &mut Context<'_>,
) -> Result<usize, EncodeError> {
    Ok(array_size(fills, ctx)? + array_size(lines, ctx)?)
}

pub(crate) fn encode_styles(
    fills: &[FillStyle],
    lines: &[LineStyle],
    writer: &mut Writer<'_>,
    ctx: &mut Context<'_>,
) -> Result<(), EncodeError> {
    encode_array(fills, writer, ctx)?;
    encode_array(lines, writer, ctx)
}
