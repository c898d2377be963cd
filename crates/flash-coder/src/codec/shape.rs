//! Coders for shape outlines.
//!
//! Shape records are bit-packed back to back with no alignment between
//! them, except that a style change introducing new style arrays starts
//! those arrays on a byte boundary. Six zero bits end the outline.
//!
//! Fill and line style indices are stored with the bit widths held in the
//! context; a style change with new styles replaces those widths for the
//! records that follow it.

use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::fill::{decode_styles, encode_styles, styles_size};
use crate::codec::numeric::{max_signed_bits, unsigned_bits};
use crate::codec::registry::Factory;
use crate::codec::{Coder, bits_to_bytes, check_unsigned};
use crate::error::{DecodeError, EncodeError};
use crate::model::shape::{Curve, Line, ShapeRecord, ShapeStyleChange, ShapeWithStyle};

pub(crate) const STYLE_CHANGE: u16 = 0b0;
pub(crate) const CURVE: u16 = 0b10;
pub(crate) const STRAIGHT: u16 = 0b11;

const END_BITS: u32 = 6;

/// Largest edge field width: a 4-bit count plus 2.
const MAX_EDGE_BITS: u32 = 17;

const NEW_STYLES: u32 = 0x10;
const LINE_STYLE: u32 = 0x08;
const FILL_STYLE1: u32 = 0x04;
const FILL_STYLE0: u32 = 0x02;
const MOVE_TO: u32 = 0x01;

/// Keys a record by its edge flag and, for edges, its straight flag.
pub(crate) fn record_kind(reader: &Reader<'_>) -> Result<u16, DecodeError> {
    if reader.scan_bits(1)? == 0 {
        Ok(STYLE_CHANGE)
    } else {
        Ok(reader.scan_bits(2)? as u16)
    }
}

pub(crate) fn register_defaults(factory: &mut Factory<ShapeRecord>) {
    factory.register(STYLE_CHANGE, decode_style_change);
    factory.register(STRAIGHT, decode_line);
    factory.register(CURVE, decode_curve);
}

fn decode_style_change(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<ShapeRecord, DecodeError> {
    let flags = reader.read_ubits(6, "style change")?;
    let mut change = ShapeStyleChange::default();

    if flags & MOVE_TO != 0 {
        let n = reader.read_ubits(5, "move to")?;
        change.move_to = Some((reader.read_sbits(n, "move to")?, reader.read_sbits(n, "move to")?));
    }
    if flags & FILL_STYLE0 != 0 {
        change.fill_style0 = Some(reader.read_ubits(ctx.fill_size()?, "fill style")?);
    }
    if flags & FILL_STYLE1 != 0 {
        change.fill_style1 = Some(reader.read_ubits(ctx.fill_size()?, "fill style")?);
    }
    if flags & LINE_STYLE != 0 {
        change.line_style = Some(reader.read_ubits(ctx.line_size()?, "line style")?);
    }
    if flags & NEW_STYLES != 0 {
        reader.align_to_byte();
        let styles = decode_styles(reader, ctx)?;
        let fill_size = reader.read_ubits(4, "style bits")?;
        let line_size = reader.read_ubits(4, "style bits")?;
        ctx.set_fill_size(fill_size).set_line_size(line_size);
        change.new_styles = Some(styles);
    }
    Ok(ShapeRecord::StyleChange(change))
}

fn decode_line(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<ShapeRecord, DecodeError> {
    reader.read_ubits(2, "line")?;
    let n = reader.read_ubits(4, "line")? + 2;
    let line = if reader.read_bool("line")? {
        Line { dx: reader.read_sbits(n, "line")?, dy: reader.read_sbits(n, "line")? }
    } else if reader.read_bool("line")? {
        Line { dx: 0, dy: reader.read_sbits(n, "line")? }
    } else {
        Line { dx: reader.read_sbits(n, "line")?, dy: 0 }
    };
    Ok(ShapeRecord::Line(line))
}

fn decode_curve(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<ShapeRecord, DecodeError> {
    reader.read_ubits(2, "curve")?;
    let n = reader.read_ubits(4, "curve")? + 2;
    Ok(ShapeRecord::Curve(Curve {
        control_dx: reader.read_sbits(n, "curve")?,
        control_dy: reader.read_sbits(n, "curve")?,
        anchor_dx: reader.read_sbits(n, "curve")?,
        anchor_dy: reader.read_sbits(n, "curve")?,
    }))
}

// =============================================================================
// ENCODING
// =============================================================================

fn edge_bits(values: &[i32]) -> Result<u32, EncodeError> {
    let n = max_signed_bits(values).max(2);
    if n > MAX_EDGE_BITS {
        return Err(EncodeError::ValueOutOfRange { field: "edge", value: n as i64, bits: MAX_EDGE_BITS });
    }
    Ok(n)
}

fn style_change_flags(change: &ShapeStyleChange) -> u32 {
    let mut flags = 0;
    if change.new_styles.is_some() {
        flags |= NEW_STYLES;
    }
    if change.line_style.is_some() {
        flags |= LINE_STYLE;
    }
    if change.fill_style1.is_some() {
        flags |= FILL_STYLE1;
    }
    if change.fill_style0.is_some() {
        flags |= FILL_STYLE0;
    }
    if change.move_to.is_some() {
        flags |= MOVE_TO;
    }
    flags
}

impl ShapeRecord {
    /// Returns the bit position after this record when it starts at bit
    /// `start` of the outline.
    fn end_bit(&self, start: usize, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        match self {
            ShapeRecord::StyleChange(change) => {
                let mut bits = start + 6;
                if let Some((x, y)) = change.move_to {
                    bits += 5 + 2 * max_signed_bits(&[x, y]) as usize;
                }
                let fill_size = ctx.fill_size()? as usize;
                let line_size = ctx.line_size()? as usize;
                bits += fill_size * change.fill_style0.iter().count();
                bits += fill_size * change.fill_style1.iter().count();
                bits += line_size * change.line_style.iter().count();
                if let Some((fills, lines)) = &change.new_styles {
                    bits = bits.div_ceil(8) * 8 + styles_size(fills, lines, ctx)? * 8 + 8;
                    ctx.set_fill_size(unsigned_bits(fills.len() as u32))
                        .set_line_size(unsigned_bits(lines.len() as u32));
                }
                Ok(bits)
            }
            ShapeRecord::Line(line) => {
                let general = line.dx != 0 && line.dy != 0;
                let n = edge_bits(&[line.dx, line.dy])? as usize;
                Ok(start + 7 + if general { 2 * n } else { 1 + n })
            }
            ShapeRecord::Curve(curve) => {
                let n = edge_bits(&[curve.control_dx, curve.control_dy, curve.anchor_dx, curve.anchor_dy])?;
                Ok(start + 6 + 4 * n as usize)
            }
        }
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        match self {
            ShapeRecord::StyleChange(change) => {
                let flags = style_change_flags(change);
                if flags == 0 {
                    return Err(EncodeError::InvalidValue {
                        field: "style change",
                        reason: "no fields set, would encode as end of shape",
                    });
                }
                writer.write_bits(flags, 6)?;
                if let Some((x, y)) = change.move_to {
                    let n = max_signed_bits(&[x, y]);
                    if n > 31 {
                        return Err(EncodeError::ValueOutOfRange { field: "move to", value: n as i64, bits: 31 });
                    }
                    writer.write_bits(n, 5)?;
                    writer.write_sbits(x, n)?;
                    writer.write_sbits(y, n)?;
                }
                let fill_size = ctx.fill_size()?;
                let line_size = ctx.line_size()?;
                for index in [change.fill_style0, change.fill_style1].into_iter().flatten() {
                    check_unsigned("fill style index", index, fill_size)?;
                    writer.write_bits(index, fill_size)?;
                }
                if let Some(index) = change.line_style {
                    check_unsigned("line style index", index, line_size)?;
                    writer.write_bits(index, line_size)?;
                }
                if let Some((fills, lines)) = &change.new_styles {
                    writer.align_to_byte();
                    encode_styles(fills, lines, writer, ctx)?;
                    let fill_size = unsigned_bits(fills.len() as u32);
                    let line_size = unsigned_bits(lines.len() as u32);
                    check_unsigned("fill style bits", fill_size, 4)?;
                    check_unsigned("line style bits", line_size, 4)?;
                    writer.write_bits(fill_size, 4)?;
                    writer.write_bits(line_size, 4)?;
                    ctx.set_fill_size(fill_size).set_line_size(line_size);
                }
                Ok(())
            }
            ShapeRecord::Line(line) => {
                let n = edge_bits(&[line.dx, line.dy])?;
                writer.write_bits(0b11, 2)?;
                writer.write_bits(n - 2, 4)?;
                if line.dx != 0 && line.dy != 0 {
                    writer.write_bool(true)?;
                    writer.write_sbits(line.dx, n)?;
                    writer.write_sbits(line.dy, n)
                } else if line.dx == 0 {
                    writer.write_bits(0b01, 2)?;
                    writer.write_sbits(line.dy, n)
                } else {
                    writer.write_bits(0b00, 2)?;
                    writer.write_sbits(line.dx, n)
                }
            }
            ShapeRecord::Curve(curve) => {
                let n = edge_bits(&[curve.control_dx, curve.control_dy, curve.anchor_dx, curve.anchor_dy])?;
                writer.write_bits(0b10, 2)?;
                writer.write_bits(n - 2, 4)?;
                writer.write_sbits(curve.control_dx, n)?;
                writer.write_sbits(curve.control_dy, n)?;
                writer.write_sbits(curve.anchor_dx, n)?;
                writer.write_sbits(curve.anchor_dy, n)
            }
        }
    }
}

// =============================================================================
// SHAPE WITH STYLES
// =============================================================================

impl ShapeWithStyle {
    fn fill_size(&self) -> u32 {
        unsigned_bits(self.fill_styles.len() as u32)
    }

    fn line_size(&self) -> u32 {
        unsigned_bits(self.line_styles.len() as u32)
    }
}

/// Expects `transparent` and `array_extended` from the enclosing shape
/// definition.
impl Coder for ShapeWithStyle {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let registry = ctx.registry()?;
        ctx.scope(|ctx| -> Result<Self, DecodeError> {
            let (fill_styles, line_styles) = decode_styles(reader, ctx)?;
            let fill_size = reader.read_ubits(4, "style bits")?;
            let line_size = reader.read_ubits(4, "style bits")?;
            ctx.set_fill_size(fill_size).set_line_size(line_size);

            let mut records = Vec::new();
            loop {
                if reader.scan_bits(END_BITS)? == 0 {
                    reader.read_ubits(END_BITS, "end of shape")?;
                    break;
                }
                records.push(registry.shape_records.get_object(reader, ctx)?);
            }
            reader.align_to_byte();
            Ok(ShapeWithStyle { fill_styles, line_styles, records })
        })
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        ctx.scope(|ctx| -> Result<usize, EncodeError> {
            let styles = styles_size(&self.fill_styles, &self.line_styles, ctx)?;
            ctx.set_fill_size(self.fill_size()).set_line_size(self.line_size());
            let mut bits = 0;
            for record in &self.records {
                bits = record.end_bit(bits, ctx)?;
            }
            Ok(styles + 1 + bits_to_bytes(bits + END_BITS as usize))
        })
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        ctx.scope(|ctx| -> Result<(), EncodeError> {
            encode_styles(&self.fill_styles, &self.line_styles, writer, ctx)?;
            let fill_size = self.fill_size();
            let line_size = self.line_size();
            check_unsigned("fill style bits", fill_size, 4)?;
            check_unsigned("line style bits", line_size, 4)?;
            writer.write_bits(fill_size, 4)?;
            writer.write_bits(line_size, 4)?;
            ctx.set_fill_size(fill_size).set_line_size(line_size);

            for record in &self.records {
                record.encode(writer, ctx)?;
            }
            writer.write_bits(0, END_BITS)?;
            writer.align_to_byte();
            Ok(())
        })
    }
}
