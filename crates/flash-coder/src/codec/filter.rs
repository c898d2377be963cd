//! Coders for bitmap filters and filter lists.

use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::datatypes::{read_rgba, write_rgba};
use crate::codec::registry::Factory;
use crate::codec::Coder;
use crate::error::{DecodeError, EncodeError};
use crate::model::filter::{
    BevelFilter, BlurFilter, ConvolutionFilter, DropShadowFilter, Filter, FilterMode, GlowFilter,
    GradientFilter,
};

const DROP_SHADOW: u16 = 0;
const BLUR: u16 = 1;
const GLOW: u16 = 2;
const BEVEL: u16 = 3;
const GRADIENT_GLOW: u16 = 4;
const CONVOLUTION: u16 = 5;
const COLOR_MATRIX: u16 = 6;
const GRADIENT_BEVEL: u16 = 7;

/// Filters are keyed by their first byte.
pub(crate) fn filter_type(reader: &Reader<'_>) -> Result<u16, DecodeError> {
    reader.scan_byte().map(u16::from)
}

pub(crate) fn register_defaults(factory: &mut Factory<Filter>) {
    factory.register(DROP_SHADOW, decode_drop_shadow);
    factory.register(BLUR, decode_blur);
    factory.register(GLOW, decode_glow);
    factory.register(BEVEL, decode_bevel);
    factory.register(GRADIENT_GLOW, decode_gradient_filter);
    factory.register(CONVOLUTION, decode_convolution);
    factory.register(COLOR_MATRIX, decode_color_matrix);
    factory.register(GRADIENT_BEVEL, decode_gradient_filter);
}

fn decode_drop_shadow(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    reader.read_byte("filter type")?;
    Ok(Filter::DropShadow(DropShadowFilter {
        color: read_rgba(reader)?,
        blur_x: reader.read_fixed("blur")?,
        blur_y: reader.read_fixed("blur")?,
        angle: reader.read_fixed("angle")?,
        distance: reader.read_fixed("distance")?,
        strength: reader.read_fixed8("strength")?,
        mode: FilterMode(reader.read_byte("filter mode")?),
    }))
}

fn decode_blur(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    reader.read_byte("filter type")?;
    Ok(Filter::Blur(BlurFilter {
        blur_x: reader.read_fixed("blur")?,
        blur_y: reader.read_fixed("blur")?,
        passes: reader.read_byte("passes")?,
    }))
}

fn decode_glow(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    reader.read_byte("filter type")?;
    Ok(Filter::Glow(GlowFilter {
        color: read_rgba(reader)?,
        blur_x: reader.read_fixed("blur")?,
        blur_y: reader.read_fixed("blur")?,
        strength: reader.read_fixed8("strength")?,
        mode: FilterMode(reader.read_byte("filter mode")?),
    }))
}

fn decode_bevel(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    reader.read_byte("filter type")?;
    Ok(Filter::Bevel(BevelFilter {
        shadow: read_rgba(reader)?,
        highlight: read_rgba(reader)?,
        blur_x: reader.read_fixed("blur")?,
        blur_y: reader.read_fixed("blur")?,
        angle: reader.read_fixed("angle")?,
        distance: reader.read_fixed("distance")?,
        strength: reader.read_fixed8("strength")?,
        mode: FilterMode(reader.read_byte("filter mode")?),
    }))
}

fn decode_gradient_filter(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    let code = reader.read_byte("filter type")? as u16;
    let count = reader.read_byte("gradient colors")? as usize;
    let mut colors = Vec::with_capacity(count);
    for _ in 0..count {
        colors.push(read_rgba(reader)?);
    }
    let ratios = reader.read_bytes(count, "gradient ratios")?;
    let filter = GradientFilter {
        stops: colors.into_iter().zip(ratios.iter().copied()).collect(),
        blur_x: reader.read_fixed("blur")?,
        blur_y: reader.read_fixed("blur")?,
        angle: reader.read_fixed("angle")?,
        distance: reader.read_fixed("distance")?,
        strength: reader.read_fixed8("strength")?,
        mode: FilterMode(reader.read_byte("filter mode")?),
    };
    Ok(if code == GRADIENT_GLOW {
        Filter::GradientGlow(filter)
    } else {
        Filter::GradientBevel(filter)
    })
}

fn decode_convolution(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    reader.read_byte("filter type")?;
    let columns = reader.read_byte("matrix columns")?;
    let rows = reader.read_byte("matrix rows")?;
    let divisor = reader.read_f32("divisor")?;
    let bias = reader.read_f32("bias")?;
    let cells = columns as usize * rows as usize;
    let mut matrix = Vec::with_capacity(cells.min(reader.remaining_len() / 4));
    for _ in 0..cells {
        matrix.push(reader.read_f32("matrix")?);
    }
    Ok(Filter::Convolution(ConvolutionFilter {
        columns,
        rows,
        divisor,
        bias,
        matrix,
        default_color: read_rgba(reader)?,
        flags: reader.read_byte("convolution flags")?,
    }))
}

fn decode_color_matrix(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Filter, DecodeError> {
    reader.read_byte("filter type")?;
    let mut matrix = [0f32; 20];
    for cell in matrix.iter_mut() {
        *cell = reader.read_f32("color matrix")?;
    }
    Ok(Filter::ColorMatrix(matrix))
}

impl Coder for Filter {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let registry = ctx.registry()?;
        registry.filters.get_object(reader, ctx)
    }

    fn prepare_to_encode(&self, _ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        let body = match self {
            Filter::DropShadow(_) => 4 + 16 + 2 + 1,
            Filter::Blur(_) => 8 + 1,
            Filter::Glow(_) => 4 + 8 + 2 + 1,
            Filter::Bevel(_) => 8 + 16 + 2 + 1,
            Filter::GradientGlow(f) | Filter::GradientBevel(f) => 1 + 5 * f.stops.len() + 16 + 2 + 1,
            Filter::Convolution(f) => 2 + 8 + 4 * f.matrix.len() + 4 + 1,
            Filter::ColorMatrix(_) => 80,
        };
        Ok(1 + body)
    }

    fn encode(&self, writer: &mut Writer<'_>, _ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        writer.write_byte(self.filter_type())?;
        match self {
            Filter::DropShadow(f) => {
                write_rgba(writer, f.color)?;
                writer.write_fixed(f.blur_x)?;
                writer.write_fixed(f.blur_y)?;
                writer.write_fixed(f.angle)?;
                writer.write_fixed(f.distance)?;
                writer.write_fixed8(f.strength)?;
                writer.write_byte(f.mode.0)
            }
            Filter::Blur(f) => {
                writer.write_fixed(f.blur_x)?;
                writer.write_fixed(f.blur_y)?;
                writer.write_byte(f.passes)
            }
            Filter::Glow(f) => {
                write_rgba(writer, f.color)?;
                writer.write_fixed(f.blur_x)?;
                writer.write_fixed(f.blur_y)?;
                writer.write_fixed8(f.strength)?;
                writer.write_byte(f.mode.0)
            }
            Filter::Bevel(f) => {
                write_rgba(writer, f.shadow)?;
                write_rgba(writer, f.highlight)?;
                writer.write_fixed(f.blur_x)?;
                writer.write_fixed(f.blur_y)?;
                writer.write_fixed(f.angle)?;
                writer.write_fixed(f.distance)?;
                writer.write_fixed8(f.strength)?;
                writer.write_byte(f.mode.0)
            }
            Filter::GradientGlow(f) | Filter::GradientBevel(f) => {
                let count = u8::try_from(f.stops.len()).map_err(|_| EncodeError::LengthExceedsLimit {
                    field: "gradient filter colors",
                    len: f.stops.len(),
                    max: u8::MAX as usize,
                })?;
                writer.write_byte(count)?;
                for (color, _) in &f.stops {
                    write_rgba(writer, *color)?;
                }
                for (_, ratio) in &f.stops {
                    writer.write_byte(*ratio)?;
                }
                writer.write_fixed(f.blur_x)?;
                writer.write_fixed(f.blur_y)?;
                writer.write_fixed(f.angle)?;
                writer.write_fixed(f.distance)?;
                writer.write_fixed8(f.strength)?;
                writer.write_byte(f.mode.0)
            }
            Filter::Convolution(f) => {
                if f.matrix.len() != f.columns as usize * f.rows as usize {
                    return Err(EncodeError::InvalidValue {
                        field: "convolution matrix",
                        reason: "cell count differs from columns * rows",
                    });
                }
                writer.write_byte(f.columns)?;
                writer.write_byte(f.rows)?;
                writer.write_f32(f.divisor)?;
                writer.write_f32(f.bias)?;
                for cell in &f.matrix {
                    writer.write_f32(*cell)?;
                }
                write_rgba(writer, f.default_color)?;
                writer.write_byte(f.flags)
            }
            Filter::ColorMatrix(matrix) => {
                for cell in matrix {
                    writer.write_f32(*cell)?;
                }
                Ok(())
            }
        }
    }
}

/// Decodes a filter list: a count byte followed by the filters.
pub(crate) fn decode_filters(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Vec<Filter>, DecodeError> {
    let count = reader.read_byte("filter count")? as usize;
    let mut filters = Vec::with_capacity(count);
    for _ in 0..count {
        filters.push(Filter::decode(reader, ctx)?);
    }
    Ok(filters)
}

pub(crate) fn filters_size(filters: &[Filter], ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    let mut size = 1;
    for filter in filters {
        size += filter.prepare_to_encode(ctx)?;
    }
    Ok(size)
}

pub(crate) fn encode_filters(
    filters: &[Filter],
    writer: &mut Writer<'_>,
    ctx: &mut Context<'_>,
) -> Result<(), EncodeError> {
    let count = u8::try_from(filters.len()).map_err(|_| EncodeError::LengthExceedsLimit {
        field: "filters",
        len: filters.len(),
        max: u8::MAX as usize,
    })?;
    writer.write_byte(count)?;
    for filter in filters {
        filter.encode(writer, ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::numeric::{Fixed, Fixed8};
    use crate::codec::registry::DecoderRegistry;
    use crate::codec::test_support::roundtrip;
    use crate::model::datatypes::Color;

    fn all_filters() -> Vec<Filter> {
        let shadow = DropShadowFilter {
            color: Color::rgba(0, 0, 0, 128),
            blur_x: Fixed(0x4_0000),
            blur_y: Fixed(0x4_0000),
            angle: Fixed(0xC90F),
            distance: Fixed(0x4_0000),
            strength: Fixed8::ONE,
            mode: FilterMode(FilterMode::COMPOSITE | 1),
        };
        let gradient = GradientFilter {
            stops: vec![(Color::WHITE, 0), (Color::rgba(255, 0, 0, 0), 255)],
            blur_x: Fixed::ONE,
            blur_y: Fixed::ONE,
            angle: Fixed::default(),
            distance: Fixed::default(),
            strength: Fixed8::ONE,
            mode: FilterMode(FilterMode::INNER | FilterMode::ON_TOP | 3),
        };
        vec![
            Filter::DropShadow(shadow),
            Filter::Blur(BlurFilter { blur_x: Fixed::ONE, blur_y: Fixed(0x28000), passes: 1 << 3 }),
            Filter::Glow(GlowFilter {
                color: Color::rgb(255, 255, 0),
                blur_x: Fixed::ONE,
                blur_y: Fixed::ONE,
                strength: Fixed8(0x200),
                mode: FilterMode(FilterMode::KNOCKOUT | 1),
            }),
            Filter::Bevel(BevelFilter {
                shadow: Color::BLACK,
                highlight: Color::WHITE,
                blur_x: Fixed::ONE,
                blur_y: Fixed::ONE,
                angle: Fixed(0x1000),
                distance: Fixed(-0x2000),
                strength: Fixed8::ONE,
                mode: FilterMode(FilterMode::ON_TOP | 1),
            }),
            Filter::GradientGlow(gradient.clone()),
            Filter::Convolution(ConvolutionFilter {
                columns: 3,
                rows: 2,
                divisor: 6.0,
                bias: 0.5,
                matrix: vec![1.0, 0.0, -1.0, 2.0, 0.0, -2.0],
                default_color: Color::rgba(0, 0, 0, 0),
                flags: 0b11,
            }),
            Filter::ColorMatrix(std::array::from_fn(|i| if i % 6 == 0 { 1.0 } else { 0.0 })),
            Filter::GradientBevel(gradient),
        ]
    }

    #[test]
    fn test_each_filter_roundtrip() {
        for filter in all_filters() {
            let bytes = roundtrip(&filter, |_| {});
            assert_eq!(bytes[0], filter.filter_type());
        }
    }

    #[test]
    fn test_filter_list() {
        let registry = DecoderRegistry::new();
        let mut ctx = Context::with_registry(&registry);
        let filters = all_filters();
        let size = filters_size(&filters, &mut ctx).unwrap();
        let mut writer = Writer::new();
        encode_filters(&filters, &mut writer, &mut ctx).unwrap();
        assert_eq!(writer.len(), size);

        let bytes = writer.into_bytes();
        let decoded = decode_filters(&mut Reader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(decoded, filters);
    }

    #[test]
    fn test_filter_mode_flags() {
        let mode = FilterMode(0xB2);
        assert!(mode.inner());
        assert!(!mode.knockout());
        assert!(mode.composite());
        assert!(mode.on_top());
    }

    #[test]
    fn test_convolution_cell_count_checked() {
        let filter = Filter::Convolution(ConvolutionFilter {
            columns: 2,
            rows: 2,
            divisor: 1.0,
            bias: 0.0,
            matrix: vec![1.0],
            default_color: Color::BLACK,
            flags: 0,
        });
        let err = filter.encode(&mut Writer::new(), &mut Context::new()).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidValue { .. }));
    }
}
