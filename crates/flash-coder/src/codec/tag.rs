//! Coders for top-level movie records.
//!
//! Every record is framed by a [`TagHeader`]. The decoder registered for a
//! code receives the reader positioned at the header; the body must consume
//! exactly the declared length.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tracing::debug;

use crate::codec::action::{actions_size, decode_actions, encode_actions};
use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer, variable_u32_size};
use crate::codec::datatypes::{read_rgba, write_rgba};
use crate::codec::filter::{decode_filters, encode_filters, filters_size};
use crate::codec::header::{TagHeader, decode_framed, encode_framed};
use crate::codec::registry::Factory;
use crate::codec::{Coder, cstring_size};
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_MOVIE_SIZE;
use crate::model::datatypes::{Bounds, Color, ColorTransform, CoordTransform};
use crate::model::shape::ShapeWithStyle;
use crate::model::tag::{
    ClipActions, ClipEventHandler, DefineImage, DefineShape, DefineSprite, FrameLabel, ImageFormat, MovieTag,
    PlaceObject, SceneData, ShapeVersion, codes,
};

/// Records are keyed by the upper ten bits of the first u16.
pub(crate) fn tag_code(reader: &Reader<'_>) -> Result<u16, DecodeError> {
    Ok(reader.scan_u16()? >> 6)
}

pub(crate) fn register_defaults(factory: &mut Factory<MovieTag>) {
    factory.register(codes::SHOW_FRAME, decode_show_frame);
    factory.register(codes::DEFINE_SHAPE, decode_define_shape);
    factory.register(codes::DEFINE_SHAPE2, decode_define_shape);
    factory.register(codes::DEFINE_SHAPE3, decode_define_shape);
    factory.register(codes::SET_BACKGROUND_COLOR, decode_set_background_color);
    factory.register(codes::DO_ACTION, decode_do_action);
    factory.register(codes::DEFINE_BITS_LOSSLESS, decode_define_image);
    factory.register(codes::DEFINE_BITS_LOSSLESS2, decode_define_image);
    factory.register(codes::PROTECT, decode_protect);
    factory.register(codes::PLACE_OBJECT2, decode_place_object);
    factory.register(codes::PLACE_OBJECT3, decode_place_object);
    factory.register(codes::REMOVE_OBJECT2, decode_remove_object);
    factory.register(codes::DEFINE_SPRITE, decode_define_sprite);
    factory.register(codes::FRAME_LABEL, decode_frame_label);
    factory.register(codes::EXPORT_ASSETS, decode_export_assets);
    factory.register(codes::DO_INIT_ACTION, decode_do_init_action);
    factory.register(codes::SCRIPT_LIMITS, decode_script_limits);
    factory.register(codes::FILE_ATTRIBUTES, decode_file_attributes);
    factory.register(codes::METADATA, decode_metadata);
    factory.register(codes::DEFINE_SCENE_AND_FRAME_LABEL_DATA, decode_scene_data);
}

/// Sets the values a record's children read from the context.
fn configure_context(code: u16, ctx: &mut Context<'_>) {
    match code {
        codes::DEFINE_SHAPE => {
            ctx.set_transparent(false).set_array_extended(false);
        }
        codes::DEFINE_SHAPE2 => {
            ctx.set_transparent(false).set_array_extended(true);
        }
        codes::DEFINE_SHAPE3 => {
            ctx.set_transparent(true).set_array_extended(true);
        }
        codes::SET_BACKGROUND_COLOR => {
            ctx.set_transparent(false);
        }
        codes::PLACE_OBJECT2 | codes::PLACE_OBJECT3 => {
            ctx.set_transparent(true);
        }
        _ => {}
    }
}

fn object_name(code: u16) -> &'static str {
    match code {
        codes::SHOW_FRAME => "ShowFrame",
        codes::DEFINE_SHAPE | codes::DEFINE_SHAPE2 | codes::DEFINE_SHAPE3 => "DefineShape",
        codes::SET_BACKGROUND_COLOR => "SetBackgroundColor",
        codes::DO_ACTION => "DoAction",
        codes::DEFINE_BITS_LOSSLESS | codes::DEFINE_BITS_LOSSLESS2 => "DefineBitsLossless",
        codes::PROTECT => "Protect",
        codes::PLACE_OBJECT2 | codes::PLACE_OBJECT3 => "PlaceObject",
        codes::REMOVE_OBJECT2 => "RemoveObject",
        codes::DEFINE_SPRITE => "DefineSprite",
        codes::FRAME_LABEL => "FrameLabel",
        codes::EXPORT_ASSETS => "ExportAssets",
        codes::DO_INIT_ACTION => "DoInitAction",
        codes::SCRIPT_LIMITS => "ScriptLimits",
        codes::FILE_ATTRIBUTES => "FileAttributes",
        codes::METADATA => "Metadata",
        codes::DEFINE_SCENE_AND_FRAME_LABEL_DATA => "DefineSceneAndFrameLabelData",
        _ => "Unknown",
    }
}

/// Decodes a framed record with the context configured for its code.
fn decode_record<T>(
    reader: &mut Reader<'_>,
    ctx: &mut Context<'_>,
    body: impl FnOnce(&mut Reader<'_>, &mut Context<'_>, &TagHeader) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    let code = TagHeader::peek(reader)?.code;
    ctx.scope(|ctx| -> Result<T, DecodeError> {
        configure_context(code, ctx);
        decode_framed(reader, object_name(code), |r, header| body(r, ctx, header))
    })
}

// =============================================================================
// DECODERS
// =============================================================================

fn decode_show_frame(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |_, _, _| Ok(MovieTag::ShowFrame))
}

fn decode_define_shape(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, ctx, header| {
        let version = match header.code {
            codes::DEFINE_SHAPE => ShapeVersion::V1,
            codes::DEFINE_SHAPE2 => ShapeVersion::V2,
            _ => ShapeVersion::V3,
        };
        let id = r.read_u16("character id")?;
        let bounds = Bounds::decode(r, ctx)?;
        let shape = ShapeWithStyle::decode(r, ctx)?;
        Ok(MovieTag::DefineShape(DefineShape { version, id, bounds, shape }))
    })
}

fn decode_set_background_color(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, ctx, _| Ok(MovieTag::SetBackgroundColor(Color::decode(r, ctx)?)))
}

fn decode_do_action(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, ctx, _| Ok(MovieTag::DoAction(decode_actions(r, ctx)?)))
}

fn decode_define_image(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, header| {
        let mut body = r.slice(header.length as usize, "image")?;
        let id = body.read_u16("character id")?;
        let location = body.location();
        let code = body.read_byte("image format")?;
        let format = ImageFormat::from_u8(code).ok_or(DecodeError::UnsupportedVariant {
            family: "image format",
            code: code as u16,
            location,
        })?;
        let width = body.read_u16("image width")?;
        let height = body.read_u16("image height")?;
        let table_size = match format {
            ImageFormat::Indexed => Some(body.read_byte("color table size")?),
            _ => None,
        };
        let data = body.read_remaining().to_vec();
        Ok(MovieTag::DefineImage(DefineImage {
            alpha: header.code == codes::DEFINE_BITS_LOSSLESS2,
            id,
            format,
            width,
            height,
            table_size,
            data,
        }))
    })
}

fn decode_protect(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, header| {
        if header.length == 0 {
            return Ok(MovieTag::Protect(None));
        }
        Ok(MovieTag::Protect(Some(r.read_cstring("password")?)))
    })
}

const HAS_CLIP_ACTIONS: u8 = 0x80;
const HAS_CLIP_DEPTH: u8 = 0x40;
const HAS_NAME: u8 = 0x20;
const HAS_RATIO: u8 = 0x10;
const HAS_COLOR_TRANSFORM: u8 = 0x08;
const HAS_MATRIX: u8 = 0x04;
const HAS_CHARACTER: u8 = 0x02;
const MOVE: u8 = 0x01;

const HAS_BACKGROUND: u8 = 0x40;
const HAS_VISIBLE: u8 = 0x20;
const HAS_IMAGE: u8 = 0x10;
const HAS_CLASS_NAME: u8 = 0x08;
const HAS_CACHE: u8 = 0x04;
const HAS_BLEND_MODE: u8 = 0x02;
const HAS_FILTERS: u8 = 0x01;

fn decode_place_object(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, ctx, header| {
        let extended = header.code == codes::PLACE_OBJECT3;
        let flags = r.read_byte("place flags")?;
        let flags2 = if extended { r.read_byte("place flags")? } else { 0 };

        let mut place = PlaceObject {
            extended,
            is_move: flags & MOVE != 0,
            has_image: flags2 & HAS_IMAGE != 0,
            depth: r.read_u16("depth")?,
            ..PlaceObject::default()
        };
        if flags2 & HAS_CLASS_NAME != 0 {
            place.class_name = Some(r.read_cstring("class name")?);
        }
        if flags & HAS_CHARACTER != 0 {
            place.character = Some(r.read_u16("character id")?);
        }
        if flags & HAS_MATRIX != 0 {
            place.transform = Some(CoordTransform::decode(r, ctx)?);
        }
        if flags & HAS_COLOR_TRANSFORM != 0 {
            place.color_transform = Some(ColorTransform::decode(r, ctx)?);
        }
        if flags & HAS_RATIO != 0 {
            place.ratio = Some(r.read_u16("ratio")?);
        }
        if flags & HAS_NAME != 0 {
            place.name = Some(r.read_cstring("name")?);
        }
        if flags & HAS_CLIP_DEPTH != 0 {
            place.clip_depth = Some(r.read_u16("clip depth")?);
        }
        if flags2 & HAS_FILTERS != 0 {
            place.filters = Some(decode_filters(r, ctx)?);
        }
        if flags2 & HAS_BLEND_MODE != 0 {
            place.blend_mode = Some(r.read_byte("blend mode")?);
        }
        if flags2 & HAS_CACHE != 0 {
            place.cache_as_bitmap = Some(r.read_byte("cache as bitmap")?);
        }
        if flags2 & HAS_VISIBLE != 0 {
            place.visible = Some(r.read_byte("visible")?);
        }
        if flags2 & HAS_BACKGROUND != 0 {
            place.background = Some(read_rgba(r)?);
        }
        if flags & HAS_CLIP_ACTIONS != 0 {
            place.clip_actions = Some(decode_clip_actions(r, ctx)?);
        }
        Ok(MovieTag::PlaceObject(place))
    })
}

fn decode_remove_object(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, _| Ok(MovieTag::RemoveObject { depth: r.read_u16("depth")? }))
}

/// Decodes the control records of a sprite. A sprite nested in a sprite is
/// kept as an opaque record.
fn decode_define_sprite(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    let registry = ctx.registry()?;
    decode_record(reader, ctx, |r, ctx, _| {
        let id = r.read_u16("character id")?;
        let frame_count = r.read_u16("frame count")?;
        let mut tags = Vec::new();
        loop {
            let header = TagHeader::peek(r)?;
            if header.code == codes::END {
                TagHeader::read(r)?;
                break;
            }
            let tag = if header.code == codes::DEFINE_SPRITE {
                decode_unknown(r, ctx)?
            } else {
                registry.tags.get_object(r, ctx)?
            };
            tags.push(tag);
        }
        Ok(MovieTag::DefineSprite(DefineSprite { id, frame_count, tags }))
    })
}

fn decode_frame_label(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, header| {
        let mut body = r.slice(header.length as usize, "frame label")?;
        let name = body.read_cstring("label")?;
        let anchor = !body.is_empty() && body.read_byte("anchor flag")? != 0;
        Ok(MovieTag::FrameLabel(FrameLabel { name, anchor }))
    })
}

fn decode_export_assets(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, _| {
        let count = r.read_u16("export count")? as usize;
        let mut exports = Vec::with_capacity(count.min(r.remaining_len()));
        for _ in 0..count {
            let id = r.read_u16("character id")?;
            exports.push((id, r.read_cstring("export name")?));
        }
        Ok(MovieTag::ExportAssets(exports))
    })
}

fn decode_do_init_action(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, ctx, _| {
        let sprite_id = r.read_u16("sprite id")?;
        let actions = decode_actions(r, ctx)?;
        Ok(MovieTag::DoInitAction { sprite_id, actions })
    })
}

fn decode_script_limits(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, _| {
        let max_recursion = r.read_u16("max recursion")?;
        let timeout_seconds = r.read_u16("script timeout")?;
        Ok(MovieTag::ScriptLimits { max_recursion, timeout_seconds })
    })
}

fn decode_file_attributes(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, _| Ok(MovieTag::FileAttributes(r.read_u32("attributes")?)))
}

fn decode_metadata(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, _| Ok(MovieTag::Metadata(r.read_cstring("metadata")?)))
}

fn decode_numbered_names(reader: &mut Reader<'_>, field: &'static str) -> Result<Vec<(u32, String)>, DecodeError> {
    let count = reader.read_variable_u32(field)? as usize;
    let mut entries = Vec::with_capacity(count.min(reader.remaining_len()));
    for _ in 0..count {
        let frame = reader.read_variable_u32(field)?;
        entries.push((frame, reader.read_cstring(field)?));
    }
    Ok(entries)
}

fn decode_scene_data(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_record(reader, ctx, |r, _, _| {
        let scenes = decode_numbered_names(r, "scene")?;
        let labels = decode_numbered_names(r, "frame label")?;
        Ok(MovieTag::SceneData(SceneData { scenes, labels }))
    })
}

/// Preserves a record without a registered decoder, header form included.
pub(crate) fn decode_unknown(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
    decode_framed(reader, "Unknown", |r, header| {
        debug!(code = header.code, length = header.length, "preserving unknown record");
        let data = r.read_bytes(header.length as usize, "record body")?.to_vec();
        Ok(MovieTag::Unknown { code: header.code, data, extended: header.extended })
    })
}

// =============================================================================
// CLIP ACTIONS
// =============================================================================

/// Event flags are 16 bits wide up to version 5 and 32 bits from version 6.
/// The 16-bit form is held in the upper half of the 32-bit value.
fn event_bits(ctx: &Context<'_>) -> Result<u32, crate::error::MissingContext> {
    Ok(if ctx.version()? <= 5 { 16 } else { 32 })
}

fn read_events(reader: &mut Reader<'_>, bits: u32) -> Result<u32, DecodeError> {
    let events = reader.read_ubits(bits, "clip event flags")?;
    Ok(if bits == 16 { events << 16 } else { events })
}

fn write_events(writer: &mut Writer<'_>, events: u32, bits: u32) -> Result<(), EncodeError> {
    if bits == 16 {
        if events & 0xFFFF != 0 {
            return Err(EncodeError::InvalidValue {
                field: "clip event flags",
                reason: "events from version 6 cannot be stored in an earlier movie",
            });
        }
        writer.write_bits(events >> 16, 16)
    } else {
        writer.write_bits(events, 32)
    }
}

fn decode_clip_actions(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<ClipActions, DecodeError> {
    let bits = event_bits(ctx)?;
    reader.read_u16("clip actions reserved")?;
    let all_events = read_events(reader, bits)?;
    let mut handlers = Vec::new();
    loop {
        let events = read_events(reader, bits)?;
        if events == 0 {
            break;
        }
        let size = reader.read_u32("clip action size")? as usize;
        reader.mark();
        let key_code = if events & ClipEventHandler::KEY_PRESS != 0 {
            Some(reader.read_byte("key code")?)
        } else {
            None
        };
        let actions = decode_actions(reader, ctx)?;
        reader.unmark(size, "ClipEventHandler")?;
        handlers.push(ClipEventHandler { events, key_code, actions });
    }
    Ok(ClipActions { all_events, handlers })
}

fn handler_body_size(handler: &ClipEventHandler, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    Ok(usize::from(handler.key_code.is_some()) + actions_size(&handler.actions, ctx)?)
}

fn clip_actions_size(clip: &ClipActions, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    let events = event_bits(ctx)? as usize / 8;
    let mut size = 2 + events + events;
    for handler in &clip.handlers {
        size += events + 4 + handler_body_size(handler, ctx)?;
    }
    Ok(size)
}

fn encode_clip_actions(clip: &ClipActions, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
    let bits = event_bits(ctx)?;
    writer.write_u16(0)?;
    write_events(writer, clip.all_events, bits)?;
    for handler in &clip.handlers {
        if handler.events == 0 {
            return Err(EncodeError::InvalidValue {
                field: "clip event flags",
                reason: "a handler must have at least one event",
            });
        }
        if handler.key_code.is_some() != (handler.events & ClipEventHandler::KEY_PRESS != 0) {
            return Err(EncodeError::InvalidValue {
                field: "key code",
                reason: "present exactly when the key press event is set",
            });
        }
        write_events(writer, handler.events, bits)?;
        let size = handler_body_size(handler, ctx)?;
        writer.write_u32(size as u32)?;
        writer.mark();
        if let Some(key) = handler.key_code {
            writer.write_byte(key)?;
        }
        encode_actions(&handler.actions, writer, ctx)?;
        writer.unmark(size, "ClipEventHandler")?;
    }
    write_events(writer, 0, bits)
}

// =============================================================================
// ENCODING
// =============================================================================

impl PlaceObject {
    fn flags(&self) -> (u8, u8) {
        let mut flags = 0;
        let mut flags2 = 0;
        let set = |flags: &mut u8, bit: u8, on: bool| {
            if on {
                *flags |= bit;
            }
        };
        set(&mut flags, HAS_CLIP_ACTIONS, self.clip_actions.is_some());
        set(&mut flags, HAS_CLIP_DEPTH, self.clip_depth.is_some());
        set(&mut flags, HAS_NAME, self.name.is_some());
        set(&mut flags, HAS_RATIO, self.ratio.is_some());
        set(&mut flags, HAS_COLOR_TRANSFORM, self.color_transform.is_some());
        set(&mut flags, HAS_MATRIX, self.transform.is_some());
        set(&mut flags, HAS_CHARACTER, self.character.is_some());
        set(&mut flags, MOVE, self.is_move);
        set(&mut flags2, HAS_BACKGROUND, self.background.is_some());
        set(&mut flags2, HAS_VISIBLE, self.visible.is_some());
        set(&mut flags2, HAS_IMAGE, self.has_image);
        set(&mut flags2, HAS_CLASS_NAME, self.class_name.is_some());
        set(&mut flags2, HAS_CACHE, self.cache_as_bitmap.is_some());
        set(&mut flags2, HAS_BLEND_MODE, self.blend_mode.is_some());
        set(&mut flags2, HAS_FILTERS, self.filters.is_some());
        (flags, flags2)
    }

    fn body_size(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        let (_, flags2) = self.flags();
        if !self.extended && flags2 != 0 {
            return Err(EncodeError::InvalidValue {
                field: "PlaceObject",
                reason: "class name, filters, blend mode, caching, visibility and image need the extended layout",
            });
        }
        let mut size = if self.extended { 4 } else { 3 };
        size += self.class_name.as_deref().map_or(0, |name| cstring_size(name, ctx));
        size += self.character.map_or(0, |_| 2);
        if let Some(transform) = &self.transform {
            size += transform.prepare_to_encode(ctx)?;
        }
        if let Some(cxform) = &self.color_transform {
            size += cxform.prepare_to_encode(ctx)?;
        }
        size += self.ratio.map_or(0, |_| 2);
        size += self.name.as_deref().map_or(0, |name| cstring_size(name, ctx));
        size += self.clip_depth.map_or(0, |_| 2);
        if let Some(filters) = &self.filters {
            size += filters_size(filters, ctx)?;
        }
        size += usize::from(self.blend_mode.is_some());
        size += usize::from(self.cache_as_bitmap.is_some());
        size += usize::from(self.visible.is_some());
        size += self.background.map_or(0, |_| 4);
        if let Some(clip) = &self.clip_actions {
            size += clip_actions_size(clip, ctx)?;
        }
        Ok(size)
    }

    fn encode_body(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        let (flags, flags2) = self.flags();
        writer.write_byte(flags)?;
        if self.extended {
            writer.write_byte(flags2)?;
        }
        writer.write_u16(self.depth)?;
        if let Some(name) = &self.class_name {
            writer.write_cstring(name, "class name")?;
        }
        if let Some(character) = self.character {
            writer.write_u16(character)?;
        }
        if let Some(transform) = &self.transform {
            transform.encode(writer, ctx)?;
        }
        if let Some(cxform) = &self.color_transform {
            cxform.encode(writer, ctx)?;
        }
        if let Some(ratio) = self.ratio {
            writer.write_u16(ratio)?;
        }
        if let Some(name) = &self.name {
            writer.write_cstring(name, "name")?;
        }
        if let Some(depth) = self.clip_depth {
            writer.write_u16(depth)?;
        }
        if let Some(filters) = &self.filters {
            encode_filters(filters, writer, ctx)?;
        }
        for byte in [self.blend_mode, self.cache_as_bitmap, self.visible].into_iter().flatten() {
            writer.write_byte(byte)?;
        }
        if let Some(color) = self.background {
            write_rgba(writer, color)?;
        }
        if let Some(clip) = &self.clip_actions {
            encode_clip_actions(clip, writer, ctx)?;
        }
        Ok(())
    }
}

fn numbered_names_size(entries: &[(u32, String)], ctx: &Context<'_>) -> usize {
    variable_u32_size(entries.len() as u32)
        + entries
            .iter()
            .map(|(frame, name)| variable_u32_size(*frame) + cstring_size(name, ctx))
            .sum::<usize>()
}

fn encode_numbered_names(
    entries: &[(u32, String)],
    writer: &mut Writer<'_>,
    field: &'static str,
) -> Result<(), EncodeError> {
    writer.write_variable_u32(entries.len() as u32)?;
    for (frame, name) in entries {
        writer.write_variable_u32(*frame)?;
        writer.write_cstring(name, field)?;
    }
    Ok(())
}

impl MovieTag {
    /// Returns the size of the record body, excluding the header.
    fn body_size(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        Ok(match self {
            MovieTag::ShowFrame => 0,
            MovieTag::DefineShape(shape) => {
                2 + shape.bounds.prepare_to_encode(ctx)? + shape.shape.prepare_to_encode(ctx)?
            }
            MovieTag::SetBackgroundColor(color) => color.prepare_to_encode(ctx)?,
            MovieTag::DoAction(actions) => actions_size(actions, ctx)?,
            MovieTag::DefineImage(image) => 7 + usize::from(image.table_size.is_some()) + image.data.len(),
            MovieTag::Protect(password) => password.as_deref().map_or(0, |p| cstring_size(p, ctx)),
            MovieTag::PlaceObject(place) => place.body_size(ctx)?,
            MovieTag::RemoveObject { .. } => 2,
            MovieTag::DefineSprite(sprite) => {
                let mut size = 4 + 2;
                for tag in &sprite.tags {
                    size += tag.prepare_to_encode(ctx)?;
                }
                size
            }
            MovieTag::FrameLabel(label) => cstring_size(&label.name, ctx) + usize::from(label.anchor),
            MovieTag::ExportAssets(exports) => {
                2 + exports.iter().map(|(_, name)| 2 + cstring_size(name, ctx)).sum::<usize>()
            }
            MovieTag::DoInitAction { actions, .. } => 2 + actions_size(actions, ctx)?,
            MovieTag::ScriptLimits { .. } => 4,
            MovieTag::FileAttributes(_) => 4,
            MovieTag::Metadata(text) => cstring_size(text, ctx),
            MovieTag::SceneData(data) => {
                numbered_names_size(&data.scenes, ctx) + numbered_names_size(&data.labels, ctx)
            }
            MovieTag::Unknown { data, .. } => data.len(),
        })
    }

    fn encode_body(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        match self {
            MovieTag::ShowFrame => Ok(()),
            MovieTag::DefineShape(shape) => {
                writer.write_u16(shape.id)?;
                shape.bounds.encode(writer, ctx)?;
                shape.shape.encode(writer, ctx)
            }
            MovieTag::SetBackgroundColor(color) => color.encode(writer, ctx),
            MovieTag::DoAction(actions) => encode_actions(actions, writer, ctx),
            MovieTag::DefineImage(image) => {
                if image.table_size.is_some() != (image.format == ImageFormat::Indexed) {
                    return Err(EncodeError::InvalidValue {
                        field: "color table size",
                        reason: "present exactly for indexed images",
                    });
                }
                writer.write_u16(image.id)?;
                writer.write_byte(image.format as u8)?;
                writer.write_u16(image.width)?;
                writer.write_u16(image.height)?;
                if let Some(size) = image.table_size {
                    writer.write_byte(size)?;
                }
                writer.write_bytes(&image.data)
            }
            MovieTag::Protect(password) => match password {
                Some(password) => writer.write_cstring(password, "password"),
                None => Ok(()),
            },
            MovieTag::PlaceObject(place) => place.encode_body(writer, ctx),
            MovieTag::RemoveObject { depth } => writer.write_u16(*depth),
            MovieTag::DefineSprite(sprite) => {
                writer.write_u16(sprite.id)?;
                writer.write_u16(sprite.frame_count)?;
                for tag in &sprite.tags {
                    tag.encode(writer, ctx)?;
                }
                TagHeader::new(codes::END, 0).write(writer)
            }
            MovieTag::FrameLabel(label) => {
                writer.write_cstring(&label.name, "label")?;
                if label.anchor {
                    writer.write_byte(1)?;
                }
                Ok(())
            }
            MovieTag::ExportAssets(exports) => {
                let count = u16::try_from(exports.len()).map_err(|_| EncodeError::LengthExceedsLimit {
                    field: "exports",
                    len: exports.len(),
                    max: u16::MAX as usize,
                })?;
                writer.write_u16(count)?;
                for (id, name) in exports {
                    writer.write_u16(*id)?;
                    writer.write_cstring(name, "export name")?;
                }
                Ok(())
            }
            MovieTag::DoInitAction { sprite_id, actions } => {
                writer.write_u16(*sprite_id)?;
                encode_actions(actions, writer, ctx)
            }
            MovieTag::ScriptLimits { max_recursion, timeout_seconds } => {
                writer.write_u16(*max_recursion)?;
                writer.write_u16(*timeout_seconds)
            }
            MovieTag::FileAttributes(flags) => writer.write_u32(*flags),
            MovieTag::Metadata(text) => writer.write_cstring(text, "metadata"),
            MovieTag::SceneData(data) => {
                encode_numbered_names(&data.scenes, writer, "scene")?;
                encode_numbered_names(&data.labels, writer, "frame label")
            }
            MovieTag::Unknown { data, .. } => writer.write_bytes(data),
        }
    }

    fn header(&self, body: usize) -> Result<TagHeader, EncodeError> {
        let length = u32::try_from(body).map_err(|_| EncodeError::LengthExceedsLimit {
            field: "record body",
            len: body,
            max: u32::MAX as usize,
        })?;
        Ok(if self.requires_extended_header() {
            TagHeader::extended(self.code(), length)
        } else {
            TagHeader::new(self.code(), length)
        })
    }
}

impl Coder for MovieTag {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let registry = ctx.registry()?;
        registry.tags.get_object(reader, ctx)
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        let code = self.code();
        let body = ctx.scope(|ctx| -> Result<usize, EncodeError> {
            configure_context(code, ctx);
            self.body_size(ctx)
        })?;
        Ok(self.header(body)?.total_len())
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        let code = self.code();
        ctx.scope(|ctx| -> Result<(), EncodeError> {
            configure_context(code, ctx);
            let header = self.header(self.body_size(ctx)?)?;
            encode_framed(writer, header, object_name(code), |w| self.encode_body(w, ctx))
        })
    }
}

// =============================================================================
// IMAGES
// =============================================================================

impl DefineImage {
    /// Creates a 32-bit image with alpha from ARGB pixels, row by row.
    pub fn from_argb(id: u16, width: u16, height: u16, argb: &[u8]) -> Result<Self, EncodeError> {
        let expected = width as usize * height as usize * 4;
        if argb.len() != expected {
            return Err(EncodeError::InvalidValue {
                field: "pixels",
                reason: "length must be width * height * 4",
            });
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(argb)
            .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
        let data = encoder
            .finish()
            .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
        Ok(Self {
            alpha: true,
            id,
            format: ImageFormat::Rgb32,
            width,
            height,
            table_size: None,
            data,
        })
    }

    /// Inflates the color table and pixel data.
    pub fn pixels(&self) -> Result<Vec<u8>, DecodeError> {
        let mut pixels = Vec::new();
        ZlibDecoder::new(self.data.as_slice())
            .take(MAX_MOVIE_SIZE as u64 + 1)
            .read_to_end(&mut pixels)
            .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
        if pixels.len() > MAX_MOVIE_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "pixels",
                len: pixels.len(),
                max: MAX_MOVIE_SIZE,
            });
        }
        Ok(pixels)
    }
}
