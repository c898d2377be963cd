//! Coder for the media container (FLV).
//!
//! Unlike movie records, media fields are big-endian. Each tag is followed
//! by a u32 holding the size of the tag including its 11-byte header, which
//! is checked on decode.

use tracing::debug;

use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::registry::{DecoderRegistry, Factory};
use crate::codec::text::TextEncoding;
use crate::codec::{Coder, check_unsigned};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_NESTING_DEPTH, MEDIA_HEADER_LEN, MEDIA_TAG_HEADER_LEN, SIGNATURE_MEDIA};
use crate::model::media::{AmfValue, AudioData, FlvBody, FlvFile, FlvTag, VideoData, tag_types};

const HAS_AUDIO: u8 = 0x04;
const HAS_VIDEO: u8 = 0x01;

/// Marker following the empty key that ends an object.
const OBJECT_END: u8 = 9;

/// Media tags are keyed by their type byte.
pub(crate) fn media_type(reader: &Reader<'_>) -> Result<u16, DecodeError> {
    reader.scan_byte().map(u16::from)
}

pub(crate) fn register_defaults(factory: &mut Factory<FlvTag>) {
    factory.register(tag_types::AUDIO as u16, decode_audio);
    factory.register(tag_types::VIDEO as u16, decode_video);
    factory.register(tag_types::SCRIPT as u16, decode_script);
}

fn read_u24(reader: &mut Reader<'_>, context: &'static str) -> Result<u32, DecodeError> {
    Ok(reader.read_word_be(3, false, context)? as u32)
}

fn read_u32_be(reader: &mut Reader<'_>, context: &'static str) -> Result<u32, DecodeError> {
    Ok(reader.read_word_be(4, false, context)? as u32)
}

/// Reads a tag header, hands the body to `body` and checks the trailing
/// previous-tag-size field.
fn decode_tag(
    reader: &mut Reader<'_>,
    body: impl FnOnce(u8, &mut Reader<'_>) -> Result<FlvBody, DecodeError>,
) -> Result<FlvTag, DecodeError> {
    let location = reader.location();
    let tag_type = reader.read_byte("media tag type")?;
    let size = read_u24(reader, "media tag size")?;
    let low = read_u24(reader, "timestamp")?;
    let high = reader.read_byte("timestamp extension")? as u32;
    let stream_id = read_u24(reader, "stream id")?;

    let mut data = reader.slice(size as usize, "media tag body")?;
    let body = body(tag_type, &mut data)?;

    let declared = read_u32_be(reader, "previous tag size")? as usize;
    let actual = MEDIA_TAG_HEADER_LEN + size as usize;
    if declared != actual {
        let delta = (actual as i64 - declared as i64) * 8;
        return Err(DecodeError::mismatch("FlvTag", location, declared, delta));
    }
    Ok(FlvTag { timestamp: high << 24 | low, stream_id, body })
}

fn decode_audio(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<FlvTag, DecodeError> {
    decode_tag(reader, |_, data| {
        let flags = data.read_byte("audio flags")?;
        Ok(FlvBody::Audio(AudioData {
            format: flags >> 4,
            rate: (flags >> 2) & 0x3,
            sixteen_bit: flags & 0x02 != 0,
            stereo: flags & 0x01 != 0,
            data: data.read_remaining().to_vec(),
        }))
    })
}

fn decode_video(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<FlvTag, DecodeError> {
    decode_tag(reader, |_, data| {
        let flags = data.read_byte("video flags")?;
        Ok(FlvBody::Video(VideoData {
            frame_type: flags >> 4,
            codec: flags & 0x0F,
            data: data.read_remaining().to_vec(),
        }))
    })
}

fn decode_script(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<FlvTag, DecodeError> {
    decode_tag(reader, |_, data| {
        let mut values = Vec::new();
        while !data.is_empty() {
            values.push(decode_amf(data, 0)?);
        }
        Ok(FlvBody::Script(values))
    })
}

/// Preserves a media tag without a registered decoder.
pub(crate) fn decode_unknown(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<FlvTag, DecodeError> {
    decode_tag(reader, |tag_type, data| {
        debug!(tag_type, length = data.remaining_len(), "preserving unknown media tag");
        Ok(FlvBody::Unknown { tag_type, data: data.read_remaining().to_vec() })
    })
}

// =============================================================================
// SCRIPT DATA (AMF0)
// =============================================================================

fn read_utf8(reader: &mut Reader<'_>, len: usize, field: &'static str) -> Result<String, DecodeError> {
    let bytes = reader.read_bytes(len, field)?;
    TextEncoding::Utf8.decode(bytes, field)
}

fn read_short_string(reader: &mut Reader<'_>) -> Result<String, DecodeError> {
    let len = reader.read_word_be(2, false, "string length")? as usize;
    read_utf8(reader, len, "script string")
}

/// Reads key/value pairs up to the empty key and end marker.
fn decode_pairs(reader: &mut Reader<'_>, depth: usize) -> Result<Vec<(String, AmfValue)>, DecodeError> {
    let mut entries = Vec::new();
    loop {
        let key = read_short_string(reader)?;
        if key.is_empty() && reader.scan_byte()? == OBJECT_END {
            reader.read_byte("object end")?;
            return Ok(entries);
        }
        let value = decode_amf(reader, depth + 1)?;
        entries.push((key, value));
    }
}

fn decode_amf(reader: &mut Reader<'_>, depth: usize) -> Result<AmfValue, DecodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DecodeError::LengthExceedsLimit {
            field: "script value nesting",
            len: depth,
            max: MAX_NESTING_DEPTH,
        });
    }
    let location = reader.location();
    let marker = reader.read_byte("script value marker")?;
    Ok(match marker {
        0 => AmfValue::Number(reader.read_f64_be("number")?),
        1 => AmfValue::Bool(reader.read_byte("bool")? != 0),
        2 => AmfValue::String(read_short_string(reader)?),
        3 => AmfValue::Object(decode_pairs(reader, depth)?),
        5 => AmfValue::Null,
        6 => AmfValue::Undefined,
        8 => {
            let count = read_u32_be(reader, "array count")?;
            AmfValue::EcmaArray { count, entries: decode_pairs(reader, depth)? }
        }
        10 => {
            let count = read_u32_be(reader, "array count")? as usize;
            let mut items = Vec::with_capacity(count.min(reader.remaining_len()));
            for _ in 0..count {
                items.push(decode_amf(reader, depth + 1)?);
            }
            AmfValue::StrictArray(items)
        }
        11 => {
            let millis = reader.read_f64_be("date")?;
            let timezone = reader.read_word_be(2, true, "timezone")? as i16;
            AmfValue::Date { millis, timezone }
        }
        12 => {
            let len = read_u32_be(reader, "string length")? as usize;
            AmfValue::LongString(read_utf8(reader, len, "script string")?)
        }
        code => {
            return Err(DecodeError::UnsupportedVariant {
                family: "script value",
                code: code as u16,
                location,
            });
        }
    })
}

fn pairs_size(entries: &[(String, AmfValue)]) -> usize {
    entries.iter().map(|(key, value)| 2 + key.len() + value.encoded_size()).sum::<usize>() + 3
}

impl AmfValue {
    fn encoded_size(&self) -> usize {
        1 + match self {
            AmfValue::Number(_) => 8,
            AmfValue::Bool(_) => 1,
            AmfValue::String(text) => 2 + text.len(),
            AmfValue::Object(entries) => pairs_size(entries),
            AmfValue::Null | AmfValue::Undefined => 0,
            AmfValue::EcmaArray { entries, .. } => 4 + pairs_size(entries),
            AmfValue::StrictArray(items) => 4 + items.iter().map(AmfValue::encoded_size).sum::<usize>(),
            AmfValue::Date { .. } => 10,
            AmfValue::LongString(text) => 4 + text.len(),
        }
    }

    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
        writer.write_byte(self.marker())?;
        match self {
            AmfValue::Number(value) => writer.write_f64_be(*value),
            AmfValue::Bool(flag) => writer.write_byte(u8::from(*flag)),
            AmfValue::String(text) => write_short_string(writer, text),
            AmfValue::Object(entries) => encode_pairs(writer, entries),
            AmfValue::Null | AmfValue::Undefined => Ok(()),
            AmfValue::EcmaArray { count, entries } => {
                writer.write_word_be(*count as i64, 4)?;
                encode_pairs(writer, entries)
            }
            AmfValue::StrictArray(items) => {
                writer.write_word_be(items.len() as i64, 4)?;
                items.iter().try_for_each(|item| item.encode(writer))
            }
            AmfValue::Date { millis, timezone } => {
                writer.write_f64_be(*millis)?;
                writer.write_word_be(*timezone as i64, 2)
            }
            AmfValue::LongString(text) => {
                writer.write_word_be(text.len() as i64, 4)?;
                writer.write_bytes(text.as_bytes())
            }
        }
    }
}

fn write_short_string(writer: &mut Writer<'_>, text: &str) -> Result<(), EncodeError> {
    if text.len() > u16::MAX as usize {
        return Err(EncodeError::LengthExceedsLimit {
            field: "script string",
            len: text.len(),
            max: u16::MAX as usize,
        });
    }
    writer.write_word_be(text.len() as i64, 2)?;
    writer.write_bytes(text.as_bytes())
}

fn encode_pairs(writer: &mut Writer<'_>, entries: &[(String, AmfValue)]) -> Result<(), EncodeError> {
    // No value uses the end marker, so an empty key followed by a value is
    // never read as the end of the object.
    for (key, value) in entries {
        write_short_string(writer, key)?;
        value.encode(writer)?;
    }
    writer.write_bytes(&[0, 0, OBJECT_END])
}

// =============================================================================
// TAGS AND FILES
// =============================================================================

impl FlvBody {
    fn encoded_size(&self) -> usize {
        match self {
            FlvBody::Audio(audio) => 1 + audio.data.len(),
            FlvBody::Video(video) => 1 + video.data.len(),
            FlvBody::Script(values) => values.iter().map(AmfValue::encoded_size).sum(),
            FlvBody::Unknown { data, .. } => data.len(),
        }
    }

    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            FlvBody::Audio(audio) => {
                check_unsigned("sound format", audio.format as u32, 4)?;
                check_unsigned("sound rate", audio.rate as u32, 2)?;
                let flags = audio.format << 4
                    | audio.rate << 2
                    | u8::from(audio.sixteen_bit) << 1
                    | u8::from(audio.stereo);
                writer.write_byte(flags)?;
                writer.write_bytes(&audio.data)
            }
            FlvBody::Video(video) => {
                check_unsigned("frame type", video.frame_type as u32, 4)?;
                check_unsigned("video codec", video.codec as u32, 4)?;
                writer.write_byte(video.frame_type << 4 | video.codec)?;
                writer.write_bytes(&video.data)
            }
            FlvBody::Script(values) => values.iter().try_for_each(|value| value.encode(writer)),
            FlvBody::Unknown { data, .. } => writer.write_bytes(data),
        }
    }
}

impl Coder for FlvTag {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let registry = ctx.registry()?;
        registry.media.get_object(reader, ctx)
    }

    fn prepare_to_encode(&self, _ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        Ok(MEDIA_TAG_HEADER_LEN + self.body.encoded_size() + 4)
    }

    fn encode(&self, writer: &mut Writer<'_>, _ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        let size = self.body.encoded_size();
        if size > 0xFF_FFFF {
            return Err(EncodeError::LengthExceedsLimit { field: "media tag", len: size, max: 0xFF_FFFF });
        }
        check_unsigned("stream id", self.stream_id, 24)?;

        writer.write_byte(self.body.tag_type())?;
        writer.write_word_be(size as i64, 3)?;
        writer.write_word_be((self.timestamp & 0xFF_FFFF) as i64, 3)?;
        writer.write_byte((self.timestamp >> 24) as u8)?;
        writer.write_word_be(self.stream_id as i64, 3)?;
        writer.mark();
        self.body.encode(writer)?;
        writer.unmark(size, "FlvTag")?;
        writer.write_word_be((MEDIA_TAG_HEADER_LEN + size) as i64, 4)
    }
}

/// Decodes a media file.
pub fn decode_flv(input: &[u8]) -> Result<FlvFile, DecodeError> {
    let registry = DecoderRegistry::new();
    let mut ctx = Context::with_registry(&registry);
    let mut reader = Reader::new(input);

    let signature = reader.read_bytes(3, "signature")?;
    if signature != SIGNATURE_MEDIA {
        return Err(DecodeError::InvalidSignature { found: [signature[0], signature[1], signature[2]] });
    }
    let version = reader.read_byte("version")?;
    let flags = reader.read_byte("flags")?;
    let offset = read_u32_be(&mut reader, "header size")?;
    if offset < MEDIA_HEADER_LEN {
        return Err(DecodeError::MalformedEncoding { context: "media header size below 9" });
    }
    let header_extra = reader.read_bytes((offset - MEDIA_HEADER_LEN) as usize, "media header")?.to_vec();
    let first_previous_size = read_u32_be(&mut reader, "previous tag size")?;

    let mut tags = Vec::new();
    while !reader.is_empty() {
        let tag = FlvTag::decode(&mut reader, &mut ctx)?;
        debug!(tag_type = tag.body.tag_type(), timestamp = tag.timestamp, "decoded media tag");
        tags.push(tag);
    }
    Ok(FlvFile {
        version,
        has_audio: flags & HAS_AUDIO != 0,
        has_video: flags & HAS_VIDEO != 0,
        reserved_flags: flags & !(HAS_AUDIO | HAS_VIDEO),
        header_extra,
        first_previous_size,
        tags,
    })
}

/// Encodes a media file.
pub fn encode_flv(file: &FlvFile) -> Result<Vec<u8>, EncodeError> {
    let mut ctx = Context::new();
    if file.reserved_flags & (HAS_AUDIO | HAS_VIDEO) != 0 {
        return Err(EncodeError::InvalidValue {
            field: "reserved_flags",
            reason: "overlaps the audio and video flags",
        });
    }
    let offset = u32::try_from(MEDIA_HEADER_LEN as usize + file.header_extra.len()).map_err(|_| {
        EncodeError::LengthExceedsLimit {
            field: "media header",
            len: file.header_extra.len(),
            max: (u32::MAX - MEDIA_HEADER_LEN) as usize,
        }
    })?;
    let mut size = offset as usize + 4;
    for tag in &file.tags {
        size += tag.prepare_to_encode(&mut ctx)?;
    }

    let mut writer = Writer::with_capacity(size);
    writer.write_bytes(SIGNATURE_MEDIA)?;
    writer.write_byte(file.version)?;
    let mut flags = file.reserved_flags;
    if file.has_audio {
        flags |= HAS_AUDIO;
    }
    if file.has_video {
        flags |= HAS_VIDEO;
    }
    writer.write_byte(flags)?;
    writer.write_word_be(offset as i64, 4)?;
    writer.write_bytes(&file.header_extra)?;
    writer.write_word_be(file.first_previous_size as i64, 4)?;
    for tag in &file.tags {
        tag.encode(&mut writer, &mut ctx)?;
    }
    Ok(writer.into_bytes())
}
