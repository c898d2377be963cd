//! Movie file encoding and decoding.
//!
//! A movie starts with an 8-byte prefix: a 3-byte signature (`FWS`, or
//! `CWS` when the rest of the file is zlib-compressed), the version and the
//! total uncompressed file length. The body holds the stage bounds, frame
//! rate, frame count and the records up to the End record.

use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tracing::{debug, warn};

use crate::codec::Coder;
use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::header::TagHeader;
use crate::codec::registry::DecoderRegistry;
use crate::codec::text::TextEncoding;
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    MAX_MOVIE_SIZE, MAX_MOVIE_VERSION, MOVIE_PREFIX_LEN, SIGNATURE_COMPRESSED, SIGNATURE_UNCOMPRESSED,
    UNICODE_MOVIE_VERSION,
};
use crate::model::datatypes::Bounds;
use crate::model::movie::Movie;
use crate::model::tag::{MovieTag, codes};

/// Returns the text encoding a movie of `version` uses unless overridden.
pub fn default_encoding(version: u8) -> TextEncoding {
    if version >= UNICODE_MOVIE_VERSION {
        TextEncoding::Utf8
    } else {
        TextEncoding::Latin1
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Options for decoding movies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Text encoding for string fields. Defaults to UTF-8 from version 6
    /// and ISO-8859-1 below.
    pub encoding: Option<TextEncoding>,
    /// Fail on records without a registered decoder instead of keeping
    /// them as [`MovieTag::Unknown`].
    pub strict: bool,
    /// Keep records whose body fails to decode as [`MovieTag::Unknown`]
    /// instead of failing.
    pub skip_malformed: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that reject unknown records.
    pub fn strict() -> Self {
        Self { strict: true, ..Self::default() }
    }
}

/// Progress of a [`TagStream`] through the records of a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The next call reads a record header.
    AwaitingHeader,
    /// A header was read and its body is being decoded.
    HeaderRead,
    /// The last record was decoded.
    BodyDecoded,
    /// The End record was read or the input is exhausted.
    Finished,
}

/// Iterator over the records of a movie body.
///
/// Every record is sliced to its declared length before it is decoded, so
/// an error in one body leaves the stream at the next record and iteration
/// may continue.
#[derive(Debug)]
pub struct TagStream<'a, 'r> {
    reader: Reader<'a>,
    ctx: Context<'r>,
    options: DecodeOptions,
    state: StreamState,
}

impl<'a, 'r> TagStream<'a, 'r> {
    /// Creates a stream over `records`, the bytes following the frame count.
    pub fn new(records: &'a [u8], version: u8, options: &DecodeOptions, registry: &'r DecoderRegistry) -> Self {
        let encoding = options.encoding.unwrap_or_else(|| default_encoding(version));
        let mut reader = Reader::new(records);
        reader.set_encoding(encoding);
        let mut ctx = Context::with_registry(registry);
        ctx.set_version(version).set_encoding(encoding);
        Self { reader, ctx, options: *options, state: StreamState::AwaitingHeader }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Returns the byte offset of the next record.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    fn fail(&mut self, err: DecodeError) -> Option<Result<MovieTag, DecodeError>> {
        self.state = StreamState::Finished;
        Some(Err(err))
    }
}

impl Iterator for TagStream<'_, '_> {
    type Item = Result<MovieTag, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == StreamState::Finished {
            return None;
        }
        if self.reader.is_empty() {
            self.state = StreamState::Finished;
            return None;
        }

        let location = self.reader.location();
        let header = match TagHeader::peek(&self.reader) {
            Ok(header) => header,
            Err(err) => return self.fail(err),
        };
        self.state = StreamState::HeaderRead;
        if header.code == codes::END {
            self.state = StreamState::Finished;
            return None;
        }
        let mut record = match self.reader.slice(header.total_len(), "record") {
            Ok(record) => record,
            Err(err) => return self.fail(err),
        };

        let registry = match self.ctx.registry() {
            Ok(registry) => registry,
            Err(err) => return self.fail(err.into()),
        };
        if self.options.strict && !registry.tags.contains(header.code) {
            self.state = StreamState::AwaitingHeader;
            return Some(Err(DecodeError::UnknownTag {
                family: registry.tags.family(),
                code: header.code,
                length: header.length as usize,
                location,
            }));
        }

        let mut raw = record.clone();
        let result = MovieTag::decode(&mut record, &mut self.ctx);
        match result {
            Ok(tag) => {
                debug!(code = header.code, length = header.length, location, "decoded record");
                self.state = StreamState::BodyDecoded;
                Some(Ok(tag))
            }
            Err(err) if self.options.skip_malformed => {
                warn!(code = header.code, location, error = %err, "keeping malformed record as raw bytes");
                self.state = StreamState::BodyDecoded;
                if let Err(err) = raw.skip(header.header_len(), "record header") {
                    return self.fail(err);
                }
                Some(Ok(MovieTag::Unknown {
                    code: header.code,
                    data: raw.read_remaining().to_vec(),
                    extended: header.extended,
                }))
            }
            Err(err) => {
                self.state = StreamState::AwaitingHeader;
                Some(Err(err))
            }
        }
    }
}

/// Checks the prefix and returns the version, the compression flag and the
/// (inflated) body.
fn unpack(input: &[u8]) -> Result<(u8, bool, Cow<'_, [u8]>), DecodeError> {
    if input.len() < MOVIE_PREFIX_LEN {
        return Err(DecodeError::UnexpectedEof { context: "movie header", position: input.len() * 8 });
    }
    let signature = [input[0], input[1], input[2]];
    let compressed = match &signature {
        s if s == SIGNATURE_UNCOMPRESSED => false,
        s if s == SIGNATURE_COMPRESSED => true,
        _ => return Err(DecodeError::InvalidSignature { found: signature }),
    };
    let version = input[3];
    if version > MAX_MOVIE_VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    let length = u32::from_le_bytes([input[4], input[5], input[6], input[7]]) as usize;
    if length > MAX_MOVIE_SIZE {
        return Err(DecodeError::LengthExceedsLimit { field: "movie", len: length, max: MAX_MOVIE_SIZE });
    }
    let body_len = length
        .checked_sub(MOVIE_PREFIX_LEN)
        .ok_or(DecodeError::MalformedEncoding { context: "movie length shorter than its header" })?;

    let rest = &input[MOVIE_PREFIX_LEN..];
    if !compressed {
        return Ok((version, false, Cow::Borrowed(&rest[..body_len.min(rest.len())])));
    }

    let mut body = Vec::with_capacity(body_len.min(rest.len().saturating_mul(4)));
    ZlibDecoder::new(rest)
        .take(body_len as u64)
        .read_to_end(&mut body)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
    Ok((version, true, Cow::Owned(body)))
}

/// Decodes a movie with default options.
pub fn decode_movie(input: &[u8]) -> Result<Movie, DecodeError> {
    decode_movie_with_options(input, &DecodeOptions::default())
}

pub fn decode_movie_with_options(input: &[u8], options: &DecodeOptions) -> Result<Movie, DecodeError> {
    let registry = DecoderRegistry::new();
    decode_movie_with(input, options, &registry)
}

/// Decodes a movie using the decoders in `registry`.
pub fn decode_movie_with(
    input: &[u8],
    options: &DecodeOptions,
    registry: &DecoderRegistry,
) -> Result<Movie, DecodeError> {
    let (version, compressed, body) = unpack(input)?;
    let mut reader = Reader::new(&body);
    let mut ctx = Context::with_registry(registry);
    ctx.set_version(version);
    let frame_size = Bounds::decode(&mut reader, &mut ctx)?;
    let frame_rate = reader.read_fixed8("frame rate")?;
    let frame_count = reader.read_u16("frame count")?;
    debug!(version, compressed, frame_count, "decoded movie header");

    let tags = TagStream::new(reader.read_remaining(), version, options, registry)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Movie { version, compressed, frame_size, frame_rate, frame_count, tags })
}

/// Reads and decodes a movie from `source`.
pub fn read_movie(source: impl Read, options: &DecodeOptions) -> Result<Movie, DecodeError> {
    let mut input = Vec::new();
    source.take(MAX_MOVIE_SIZE as u64 + 1).read_to_end(&mut input)?;
    if input.len() > MAX_MOVIE_SIZE {
        return Err(DecodeError::LengthExceedsLimit { field: "movie", len: input.len(), max: MAX_MOVIE_SIZE });
    }
    decode_movie_with_options(&input, options)
}

// =============================================================================
// ENCODING
// =============================================================================

/// Options for encoding movies.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Overrides [`Movie::compressed`].
    pub compress: Option<bool>,
    /// zlib level from 0 to 9.
    pub compression_level: u32,
    /// Text encoding for string fields, defaulting as for decoding.
    pub encoding: Option<TextEncoding>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { compress: None, compression_level: 6, encoding: None }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that always compress at the given level.
    pub fn compressed(level: u32) -> Self {
        Self { compress: Some(true), compression_level: level, ..Self::default() }
    }
}

/// Encodes a movie with default options.
pub fn encode_movie(movie: &Movie) -> Result<Vec<u8>, EncodeError> {
    encode_movie_with_options(movie, &EncodeOptions::default())
}

pub fn encode_movie_with_options(movie: &Movie, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    write_movie(movie, &mut out, options)?;
    Ok(out)
}

/// Encodes a movie to `sink`. Compressed bodies are streamed through the
/// zlib encoder as the writer's buffer fills.
pub fn write_movie(movie: &Movie, sink: &mut dyn Write, options: &EncodeOptions) -> Result<(), EncodeError> {
    let encoding = options.encoding.unwrap_or_else(|| default_encoding(movie.version));
    let mut ctx = Context::new();
    ctx.set_version(movie.version).set_encoding(encoding);

    let mut body_len = movie.frame_size.prepare_to_encode(&mut ctx)? + 2 + 2;
    for tag in &movie.tags {
        body_len += tag.prepare_to_encode(&mut ctx)?;
    }
    body_len += TagHeader::new(codes::END, 0).total_len();
    let total = MOVIE_PREFIX_LEN + body_len;
    let length = u32::try_from(total).map_err(|_| EncodeError::LengthExceedsLimit {
        field: "movie",
        len: total,
        max: u32::MAX as usize,
    })?;

    let compress = options.compress.unwrap_or(movie.compressed);
    let signature = if compress { SIGNATURE_COMPRESSED } else { SIGNATURE_UNCOMPRESSED };
    sink.write_all(signature)?;
    sink.write_all(&[movie.version])?;
    sink.write_all(&length.to_le_bytes())?;
    debug!(version = movie.version, compress, length, "encoding movie");

    if compress {
        let level = Compression::new(options.compression_level.min(9));
        let mut encoder = ZlibEncoder::new(sink, level);
        write_body(movie, &mut encoder, &mut ctx, encoding, body_len)?;
        encoder.finish().map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
        Ok(())
    } else {
        write_body(movie, sink, &mut ctx, encoding, body_len)
    }
}

fn write_body(
    movie: &Movie,
    sink: &mut dyn Write,
    ctx: &mut Context<'_>,
    encoding: TextEncoding,
    expected: usize,
) -> Result<(), EncodeError> {
    let mut writer = Writer::with_sink(sink);
    writer.set_encoding(encoding);
    writer.mark();
    movie.frame_size.encode(&mut writer, ctx)?;
    writer.write_fixed8(movie.frame_rate)?;
    writer.write_u16(movie.frame_count)?;
    for tag in &movie.tags {
        tag.encode(&mut writer, ctx)?;
    }
    TagHeader::new(codes::END, 0).write(&mut writer)?;
    writer.unmark(expected, "Movie")?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::datatypes::Color;
    use proptest::prelude::*;
    use crate::model::shape::{FillStyle, Line, LineStyle, ShapeRecord, ShapeStyleChange, ShapeWithStyle};
    use crate::model::tag::{DefineShape, PlaceObject, ShapeVersion};

    fn sample_movie() -> Movie {
        let mut movie = Movie::new(8);
        movie.frame_count = 1;
        movie.tags = vec![
            MovieTag::FileAttributes(0),
            MovieTag::SetBackgroundColor(Color::WHITE),
            MovieTag::DefineShape(DefineShape {
                version: ShapeVersion::V3,
                id: 1,
                bounds: Bounds::new(0, 0, 400, 400),
                shape: ShapeWithStyle {
                    fill_styles: vec![FillStyle::Solid(Color::rgba(0, 0, 255, 200))],
                    line_styles: vec![LineStyle { width: 20, color: Color::BLACK }],
                    records: vec![
                        ShapeRecord::StyleChange(ShapeStyleChange {
                            move_to: Some((0, 0)),
                            fill_style0: Some(1),
                            line_style: Some(1),
                            ..ShapeStyleChange::default()
                        }),
                        ShapeRecord::Line(Line { dx: 400, dy: 0 }),
                        ShapeRecord::Line(Line { dx: 0, dy: 400 }),
                        ShapeRecord::Line(Line { dx: -400, dy: 0 }),
                        ShapeRecord::Line(Line { dx: 0, dy: -400 }),
                    ],
                },
            }),
            MovieTag::PlaceObject(PlaceObject { depth: 1, character: Some(1), ..PlaceObject::default() }),
            MovieTag::ShowFrame,
        ];
        movie
    }

    #[test]
    fn test_movie_roundtrip() {
        let movie = sample_movie();
        let bytes = encode_movie(&movie).unwrap();
        assert_eq!(&bytes[..4], b"FWS\x08");
        let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(length, bytes.len());
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
        assert_eq!(decode_movie(&bytes).unwrap(), movie);
    }

    #[test]
    fn test_compressed_roundtrip() {
        let mut movie = sample_movie();
        let plain = encode_movie(&movie).unwrap();

        movie.compressed = true;
        let bytes = encode_movie(&movie).unwrap();
        assert_eq!(&bytes[..3], b"CWS");
        // The length field holds the uncompressed size.
        assert_eq!(&bytes[4..8], &plain[4..8]);
        assert_eq!(decode_movie(&bytes).unwrap(), movie);

        let options = EncodeOptions { compress: Some(false), ..EncodeOptions::default() };
        let forced = encode_movie_with_options(&movie, &options).unwrap();
        assert_eq!(forced, plain);
    }

    #[test]
    fn test_read_and_write_streams() {
        let movie = sample_movie();
        let mut out = Vec::new();
        write_movie(&movie, &mut out, &EncodeOptions::compressed(9)).unwrap();
        let decoded = read_movie(std::io::Cursor::new(out), &DecodeOptions::default()).unwrap();
        assert!(decoded.compressed);
        assert_eq!(decoded.tags, movie.tags);
    }

    #[test]
    fn test_invalid_prefix() {
        assert_eq!(
            decode_movie(b"XWS\x08\x10\x00\x00\x00").unwrap_err(),
            DecodeError::InvalidSignature { found: *b"XWS" }
        );
        assert_eq!(
            decode_movie(b"FWS\x33\x10\x00\x00\x00").unwrap_err(),
            DecodeError::UnsupportedVersion { version: 51 }
        );
        assert!(matches!(decode_movie(b"FWS").unwrap_err(), DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_strict_rejects_unknown_records() {
        let mut movie = Movie::new(8);
        movie.tags = vec![MovieTag::Unknown { code: 300, data: vec![1, 2], extended: false }, MovieTag::ShowFrame];
        let bytes = encode_movie(&movie).unwrap();

        assert_eq!(decode_movie(&bytes).unwrap(), movie);
        let err = decode_movie_with_options(&bytes, &DecodeOptions::strict()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag { code: 300, length: 2, .. }));
    }

    /// A movie whose SetBackgroundColor record declares four body bytes.
    fn malformed_movie() -> Vec<u8> {
        let mut bytes = encode_movie(&Movie::new(8)).unwrap();
        let end = bytes.len() - 2;
        bytes.splice(end..end, [0x44, 0x02, 1, 2, 3, 4]);
        let length = bytes.len() as u32;
        bytes[4..8].copy_from_slice(&length.to_le_bytes());
        bytes
    }

    #[test]
    fn test_skip_malformed_records() {
        let bytes = malformed_movie();
        let err = decode_movie(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Underflow { object: "SetBackgroundColor", .. }));

        let options = DecodeOptions { skip_malformed: true, ..DecodeOptions::default() };
        let movie = decode_movie_with_options(&bytes, &options).unwrap();
        assert_eq!(movie.tags, vec![MovieTag::Unknown { code: 9, data: vec![1, 2, 3, 4], extended: false }]);
    }

    #[test]
    fn test_stream_continues_after_body_error() {
        let records = [0x44, 0x02, 1, 2, 3, 4, 0x40, 0x00, 0x00, 0x00];
        let registry = DecoderRegistry::new();
        let mut stream = TagStream::new(&records, 8, &DecodeOptions::default(), &registry);
        assert_eq!(stream.state(), StreamState::AwaitingHeader);

        assert!(stream.next().unwrap().is_err());
        assert_eq!(stream.position(), 6);
        assert_eq!(stream.next().unwrap().unwrap(), MovieTag::ShowFrame);
        assert_eq!(stream.state(), StreamState::BodyDecoded);
        assert!(stream.next().is_none());
        assert_eq!(stream.state(), StreamState::Finished);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_stream_ends_without_end_record() {
        let registry = DecoderRegistry::new();
        let stream = TagStream::new(&[0x40, 0x00], 8, &DecodeOptions::default(), &registry);
        assert_eq!(stream.collect::<Result<Vec<_>, _>>().unwrap(), vec![MovieTag::ShowFrame]);
    }

    #[test]
    fn test_text_encoding_follows_version() {
        let mut movie = Movie::new(5);
        movie.tags = vec![MovieTag::Metadata("café".to_string())];
        let bytes = encode_movie(&movie).unwrap();
        assert!(bytes.windows(5).any(|w| w == b"caf\xE9\0"));
        assert_eq!(decode_movie(&bytes).unwrap(), movie);

        movie.version = 6;
        let bytes = encode_movie(&movie).unwrap();
        assert!(bytes.windows(6).any(|w| w == "café\0".as_bytes()));

        let forced = DecodeOptions { encoding: Some(TextEncoding::Latin1), ..DecodeOptions::default() };
        let decoded = decode_movie_with_options(&bytes, &forced).unwrap();
        assert_eq!(decoded.tags, vec![MovieTag::Metadata("cafÃ©".to_string())]);
    }

    #[test]
    fn test_custom_decoder_on_session_copy() {
        fn as_unknown(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<MovieTag, DecodeError> {
            crate::codec::tag::decode_unknown(reader, ctx)
        }
        let mut registry = DecoderRegistry::new();
        registry.tags.register(codes::SET_BACKGROUND_COLOR, as_unknown);

        let bytes = encode_movie(&sample_movie()).unwrap();
        let movie = decode_movie_with(&bytes, &DecodeOptions::default(), &registry).unwrap();
        assert!(matches!(movie.tags[1], MovieTag::Unknown { code: 9, .. }));
        assert_eq!(decode_movie(&bytes).unwrap().tags[1], MovieTag::SetBackgroundColor(Color::WHITE));
    }

    fn unknown_tag() -> impl Strategy<Value = MovieTag> {
        (100u16..1024, proptest::collection::vec(any::<u8>(), 0..200), any::<bool>()).prop_map(
            |(code, data, long)| {
                let extended = long || data.len() >= 63;
                MovieTag::Unknown { code, data, extended }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_unknown_records_survive_unchanged(
            tags in proptest::collection::vec(unknown_tag(), 0..8),
            compress in any::<bool>(),
        ) {
            let mut movie = Movie::new(7);
            movie.compressed = compress;
            movie.tags = tags;

            let bytes = encode_movie(&movie).unwrap();
            let decoded = decode_movie(&bytes).unwrap();
            prop_assert_eq!(&decoded, &movie);
            prop_assert_eq!(encode_movie(&decoded).unwrap(), bytes);
        }
    }
}
