//! Format constants and security limits for decoding.

/// Signature of an uncompressed movie.
pub const SIGNATURE_UNCOMPRESSED: &[u8; 3] = b"FWS";

/// Signature of a zlib-compressed movie.
pub const SIGNATURE_COMPRESSED: &[u8; 3] = b"CWS";

/// Signature of a media (FLV) container.
pub const SIGNATURE_MEDIA: &[u8; 3] = b"FLV";

/// Size of the movie signature, version and file length fields.
pub const MOVIE_PREFIX_LEN: usize = 8;

/// Size of the media container header.
pub const MEDIA_HEADER_LEN: u32 = 9;

/// Size of a media tag header (type, size, timestamp, stream id).
pub const MEDIA_TAG_HEADER_LEN: usize = 11;

/// Highest movie version accepted by the decoder.
pub const MAX_MOVIE_VERSION: u8 = 50;

/// Movie versions below this use a single-byte text encoding by default.
pub const UNICODE_MOVIE_VERSION: u8 = 6;

/// Movie versions from this one on must start with FileAttributes.
pub const FILE_ATTRIBUTES_VERSION: u8 = 8;

/// Inline length value that escapes to a 32-bit extended length.
pub const HEADER_LENGTH_ESCAPE: u32 = 0x3F;

/// Size of the short record header.
pub const SHORT_HEADER_LEN: usize = 2;

/// Size of the extended record header.
pub const LONG_HEADER_LEN: usize = 6;

/// Maximum number of 7-bit groups in a variable-length u32.
pub const MAX_VARINT_GROUPS: usize = 5;

/// Maximum total (uncompressed) movie size in bytes (256 MiB).
pub const MAX_MOVIE_SIZE: usize = 256 * 1024 * 1024;

/// Maximum nesting of script data values in a media file, and of function
/// bodies in an action list.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Size of a sink-backed writer's internal buffer.
pub const WRITER_BUFFER_SIZE: usize = 4096;

/// Maximum number of entries in a style array when extended counts are allowed.
pub const MAX_EXTENDED_ARRAY_LEN: usize = 0xFFFF;

/// Count value that escapes to a 16-bit extended style array length.
pub const ARRAY_LENGTH_ESCAPE: u8 = 0xFF;
