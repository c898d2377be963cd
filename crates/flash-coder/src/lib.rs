//! flash-coder: bit-level coder for SWF movies and FLV media files.
//!
//! This crate provides decoding, encoding and validation for the tagged
//! binary formats of the Flash platform.
//!
//! # Overview
//!
//! - **Movies**: a signature prefix, a bit-packed header and a flat list of
//!   length-prefixed tag records, optionally zlib-compressed
//! - **Media files**: a 9-byte header followed by audio, video and script
//!   tags, each trailed by its own size
//! - **Lossless**: records without a registered decoder are preserved byte
//!   for byte, so decode then encode reproduces the input
//!
//! # Quick Start
//!
//! ```rust
//! use flash_coder::{Color, Movie, MovieTag};
//! use flash_coder::codec::{decode_movie, encode_movie};
//!
//! let mut movie = Movie::new(6);
//! movie.frame_count = 1;
//! movie.tags = vec![
//!     MovieTag::SetBackgroundColor(Color::WHITE),
//!     MovieTag::ShowFrame,
//! ];
//!
//! // Encode to binary
//! let bytes = encode_movie(&movie).unwrap();
//! assert_eq!(&bytes[..3], b"FWS");
//!
//! // Decode back
//! let decoded = decode_movie(&bytes).unwrap();
//! assert_eq!(decoded, movie);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Movie records, shapes, actions, filters and media tags
//! - [`codec`]: Bit-level readers/writers, the decoder registry and the
//!   entry points
//! - [`validate`]: Semantic validation
//! - [`error`]: Error types
//! - [`limits`]: Format constants and decoding limits
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Declared lengths are checked against the remaining input before use
//! - Inflated bodies and script nesting are bounded by [`limits`]
//! - Every record must consume exactly its declared length

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    Coder, Context, DecodeOptions, DecoderRegistry, EncodeOptions, TagStream, TextEncoding,
    decode_flv, decode_movie, encode_flv, encode_movie, read_movie, write_movie,
};
pub use error::{ConfigurationError, DecodeError, EncodeError, ErrorKind, ValidationError};
pub use model::{
    Action, AmfValue, Bounds, Color, FlvBody, FlvFile, FlvTag, Movie, MovieTag, ShapeRecord,
    ShapeWithStyle,
};
pub use validate::validate_movie;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
