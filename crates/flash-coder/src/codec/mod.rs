//! Binary encoding/decoding for movies and media files.
//!
//! [`cursor`] provides bit-level readers and writers, [`context`] the state
//! shared between nested values and [`registry`] the discriminator dispatch.
//! The remaining modules implement [`Coder`] for the model types.

pub mod action;
pub mod context;
pub mod cursor;
pub mod datatypes;
pub mod fill;
pub mod filter;
pub mod flv;
pub mod header;
pub mod movie;
pub mod numeric;
pub mod registry;
pub mod shape;
pub mod tag;
pub mod text;

pub use context::{Context, ContextKey};
pub use cursor::{Reader, Writer, variable_u32_size};
pub use flv::{decode_flv, encode_flv};
pub use header::TagHeader;
pub use movie::{
    DecodeOptions, EncodeOptions, StreamState, TagStream, decode_movie, decode_movie_with,
    decode_movie_with_options, default_encoding, encode_movie, encode_movie_with_options,
    read_movie, write_movie,
};
pub use numeric::{Fixed, Fixed8};
pub use registry::{DecodeFn, DecoderRegistry, Factory};
pub use text::TextEncoding;

use crate::error::{DecodeError, EncodeError};

/// Contract between a value type and the coder.
///
/// `prepare_to_encode` returns the exact number of bytes the following
/// `encode` call with the same context writes, so that enclosing records
/// can emit their length before their body.
pub trait Coder: Sized {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError>;

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError>;

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError>;
}

/// Returns the encoded size of a null-terminated string in the context's
/// text encoding.
pub(crate) fn cstring_size(text: &str, ctx: &Context<'_>) -> usize {
    let encoding = ctx.encoding().unwrap_or_default();
    encoding.encoded_len(text) + encoding.unit_len()
}

/// Returns the size in bytes of `bits` rounded up to whole bytes.
pub(crate) fn bits_to_bytes(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Checks that `value` fits in an unsigned field of `bits` bits.
pub(crate) fn check_unsigned(field: &'static str, value: u32, bits: u32) -> Result<(), EncodeError> {
    if bits < 32 && value >> bits != 0 {
        return Err(EncodeError::ValueOutOfRange {
            field,
            value: value as i64,
            bits,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Encodes `value`, checks the size contract and decodes the result.
    pub fn roundtrip<T: Coder + std::fmt::Debug + PartialEq>(
        value: &T,
        configure: impl Fn(&mut Context<'_>),
    ) -> Vec<u8> {
        let registry = DecoderRegistry::new();

        let mut ctx = Context::with_registry(&registry);
        configure(&mut ctx);
        let size = value.prepare_to_encode(&mut ctx).unwrap();

        let mut ctx = Context::with_registry(&registry);
        configure(&mut ctx);
        let mut writer = Writer::new();
        value.encode(&mut writer, &mut ctx).unwrap();
        writer.align_to_byte();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), size, "prepared size differs from encoded size");

        let mut ctx = Context::with_registry(&registry);
        configure(&mut ctx);
        let mut reader = Reader::new(&bytes);
        let decoded = T::decode(&mut reader, &mut ctx).unwrap();
        assert_eq!(&decoded, value);
        assert!(reader.remaining_len() == 0, "decoder left trailing bytes");
        bytes
    }
}
