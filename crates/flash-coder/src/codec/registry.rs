//! Discriminator-keyed decoder dispatch.
//!
//! Every decodable family (movie tags, actions, shape records, fill styles,
//! filters and media tags) has a [`Factory`] that peeks a small integer code
//! from the input and hands the reader to the decoder registered for it.
//!
//! The default set of decoders is built once into an immutable template.
//! [`DecoderRegistry::new`] returns an independent copy of that template, so
//! a session may register its own decoders without affecting any other.

use std::fmt;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::codec::context::Context;
use crate::codec::cursor::Reader;
use crate::codec::{action, filter, fill, flv, shape, tag};
use crate::error::DecodeError;
use crate::model::{Action, FillStyle, Filter, FlvTag, MovieTag, ShapeRecord};

/// Decodes one value of a family, starting at its discriminator.
pub type DecodeFn<T> = fn(&mut Reader<'_>, &mut Context<'_>) -> Result<T, DecodeError>;

/// Peeks the discriminator of the next value without consuming input.
pub type KeyFn = fn(&Reader<'_>) -> Result<u16, DecodeError>;

/// Lookup table from discriminator to decoder for one family.
///
/// Open families carry a fallback decoder that preserves values with an
/// unregistered code; closed families report them as
/// [`DecodeError::UnsupportedVariant`].
pub struct Factory<T> {
    family: &'static str,
    key: KeyFn,
    table: FxHashMap<u16, DecodeFn<T>>,
    fallback: Option<DecodeFn<T>>,
}

impl<T> Clone for Factory<T> {
    fn clone(&self) -> Self {
        Self {
            family: self.family,
            key: self.key,
            table: self.table.clone(),
            fallback: self.fallback,
        }
    }
}

impl<T> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<u16> = self.table.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("Factory")
            .field("family", &self.family)
            .field("codes", &codes)
            .field("open", &self.fallback.is_some())
            .finish()
    }
}

impl<T> Factory<T> {
    /// Creates an empty closed factory.
    pub fn closed(family: &'static str, key: KeyFn) -> Self {
        Self {
            family,
            key,
            table: FxHashMap::default(),
            fallback: None,
        }
    }

    /// Creates an empty open factory that decodes unregistered codes with
    /// `fallback`.
    pub fn open(family: &'static str, key: KeyFn, fallback: DecodeFn<T>) -> Self {
        Self {
            family,
            key,
            table: FxHashMap::default(),
            fallback: Some(fallback),
        }
    }

    /// Returns the family name used in errors and logs.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Returns true if unregistered codes decode to a raw variant.
    pub fn is_open(&self) -> bool {
        self.fallback.is_some()
    }

    /// Registers `decode` for `code`, returning the decoder it replaces.
    pub fn register(&mut self, code: u16, decode: DecodeFn<T>) -> Option<DecodeFn<T>> {
        self.table.insert(code, decode)
    }

    /// Removes the decoder for `code`.
    pub fn unregister(&mut self, code: u16) -> Option<DecodeFn<T>> {
        self.table.remove(&code)
    }

    /// Returns true if a decoder is registered for `code`.
    pub fn contains(&self, code: u16) -> bool {
        self.table.contains_key(&code)
    }

    /// Peeks the discriminator of the next value.
    pub fn key(&self, reader: &Reader<'_>) -> Result<u16, DecodeError> {
        (self.key)(reader)
    }

    /// Decodes exactly one value using the decoder registered for the next
    /// discriminator.
    pub fn get_object(&self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<T, DecodeError> {
        let code = (self.key)(reader)?;
        if let Some(decode) = self.table.get(&code) {
            trace!(family = self.family, code, location = reader.location(), "dispatch");
            return decode(reader, ctx);
        }
        match self.fallback {
            Some(fallback) => {
                debug!(family = self.family, code, "no decoder registered, preserving raw value");
                fallback(reader, ctx)
            }
            None => Err(DecodeError::UnsupportedVariant {
                family: self.family,
                code,
                location: reader.location(),
            }),
        }
    }
}

/// One factory per decodable family.
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    pub tags: Factory<MovieTag>,
    pub actions: Factory<Action>,
    pub shape_records: Factory<ShapeRecord>,
    pub fill_styles: Factory<FillStyle>,
    pub filters: Factory<Filter>,
    pub media: Factory<FlvTag>,
}

lazy_static! {
    static ref DEFAULT_REGISTRY: DecoderRegistry = DecoderRegistry::build_default();
}

impl DecoderRegistry {
    /// Returns a copy of the default registry.
    pub fn new() -> Self {
        DEFAULT_REGISTRY.clone()
    }

    /// Returns the shared default registry.
    pub fn template() -> &'static DecoderRegistry {
        &DEFAULT_REGISTRY
    }

    fn build_default() -> Self {
        let mut tags = Factory::open("tag", tag::tag_code, tag::decode_unknown);
        tag::register_defaults(&mut tags);

        let mut actions = Factory::open("action", action::action_code, action::decode_unknown);
        action::register_defaults(&mut actions);

        let mut shape_records = Factory::closed("shape record", shape::record_kind);
        shape::register_defaults(&mut shape_records);

        let mut fill_styles = Factory::closed("fill style", fill::fill_type);
        fill::register_defaults(&mut fill_styles);

        let mut filters = Factory::closed("filter", filter::filter_type);
        filter::register_defaults(&mut filters);

        let mut media = Factory::open("media tag", flv::media_type, flv::decode_unknown);
        flv::register_defaults(&mut media);

        Self {
            tags,
            actions,
            shape_records,
            fill_styles,
            filters,
            media,
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tag::codes;

    fn decode_show_frame_as_protect(
        reader: &mut Reader<'_>,
        _ctx: &mut Context<'_>,
    ) -> Result<MovieTag, DecodeError> {
        reader.skip(2, "header")?;
        Ok(MovieTag::Protect(None))
    }

    #[test]
    fn test_copies_are_independent() {
        let mut custom = DecoderRegistry::new();
        custom.tags.register(codes::SHOW_FRAME, decode_show_frame_as_protect);

        let data = [0x40, 0x00];
        let mut ctx = Context::with_registry(&custom);
        let tag = custom.tags.get_object(&mut Reader::new(&data), &mut ctx).unwrap();
        assert_eq!(tag, MovieTag::Protect(None));

        let fresh = DecoderRegistry::new();
        let mut ctx = Context::with_registry(&fresh);
        let tag = fresh.tags.get_object(&mut Reader::new(&data), &mut ctx).unwrap();
        assert_eq!(tag, MovieTag::ShowFrame);
    }

    #[test]
    fn test_closed_family_rejects_unknown_code() {
        let registry = DecoderRegistry::new();
        let mut ctx = Context::with_registry(&registry);
        let data = [0x7E, 0x00];
        let err = registry.filters.get_object(&mut Reader::new(&data), &mut ctx).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedVariant { family: "filter", code: 0x7E, location: 0 }
        );
    }

    #[test]
    fn test_unregister_falls_back_to_raw() {
        let mut registry = DecoderRegistry::new();
        assert!(registry.tags.unregister(codes::SHOW_FRAME).is_some());
        assert!(!registry.tags.contains(codes::SHOW_FRAME));
        assert!(registry.tags.is_open());

        let data = [0x40, 0x00];
        let mut ctx = Context::with_registry(&registry);
        let tag = registry.tags.get_object(&mut Reader::new(&data), &mut ctx).unwrap();
        assert_eq!(
            tag,
            MovieTag::Unknown { code: codes::SHOW_FRAME, data: vec![], extended: false }
        );
    }
}
