//! Shared state threaded through nested decode and encode calls.
//!
//! A handful of values set by an enclosing record change how its children
//! are laid out: whether colors carry alpha, whether style arrays may hold
//! more than 255 entries, and the bit widths used for style indices inside
//! one shape body. [`Context`] holds exactly that closed set of values.
//! A value must be set by an ancestor before a descendant reads it; reading
//! an unset value yields [`MissingContext`].

use crate::codec::registry::DecoderRegistry;
use crate::codec::text::TextEncoding;
use crate::error::{ConfigurationError, DecodeError, MissingContext};
use crate::limits::MAX_NESTING_DEPTH;

/// Keys of the values a [`Context`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Movie version.
    Version,
    /// Encoding of string fields.
    Encoding,
    /// Colors include an alpha channel.
    Transparent,
    /// Font code tables use 16-bit character codes.
    WideCodes,
    /// Style array counts may escape to 16 bits.
    ArrayExtended,
    /// Glyph outlines use postscript rules.
    Postscript,
    /// Line widths scale with the shape.
    ScalingStroke,
    /// Bit width of fill style indices in the current shape.
    FillSize,
    /// Bit width of line style indices in the current shape.
    LineSize,
    /// Bit width of glyph indices in the current text record.
    GlyphSize,
    /// Bit width of glyph advances in the current text record.
    AdvanceSize,
    /// Registry used to decode nested records.
    Registry,
}

/// Values shared across one decode or encode call tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'r> {
    version: Option<u8>,
    encoding: Option<TextEncoding>,
    transparent: Option<bool>,
    wide_codes: Option<bool>,
    array_extended: Option<bool>,
    postscript: Option<bool>,
    scaling_stroke: Option<bool>,
    fill_size: Option<u32>,
    line_size: Option<u32>,
    glyph_size: Option<u32>,
    advance_size: Option<u32>,
    registry: Option<&'r DecoderRegistry>,
    /// Number of enclosing records that hold nested records of their own.
    depth: usize,
}

macro_rules! context_value {
    ($field:ident, $setter:ident, $ty:ty, $key:expr) => {
        pub fn $field(&self) -> Result<$ty, MissingContext> {
            self.$field.ok_or(MissingContext($key))
        }

        pub fn $setter(&mut self, value: $ty) -> &mut Self {
            self.$field = Some(value);
            self
        }
    };
}

impl<'r> Context<'r> {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context for a decode session using `registry` for
    /// nested records.
    pub fn with_registry(registry: &'r DecoderRegistry) -> Self {
        Self {
            registry: Some(registry),
            ..Self::default()
        }
    }

    context_value!(version, set_version, u8, ContextKey::Version);
    context_value!(encoding, set_encoding, TextEncoding, ContextKey::Encoding);
    context_value!(transparent, set_transparent, bool, ContextKey::Transparent);
    context_value!(wide_codes, set_wide_codes, bool, ContextKey::WideCodes);
    context_value!(array_extended, set_array_extended, bool, ContextKey::ArrayExtended);
    context_value!(postscript, set_postscript, bool, ContextKey::Postscript);
    context_value!(scaling_stroke, set_scaling_stroke, bool, ContextKey::ScalingStroke);
    context_value!(fill_size, set_fill_size, u32, ContextKey::FillSize);
    context_value!(line_size, set_line_size, u32, ContextKey::LineSize);
    context_value!(glyph_size, set_glyph_size, u32, ContextKey::GlyphSize);
    context_value!(advance_size, set_advance_size, u32, ContextKey::AdvanceSize);

    /// Sets the text encoding by name, failing immediately if the name is
    /// not supported.
    pub fn set_encoding_name(&mut self, name: &str) -> Result<&mut Self, ConfigurationError> {
        let encoding = TextEncoding::from_name(name)?;
        Ok(self.set_encoding(encoding))
    }

    /// Returns the registry used for nested records.
    ///
    /// The returned reference outlives the borrow of the context, so it can
    /// be used while the context is passed on mutably.
    pub fn registry(&self) -> Result<&'r DecoderRegistry, MissingContext> {
        self.registry.ok_or(MissingContext(ContextKey::Registry))
    }

    pub fn set_registry(&mut self, registry: &'r DecoderRegistry) -> &mut Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the number of nesting levels entered so far.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enters one more level of nested records. Call inside [`scope`] so
    /// the level is left again when the nested record is done.
    ///
    /// [`scope`]: Context::scope
    pub fn enter_nested(&mut self, field: &'static str) -> Result<(), DecodeError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len: self.depth + 1,
                max: MAX_NESTING_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Returns true if `key` currently has a value.
    pub fn contains(&self, key: ContextKey) -> bool {
        match key {
            ContextKey::Version => self.version.is_some(),
            ContextKey::Encoding => self.encoding.is_some(),
            ContextKey::Transparent => self.transparent.is_some(),
            ContextKey::WideCodes => self.wide_codes.is_some(),
            ContextKey::ArrayExtended => self.array_extended.is_some(),
            ContextKey::Postscript => self.postscript.is_some(),
            ContextKey::ScalingStroke => self.scaling_stroke.is_some(),
            ContextKey::FillSize => self.fill_size.is_some(),
            ContextKey::LineSize => self.line_size.is_some(),
            ContextKey::GlyphSize => self.glyph_size.is_some(),
            ContextKey::AdvanceSize => self.advance_size.is_some(),
            ContextKey::Registry => self.registry.is_some(),
        }
    }

    /// Removes the value for `key`.
    pub fn clear(&mut self, key: ContextKey) -> &mut Self {
        match key {
            ContextKey::Version => self.version = None,
            ContextKey::Encoding => self.encoding = None,
            ContextKey::Transparent => self.transparent = None,
            ContextKey::WideCodes => self.wide_codes = None,
            ContextKey::ArrayExtended => self.array_extended = None,
            ContextKey::Postscript => self.postscript = None,
            ContextKey::ScalingStroke => self.scaling_stroke = None,
            ContextKey::FillSize => self.fill_size = None,
            ContextKey::LineSize => self.line_size = None,
            ContextKey::GlyphSize => self.glyph_size = None,
            ContextKey::AdvanceSize => self.advance_size = None,
            ContextKey::Registry => self.registry = None,
        }
        self
    }

    /// Runs `f` and then restores every value to what it was before, so
    /// values set for one child never leak to its siblings.
    pub fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = *self;
        let result = f(self);
        *self = saved;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_value_is_an_error() {
        let ctx = Context::new();
        assert_eq!(ctx.transparent(), Err(MissingContext(ContextKey::Transparent)));
        assert_eq!(ctx.fill_size(), Err(MissingContext(ContextKey::FillSize)));
        assert!(ctx.registry().is_err());
    }

    #[test]
    fn test_set_and_clear() {
        let mut ctx = Context::new();
        ctx.set_version(8).set_transparent(true).set_fill_size(3);
        assert_eq!(ctx.version(), Ok(8));
        assert_eq!(ctx.transparent(), Ok(true));
        assert!(ctx.contains(ContextKey::FillSize));

        ctx.clear(ContextKey::FillSize);
        assert!(!ctx.contains(ContextKey::FillSize));
        assert_eq!(ctx.version(), Ok(8));
    }

    #[test]
    fn test_scope_restores_values() {
        let mut ctx = Context::new();
        ctx.set_transparent(false);

        let seen = ctx.scope(|inner| {
            inner.set_transparent(true).set_line_size(4);
            inner.transparent()
        });

        assert_eq!(seen, Ok(true));
        assert_eq!(ctx.transparent(), Ok(false));
        assert!(!ctx.contains(ContextKey::LineSize));
    }

    #[test]
    fn test_nesting_depth_is_bounded_and_scoped() {
        let mut ctx = Context::new();
        ctx.scope(|outer| {
            outer.enter_nested("nesting").unwrap();
            outer.scope(|inner| inner.enter_nested("nesting")).unwrap();
            assert_eq!(outer.depth(), 1);
        });
        assert_eq!(ctx.depth(), 0);

        for _ in 0..MAX_NESTING_DEPTH {
            ctx.enter_nested("nesting").unwrap();
        }
        assert!(matches!(
            ctx.enter_nested("nesting"),
            Err(DecodeError::LengthExceedsLimit { len: 65, max: 64, .. })
        ));
    }

    #[test]
    fn test_encoding_name_checked_when_set() {
        let mut ctx = Context::new();
        assert!(ctx.set_encoding_name("UTF-16BE").is_ok());
        assert_eq!(ctx.encoding(), Ok(TextEncoding::Utf16Be));

        let result = ctx.set_encoding_name("nonsense");
        assert!(matches!(result, Err(ConfigurationError::UnsupportedEncoding { .. })));
        assert_eq!(ctx.encoding(), Ok(TextEncoding::Utf16Be));
    }
}
