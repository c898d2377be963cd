//! Named text encodings for string fields.
//!
//! Movies from version 6 on store text as UTF-8; older movies use a
//! single-byte code page. The encoding is chosen by name and validated
//! when it is set, not when the first string is read.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigurationError, DecodeError, EncodeError};

/// A supported text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// ISO-8859-1.
    Latin1,
    /// US-ASCII.
    Ascii,
}

impl TextEncoding {
    /// Looks up an encoding by name.
    ///
    /// Names are matched case-insensitively, ignoring `-` and `_`, so
    /// `"UTF-8"`, `"utf8"` and `"Utf_8"` all resolve to [`TextEncoding::Utf8`].
    pub fn from_name(name: &str) -> Result<Self, ConfigurationError> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" => Ok(TextEncoding::Utf8),
            "utf16" | "utf16le" => Ok(TextEncoding::Utf16Le),
            "utf16be" => Ok(TextEncoding::Utf16Be),
            "iso88591" | "latin1" | "l1" => Ok(TextEncoding::Latin1),
            "ascii" | "usascii" => Ok(TextEncoding::Ascii),
            _ => Err(ConfigurationError::UnsupportedEncoding {
                name: name.to_string(),
            }),
        }
    }

    /// Returns the canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Latin1 => "ISO-8859-1",
            TextEncoding::Ascii => "US-ASCII",
        }
    }

    /// Returns the size of one code unit (and of the string terminator).
    pub fn unit_len(&self) -> usize {
        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2,
            _ => 1,
        }
    }

    /// Decodes `bytes` (without terminator) into a string.
    pub fn decode(&self, bytes: &[u8], field: &'static str) -> Result<String, DecodeError> {
        let invalid = || DecodeError::InvalidText {
            encoding: self.name(),
            field,
        };
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(|s| s.to_string())
                .map_err(|_| invalid()),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match self {
                        TextEncoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
                        _ => u16::from_le_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| invalid())
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|b| *b as char).collect()),
            TextEncoding::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|b| *b as char).collect())
                } else {
                    Err(invalid())
                }
            }
        }
    }

    /// Encodes `text` (without terminator).
    pub fn encode(&self, text: &str, field: &'static str) -> Result<Vec<u8>, EncodeError> {
        let unrepresentable = || EncodeError::UnrepresentableText {
            encoding: self.name(),
            field,
        };
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c as u32).map_err(|_| unrepresentable()))
                .collect(),
            TextEncoding::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(unrepresentable())
                }
            }
        }
    }

    /// Returns the encoded size of `text` in bytes, without terminator.
    ///
    /// For single-byte encodings this assumes the text is representable;
    /// [`TextEncoding::encode`] reports it if it is not.
    pub fn encoded_len(&self, text: &str) -> usize {
        match self {
            TextEncoding::Utf8 => text.len(),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => text.encode_utf16().count() * 2,
            TextEncoding::Latin1 | TextEncoding::Ascii => text.chars().count(),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextEncoding::from_name(s)
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup() {
        assert_eq!(TextEncoding::from_name("UTF-8").unwrap(), TextEncoding::Utf8);
        assert_eq!(TextEncoding::from_name("utf_16be").unwrap(), TextEncoding::Utf16Be);
        assert_eq!(TextEncoding::from_name("ISO-8859-1").unwrap(), TextEncoding::Latin1);
        assert_eq!("us-ascii".parse::<TextEncoding>().unwrap(), TextEncoding::Ascii);
    }

    #[test]
    fn test_unknown_name_rejected() {
        let result = TextEncoding::from_name("EBCDIC");
        assert_eq!(
            result,
            Err(ConfigurationError::UnsupportedEncoding {
                name: "EBCDIC".to_string()
            })
        );
    }

    #[test]
    fn test_text_roundtrip() {
        let encodings = [
            TextEncoding::Utf8,
            TextEncoding::Utf16Le,
            TextEncoding::Utf16Be,
            TextEncoding::Latin1,
        ];
        for encoding in encodings {
            let text = "caf\u{e9}";
            let bytes = encoding.encode(text, "test").unwrap();
            assert_eq!(bytes.len(), encoding.encoded_len(text), "{encoding}");
            assert_eq!(encoding.decode(&bytes, "test").unwrap(), text, "{encoding}");
        }
    }

    #[test]
    fn test_unrepresentable_text() {
        let result = TextEncoding::Latin1.encode("\u{1F600}", "label");
        assert!(matches!(result, Err(EncodeError::UnrepresentableText { .. })));

        let result = TextEncoding::Ascii.encode("caf\u{e9}", "label");
        assert!(matches!(result, Err(EncodeError::UnrepresentableText { .. })));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let result = TextEncoding::Utf8.decode(&[0xC3, 0x28], "name");
        assert!(matches!(result, Err(DecodeError::InvalidText { field: "name", .. })));
    }
}
