//! Record framing: a 10-bit type code and a 6-bit length packed into a
//! little-endian u16, with an escape to a following 32-bit length.

use crate::codec::cursor::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{HEADER_LENGTH_ESCAPE, LONG_HEADER_LEN, SHORT_HEADER_LEN};

/// Header of a top-level record.
///
/// The first field is a little-endian u16. Bits 15-6 hold the type code
/// (0 to 1023) and bits 5-0 the body length. A length field of 63 (0x3F)
/// means the real length follows as a little-endian u32:
///
/// ```text
/// short: [code:10 | length:6]              2 bytes
/// long:  [code:10 | 0x3F:6] [length:u32]   6 bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub code: u16,
    /// Body length in bytes.
    pub length: u32,
    /// The length was stored in the 32-bit extended form.
    pub extended: bool,
}

impl TagHeader {
    /// Creates a header using the short form when the length allows it.
    pub fn new(code: u16, length: u32) -> Self {
        Self {
            code,
            length,
            extended: length >= HEADER_LENGTH_ESCAPE,
        }
    }

    /// Creates a header that always uses the extended form.
    pub fn extended(code: u16, length: u32) -> Self {
        Self {
            code,
            length,
            extended: true,
        }
    }

    /// Returns the encoded size of the header itself.
    pub fn header_len(&self) -> usize {
        if self.extended { LONG_HEADER_LEN } else { SHORT_HEADER_LEN }
    }

    /// Returns the encoded size of header and body.
    pub fn total_len(&self) -> usize {
        self.header_len() + self.length as usize
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let word = reader.read_u16("tag header")?;
        let code = word >> 6;
        let short = (word & 0x3F) as u32;
        if short == HEADER_LENGTH_ESCAPE {
            let length = reader.read_u32("tag length")?;
            Ok(Self { code, length, extended: true })
        } else {
            Ok(Self { code, length: short, extended: false })
        }
    }

    /// Reads the header without advancing.
    pub fn peek(reader: &Reader<'_>) -> Result<Self, DecodeError> {
        let mut probe = reader.clone();
        Self::read(&mut probe)
    }

    pub fn write(&self, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.code > 0x3FF {
            return Err(EncodeError::ValueOutOfRange {
                field: "tag code",
                value: self.code as i64,
                bits: 10,
            });
        }
        if self.extended {
            writer.write_u16((self.code << 6) | HEADER_LENGTH_ESCAPE as u16)?;
            writer.write_u32(self.length)
        } else {
            if self.length >= HEADER_LENGTH_ESCAPE {
                return Err(EncodeError::ValueOutOfRange {
                    field: "tag length",
                    value: self.length as i64,
                    bits: 6,
                });
            }
            writer.write_u16((self.code << 6) | self.length as u16)
        }
    }
}

/// Reads a record header and decodes its body with `body`, checking that
/// exactly the declared number of bytes was consumed.
pub(crate) fn decode_framed<T>(
    reader: &mut Reader<'_>,
    object: &'static str,
    body: impl FnOnce(&mut Reader<'_>, &TagHeader) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    let header = TagHeader::read(reader)?;
    reader.mark();
    let value = body(reader, &header)?;
    reader.align_to_byte();
    reader.unmark(header.length as usize, object)?;
    Ok(value)
}

/// Writes `header` and the body produced by `body`, checking that exactly
/// the declared number of bytes was written.
pub(crate) fn encode_framed(
    writer: &mut Writer<'_>,
    header: TagHeader,
    object: &'static str,
    body: impl FnOnce(&mut Writer<'_>) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    header.write(writer)?;
    writer.mark();
    body(writer)?;
    writer.align_to_byte();
    writer.unmark(header.length as usize, object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_boundary() {
        let short = TagHeader::new(12, 62);
        assert!(!short.extended);
        assert_eq!(short.header_len(), 2);

        let long = TagHeader::new(12, 63);
        assert!(long.extended);
        assert_eq!(long.header_len(), 6);

        let mut writer = Writer::new();
        long.write(&mut writer).unwrap();
        assert_eq!(writer.as_bytes(), &[0x3F, 0x03, 63, 0, 0, 0]);
    }

    #[test]
    fn test_read_short_and_long() {
        let data = [0x43, 0x00];
        let header = TagHeader::read(&mut Reader::new(&data)).unwrap();
        assert_eq!(header, TagHeader { code: 1, length: 3, extended: false });

        let data = [0x3F, 0x05, 0x02, 0x00, 0x00, 0x00];
        let header = TagHeader::peek(&Reader::new(&data)).unwrap();
        assert_eq!(header, TagHeader { code: 20, length: 2, extended: true });
        assert_eq!(header.total_len(), 8);
    }

    #[test]
    fn test_code_uses_upper_ten_bits() {
        let mut writer = Writer::new();
        TagHeader::new(0x3FF, 5).write(&mut writer).unwrap();
        assert_eq!(writer.as_bytes(), &[0xC5, 0xFF]);
        let header = TagHeader::read(&mut Reader::new(writer.as_bytes())).unwrap();
        assert_eq!(header, TagHeader { code: 0x3FF, length: 5, extended: false });

        let err = TagHeader::new(0x400, 0).write(&mut Writer::new()).unwrap_err();
        assert!(matches!(err, EncodeError::ValueOutOfRange { field: "tag code", bits: 10, .. }));
    }

    #[test]
    fn test_short_form_rejects_long_body() {
        let header = TagHeader { code: 1, length: 63, extended: false };
        let err = header.write(&mut Writer::new()).unwrap_err();
        assert!(matches!(err, EncodeError::ValueOutOfRange { field: "tag length", .. }));
    }

    #[test]
    fn test_framed_body_mismatch_sign() {
        // Header declares 3 bytes, body reads 2.
        let data = [0x43, 0x00, 1, 2, 3];
        let err = decode_framed(&mut Reader::new(&data), "Test", |r, _| r.read_u16("body"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Underflow { delta: -8, expected: 3, .. }));

        // Header declares 1 byte, body reads 2.
        let data = [0x41, 0x00, 1, 2];
        let err = decode_framed(&mut Reader::new(&data), "Test", |r, _| r.read_u16("body"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Overflow { delta: 8, expected: 1, .. }));

        let mut writer = Writer::new();
        let err = encode_framed(&mut writer, TagHeader::new(1, 1), "Test", |w| w.write_u16(7))
            .unwrap_err();
        assert!(matches!(err, EncodeError::Overflow { delta: 8, .. }));
    }
}
