//! Bit-addressable cursors over encoded data.
//!
//! [`Reader`] decodes from a byte slice and [`Writer`] encodes into an
//! in-memory buffer or, when constructed with a sink, into a buffer that is
//! flushed to the sink as it fills. Both track a byte index plus a bit
//! offset in `0..8`; bit fields are packed most significant bit first and
//! multi-byte words are little-endian unless the `_be` variants are used.

use std::fmt;
use std::io::Write;

use crate::codec::text::TextEncoding;
use crate::error::{ConfigurationError, DecodeError, EncodeError};
use crate::limits::{MAX_VARINT_GROUPS, WRITER_BUFFER_SIZE};

/// Returns the number of bytes used to encode `value` as a variable-length u32.
pub fn variable_u32_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides bit- and byte-level reads with bounds
/// checking. Byte-level reads start at the next byte boundary.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    index: usize,
    offset: u8,
    /// Position of `data[0]` in the enclosing stream, for error locations.
    base: usize,
    encoding: TextEncoding,
    marks: Vec<usize>,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            index: 0,
            offset: 0,
            base: 0,
            encoding: TextEncoding::default(),
            marks: Vec::new(),
        }
    }

    /// Returns the current position in bits.
    #[inline]
    pub fn pointer(&self) -> usize {
        self.index * 8 + self.offset as usize
    }

    fn set_pointer(&mut self, pointer: usize) {
        self.index = pointer / 8;
        self.offset = (pointer % 8) as u8;
    }

    /// Returns the current byte index.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Returns the current byte position in the enclosing stream.
    pub fn location(&self) -> usize {
        self.base + self.index
    }

    /// Returns the number of whole bytes after the current position.
    pub fn remaining_len(&self) -> usize {
        let next = if self.offset == 0 { self.index } else { self.index + 1 };
        self.data.len().saturating_sub(next)
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pointer() >= self.data.len() * 8
    }

    /// Returns the encoding used for string fields.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Sets the encoding used for string fields.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    /// Sets the encoding used for string fields by name.
    pub fn set_encoding_name(&mut self, name: &str) -> Result<(), ConfigurationError> {
        self.encoding = TextEncoding::from_name(name)?;
        Ok(())
    }

    fn eof(&self, context: &'static str) -> DecodeError {
        DecodeError::UnexpectedEof {
            context,
            position: self.base * 8 + self.pointer(),
        }
    }

    /// Advances to the next byte boundary; no-op if already aligned.
    #[inline]
    pub fn align_to_byte(&mut self) {
        if self.offset != 0 {
            self.index += 1;
            self.offset = 0;
        }
    }

    /// Reads an unsigned bit field of `n` bits (0 to 32).
    pub fn read_ubits(&mut self, n: u32, context: &'static str) -> Result<u32, DecodeError> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        let end = self.pointer() + n as usize;
        if end > self.data.len() * 8 {
            return Err(self.eof(context));
        }

        // A field of up to 32 bits at a non-zero offset spans at most 5 bytes.
        let first = self.index;
        let last = (end - 1) / 8;
        let mut acc: u64 = 0;
        for byte in &self.data[first..=last] {
            acc = (acc << 8) | *byte as u64;
        }
        let span = (last - first + 1) * 8;
        let shift = span - self.offset as usize - n as usize;
        let value = (acc >> shift) & ((1u64 << n) - 1);

        self.set_pointer(end);
        Ok(value as u32)
    }

    /// Reads a signed (two's complement) bit field of `n` bits (0 to 32).
    pub fn read_sbits(&mut self, n: u32, context: &'static str) -> Result<i32, DecodeError> {
        if n == 0 {
            return Ok(0);
        }
        let raw = self.read_ubits(n, context)? as u64;
        let shift = 64 - n;
        Ok(((raw << shift) as i64 >> shift) as i32)
    }

    /// Reads a single-bit flag.
    #[inline]
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, DecodeError> {
        Ok(self.read_ubits(1, context)? == 1)
    }

    /// Returns the next `n` bits without advancing.
    pub fn scan_bits(&self, n: u32) -> Result<u32, DecodeError> {
        let mut probe = Reader {
            data: self.data,
            index: self.index,
            offset: self.offset,
            base: self.base,
            encoding: self.encoding,
            marks: Vec::new(),
        };
        probe.read_ubits(n, "scan")
    }

    /// Returns the next byte without advancing.
    pub fn scan_byte(&self) -> Result<u8, DecodeError> {
        let next = if self.offset == 0 { self.index } else { self.index + 1 };
        self.data.get(next).copied().ok_or_else(|| self.eof("scan"))
    }

    /// Returns the next little-endian u16 without advancing.
    pub fn scan_u16(&self) -> Result<u16, DecodeError> {
        let next = if self.offset == 0 { self.index } else { self.index + 1 };
        match self.data.get(next..next + 2) {
            Some(bytes) => Ok(u16::from_le_bytes([bytes[0], bytes[1]])),
            None => Err(self.eof("scan")),
        }
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        self.align_to_byte();
        let byte = *self.data.get(self.index).ok_or_else(|| self.eof(context))?;
        self.index += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        self.align_to_byte();
        if self.index + n > self.data.len() {
            return Err(self.eof(context));
        }
        let bytes = &self.data[self.index..self.index + n];
        self.index += n;
        Ok(bytes)
    }

    /// Reads all bytes up to the end of the data.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        self.align_to_byte();
        let start = self.index.min(self.data.len());
        self.index = self.data.len();
        &self.data[start..]
    }

    /// Skips `n` bytes.
    pub fn skip(&mut self, n: usize, context: &'static str) -> Result<(), DecodeError> {
        self.read_bytes(n, context).map(|_| ())
    }

    /// Splits off the next `len` bytes as a sub-reader and advances past them.
    ///
    /// The sub-reader inherits the text encoding and reports locations
    /// relative to the enclosing stream.
    pub fn slice(&mut self, len: usize, context: &'static str) -> Result<Reader<'a>, DecodeError> {
        self.align_to_byte();
        let base = self.location();
        let data = self.read_bytes(len, context)?;
        Ok(Reader {
            data,
            index: 0,
            offset: 0,
            base,
            encoding: self.encoding,
            marks: Vec::new(),
        })
    }

    /// Reads a little-endian word of `n_bytes` (1 to 4).
    pub fn read_word(
        &mut self,
        n_bytes: usize,
        signed: bool,
        context: &'static str,
    ) -> Result<i64, DecodeError> {
        debug_assert!((1..=4).contains(&n_bytes));
        let bytes = self.read_bytes(n_bytes, context)?;
        let mut value: u64 = 0;
        for (i, byte) in bytes.iter().enumerate() {
            value |= (*byte as u64) << (8 * i);
        }
        Ok(extend(value, n_bytes, signed))
    }

    /// Reads a big-endian word of `n_bytes` (1 to 4).
    pub fn read_word_be(
        &mut self,
        n_bytes: usize,
        signed: bool,
        context: &'static str,
    ) -> Result<i64, DecodeError> {
        debug_assert!((1..=4).contains(&n_bytes));
        let bytes = self.read_bytes(n_bytes, context)?;
        let mut value: u64 = 0;
        for byte in bytes {
            value = (value << 8) | *byte as u64;
        }
        Ok(extend(value, n_bytes, signed))
    }

    #[inline]
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        Ok(self.read_word(2, false, context)? as u16)
    }

    #[inline]
    pub fn read_i16(&mut self, context: &'static str) -> Result<i16, DecodeError> {
        Ok(self.read_word(2, true, context)? as i16)
    }

    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        Ok(self.read_word(4, false, context)? as u32)
    }

    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        Ok(self.read_word(4, true, context)? as i32)
    }

    /// Reads a variable-length unsigned 32-bit integer.
    ///
    /// Groups of 7 bits are stored least significant first; bit 7 of each
    /// byte signals that another group follows.
    pub fn read_variable_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let mut value: u32 = 0;
        for group in 0..MAX_VARINT_GROUPS {
            let byte = self.read_byte(context)?;
            let bits = (byte & 0x7F) as u32;
            if group == MAX_VARINT_GROUPS - 1 && bits > 0x0F {
                return Err(DecodeError::VarintOverflow);
            }
            value |= bits << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecodeError::VarintTooLong {
            max: MAX_VARINT_GROUPS,
        })
    }

    /// Reads a string of `n` bytes.
    pub fn read_string(&mut self, n: usize, field: &'static str) -> Result<String, DecodeError> {
        let bytes = self.read_bytes(n, field)?;
        self.encoding.decode(bytes, field)
    }

    /// Reads a null-terminated string.
    pub fn read_cstring(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.align_to_byte();
        let unit = self.encoding.unit_len();
        let rest = &self.data[self.index.min(self.data.len())..];
        let len = rest
            .chunks_exact(unit)
            .position(|chunk| chunk.iter().all(|b| *b == 0))
            .ok_or_else(|| self.eof(field))?
            * unit;
        let text = self.read_string(len, field)?;
        self.index += unit;
        Ok(text)
    }

    /// Scans forward for an `width`-bit pattern, testing every `step` bits.
    ///
    /// On success the reader is positioned at the start of the match. On
    /// failure the original position is restored.
    pub fn find_bits(&mut self, value: u32, width: u32, step: usize) -> bool {
        debug_assert!(step > 0);
        let start = self.pointer();
        let limit = self.data.len() * 8;
        let mut pointer = start;
        while pointer + width as usize <= limit {
            self.set_pointer(pointer);
            if self.scan_bits(width).is_ok_and(|found| found == value) {
                return true;
            }
            pointer += step;
        }
        self.set_pointer(start);
        false
    }

    /// Scans forward for a little-endian word of `n_bytes`, testing every
    /// `step` bytes from the next byte boundary.
    ///
    /// On success the reader is positioned at the start of the match. On
    /// failure the original position is restored.
    pub fn find_word(&mut self, value: u32, n_bytes: usize, step: usize) -> bool {
        debug_assert!(step > 0 && (1..=4).contains(&n_bytes));
        let start = self.pointer();
        self.align_to_byte();
        let mut index = self.index;
        while index + n_bytes <= self.data.len() {
            let word = self.data[index..index + n_bytes]
                .iter()
                .rev()
                .fold(0u32, |acc, byte| (acc << 8) | *byte as u32);
            if word == value {
                self.set_pointer(index * 8);
                return true;
            }
            index += step;
        }
        self.set_pointer(start);
        false
    }

    /// Records the current position for a later [`Reader::unmark`].
    pub fn mark(&mut self) {
        self.marks.push(self.pointer());
    }

    /// Checks that exactly `expected` bytes were consumed since the matching
    /// [`Reader::mark`], and discards the mark.
    pub fn unmark(&mut self, expected: usize, object: &'static str) -> Result<(), DecodeError> {
        let start = self.marks.pop().ok_or(DecodeError::MalformedEncoding {
            context: "unmark without mark",
        })?;
        let delta = (self.pointer() - start) as i64 - (expected * 8) as i64;
        if delta != 0 {
            return Err(DecodeError::mismatch(
                object,
                self.base + start / 8,
                expected,
                delta,
            ));
        }
        Ok(())
    }
}

fn extend(value: u64, n_bytes: usize, signed: bool) -> i64 {
    if signed {
        let shift = 64 - 8 * n_bytes as u32;
        ((value << shift) as i64) >> shift
    } else {
        value as i64
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
///
/// Without a sink the writer accumulates everything in memory. With a sink,
/// complete bytes are written through once the internal buffer reaches
/// [`WRITER_BUFFER_SIZE`]; call [`Writer::finish`] to flush the tail.
pub struct Writer<'s> {
    sink: Option<&'s mut dyn Write>,
    buf: Vec<u8>,
    /// Bytes already handed to the sink.
    flushed: usize,
    /// Bits used in the last byte of `buf`; 0 when aligned.
    offset: u8,
    encoding: TextEncoding,
    marks: Vec<usize>,
}

impl fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("buffered", &self.buf.len())
            .field("flushed", &self.flushed)
            .field("offset", &self.offset)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl Default for Writer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> Writer<'s> {
    /// Creates a new in-memory writer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sink: None,
            buf: Vec::with_capacity(capacity),
            flushed: 0,
            offset: 0,
            encoding: TextEncoding::default(),
            marks: Vec::new(),
        }
    }

    /// Creates a writer that flushes to `sink` as its buffer fills.
    pub fn with_sink(sink: &'s mut dyn Write) -> Self {
        Self {
            sink: Some(sink),
            buf: Vec::with_capacity(WRITER_BUFFER_SIZE),
            flushed: 0,
            offset: 0,
            encoding: TextEncoding::default(),
            marks: Vec::new(),
        }
    }

    /// Returns the current position in bits.
    pub fn pointer(&self) -> usize {
        let bytes = (self.flushed + self.buf.len()) * 8;
        if self.offset == 0 {
            bytes
        } else {
            bytes - (8 - self.offset as usize)
        }
    }

    /// Returns the number of bytes written, counting a partial last byte.
    pub fn len(&self) -> usize {
        self.flushed + self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bytes still held in the buffer.
    ///
    /// For an in-memory writer this is everything written.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the buffered bytes, consuming the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns the encoding used for string fields.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Sets the encoding used for string fields.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    /// Sets the encoding used for string fields by name.
    pub fn set_encoding_name(&mut self, name: &str) -> Result<(), ConfigurationError> {
        self.encoding = TextEncoding::from_name(name)?;
        Ok(())
    }

    fn flush_if_full(&mut self) -> Result<(), EncodeError> {
        if self.sink.is_some() && self.buf.len() >= WRITER_BUFFER_SIZE {
            self.flush_complete()?;
        }
        Ok(())
    }

    /// Hands all complete bytes to the sink, keeping a partial last byte.
    fn flush_complete(&mut self) -> Result<(), EncodeError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let keep = usize::from(self.offset != 0);
        let n = self.buf.len() - keep;
        sink.write_all(&self.buf[..n])?;
        self.buf.drain(..n);
        self.flushed += n;
        Ok(())
    }

    /// Pads to a byte boundary and flushes everything to the sink.
    pub fn finish(&mut self) -> Result<(), EncodeError> {
        self.align_to_byte();
        self.flush_complete()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Pads the current byte with zero bits; no-op if already aligned.
    #[inline]
    pub fn align_to_byte(&mut self) {
        self.offset = 0;
    }

    /// Writes the low `n` bits (0 to 32) of `value`.
    pub fn write_bits(&mut self, value: u32, n: u32) -> Result<(), EncodeError> {
        debug_assert!(n <= 32);
        let mut remaining = n;
        let value = value as u64;
        while remaining > 0 {
            if self.offset == 0 {
                self.buf.push(0);
            }
            let free = 8 - self.offset as u32;
            let take = free.min(remaining);
            let bits = (value >> (remaining - take)) & ((1u64 << take) - 1);
            if let Some(last) = self.buf.last_mut() {
                *last |= (bits << (free - take)) as u8;
            }
            self.offset = ((self.offset as u32 + take) % 8) as u8;
            remaining -= take;
        }
        self.flush_if_full()
    }

    /// Writes `value` as a signed (two's complement) field of `n` bits.
    #[inline]
    pub fn write_sbits(&mut self, value: i32, n: u32) -> Result<(), EncodeError> {
        self.write_bits(value as u32, n)
    }

    /// Writes a single-bit flag.
    #[inline]
    pub fn write_bool(&mut self, flag: bool) -> Result<(), EncodeError> {
        self.write_bits(u32::from(flag), 1)
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result<(), EncodeError> {
        self.align_to_byte();
        self.buf.push(byte);
        self.flush_if_full()
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.align_to_byte();
        self.buf.extend_from_slice(bytes);
        self.flush_if_full()
    }

    /// Writes the low `n_bytes` (1 to 4) of `value` little-endian.
    pub fn write_word(&mut self, value: i64, n_bytes: usize) -> Result<(), EncodeError> {
        debug_assert!((1..=4).contains(&n_bytes));
        let bytes = (value as u64).to_le_bytes();
        self.write_bytes(&bytes[..n_bytes])
    }

    /// Writes the low `n_bytes` (1 to 4) of `value` big-endian.
    pub fn write_word_be(&mut self, value: i64, n_bytes: usize) -> Result<(), EncodeError> {
        debug_assert!((1..=4).contains(&n_bytes));
        let bytes = (value as u64).to_be_bytes();
        self.write_bytes(&bytes[8 - n_bytes..])
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_word(value as i64, 2)
    }

    #[inline]
    pub fn write_i16(&mut self, value: i16) -> Result<(), EncodeError> {
        self.write_word(value as i64, 2)
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_word(value as i64, 4)
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) -> Result<(), EncodeError> {
        self.write_word(value as i64, 4)
    }

    /// Writes a variable-length unsigned 32-bit integer.
    pub fn write_variable_u32(&mut self, mut value: u32) -> Result<(), EncodeError> {
        let mut buf = [0u8; MAX_VARINT_GROUPS];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.write_bytes(&buf[..len])
    }

    /// Writes a string without terminator.
    pub fn write_string(&mut self, text: &str, field: &'static str) -> Result<(), EncodeError> {
        let bytes = self.encoding.encode(text, field)?;
        self.write_bytes(&bytes)
    }

    /// Writes a string followed by a null terminator.
    pub fn write_cstring(&mut self, text: &str, field: &'static str) -> Result<(), EncodeError> {
        self.write_string(text, field)?;
        for _ in 0..self.encoding.unit_len() {
            self.write_byte(0)?;
        }
        Ok(())
    }

    /// Returns the encoded size of a null-terminated string.
    pub fn cstring_len(&self, text: &str) -> usize {
        self.encoding.encoded_len(text) + self.encoding.unit_len()
    }

    /// Records the current position for a later [`Writer::unmark`].
    pub fn mark(&mut self) {
        self.marks.push(self.pointer());
    }

    /// Checks that exactly `expected` bytes were written since the matching
    /// [`Writer::mark`], and discards the mark.
    pub fn unmark(&mut self, expected: usize, object: &'static str) -> Result<(), EncodeError> {
        let start = self.marks.pop().ok_or(EncodeError::UnbalancedMark)?;
        let delta = (self.pointer() - start) as i64 - (expected * 8) as i64;
        if delta != 0 {
            return Err(EncodeError::mismatch(object, start / 8, expected, delta));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bits_roundtrip_across_bytes() {
        let mut writer = Writer::new();
        writer.write_bits(0b101, 3).unwrap();
        writer.write_sbits(-5, 7).unwrap();
        writer.write_bits(0xDEAD_BEEF, 32).unwrap();
        writer.write_bool(true).unwrap();
        assert_eq!(writer.pointer(), 43);
        writer.align_to_byte();
        assert_eq!(writer.len(), 6);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_ubits(3, "a").unwrap(), 0b101);
        assert_eq!(reader.read_sbits(7, "b").unwrap(), -5);
        assert_eq!(reader.read_ubits(32, "c").unwrap(), 0xDEAD_BEEF);
        assert!(reader.read_bool("d").unwrap());
    }

    #[test]
    fn test_bits_msb_first() {
        let mut reader = Reader::new(&[0b1010_0000, 0xFF]);
        assert_eq!(reader.read_ubits(1, "a").unwrap(), 1);
        assert_eq!(reader.read_ubits(2, "b").unwrap(), 0b01);
        assert_eq!(reader.pointer(), 3);
        reader.align_to_byte();
        assert_eq!(reader.read_byte("c").unwrap(), 0xFF);
    }

    #[test]
    fn test_read_past_end() {
        let mut reader = Reader::new(&[0xFF]);
        reader.read_ubits(6, "a").unwrap();
        let result = reader.read_ubits(3, "b");
        assert!(matches!(
            result,
            Err(DecodeError::UnexpectedEof { context: "b", position: 6 })
        ));
    }

    #[test]
    fn test_zero_width_fields() {
        let mut reader = Reader::new(&[]);
        assert_eq!(reader.read_ubits(0, "a").unwrap(), 0);
        assert_eq!(reader.read_sbits(0, "b").unwrap(), 0);
    }

    #[test]
    fn test_words_little_and_big_endian() {
        let mut writer = Writer::new();
        writer.write_u16(0x1234).unwrap();
        writer.write_i32(-2).unwrap();
        writer.write_word_be(0x0A0B0C, 3).unwrap();

        assert_eq!(
            writer.as_bytes(),
            &[0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF, 0x0A, 0x0B, 0x0C]
        );

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_u16("a").unwrap(), 0x1234);
        assert_eq!(reader.read_i32("b").unwrap(), -2);
        assert_eq!(reader.read_word_be(3, false, "c").unwrap(), 0x0A0B0C);
    }

    #[test]
    fn test_signed_word_extension() {
        let mut reader = Reader::new(&[0xFF, 0x7F, 0x80]);
        assert_eq!(reader.read_word(1, true, "a").unwrap(), -1);
        assert_eq!(reader.read_word(1, true, "b").unwrap(), 127);
        assert_eq!(reader.read_word(1, false, "c").unwrap(), 128);
    }

    #[test]
    fn test_byte_reads_align() {
        let mut reader = Reader::new(&[0xF0, 0x42]);
        reader.read_ubits(4, "nibble").unwrap();
        assert_eq!(reader.read_byte("byte").unwrap(), 0x42);
    }

    #[test]
    fn test_scan_does_not_advance() {
        let reader = Reader::new(&[0x3F, 0x01, 0x80]);
        assert_eq!(reader.scan_byte().unwrap(), 0x3F);
        assert_eq!(reader.scan_u16().unwrap(), 0x013F);
        assert_eq!(reader.scan_bits(2).unwrap(), 0);
        assert_eq!(reader.pointer(), 0);
    }

    #[test]
    fn test_variable_u32_roundtrip() {
        let cases = [
            (0u32, 1usize),
            (127, 1),
            (128, 2),
            (16383, 2),
            (16384, 3),
            (i32::MAX as u32, 5),
            (u32::MAX, 5),
        ];
        for (value, groups) in cases {
            let mut writer = Writer::new();
            writer.write_variable_u32(value).unwrap();
            assert_eq!(writer.len(), groups, "size of {value}");
            assert_eq!(variable_u32_size(value), groups, "precomputed size of {value}");

            let mut reader = Reader::new(writer.as_bytes());
            assert_eq!(reader.read_variable_u32("test").unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_variable_u32_too_long() {
        let data = [0x80u8; 6];
        let mut reader = Reader::new(&data);
        let result = reader.read_variable_u32("test");
        assert!(matches!(result, Err(DecodeError::VarintTooLong { max: 5 })));

        let data = [0x80, 0x80, 0x80, 0x80, 0x8F, 0x00];
        let mut reader = Reader::new(&data);
        let result = reader.read_variable_u32("test");
        assert!(matches!(result, Err(DecodeError::VarintTooLong { max: 5 })));
    }

    #[test]
    fn test_variable_u32_overflow() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        let mut reader = Reader::new(&data);
        let result = reader.read_variable_u32("test");
        assert!(matches!(result, Err(DecodeError::VarintOverflow)));
    }

    #[test]
    fn test_cstring_roundtrip() {
        for encoding in [TextEncoding::Utf8, TextEncoding::Utf16Le] {
            let mut writer = Writer::new();
            writer.set_encoding(encoding);
            writer.write_cstring("frame one", "label").unwrap();
            writer.write_byte(0x7E).unwrap();
            assert_eq!(writer.len(), writer.cstring_len("frame one") + 1);

            let mut reader = Reader::new(writer.as_bytes());
            reader.set_encoding(encoding);
            assert_eq!(reader.read_cstring("label").unwrap(), "frame one");
            assert_eq!(reader.read_byte("tail").unwrap(), 0x7E);
        }
    }

    #[test]
    fn test_unterminated_cstring() {
        let mut reader = Reader::new(b"abc");
        let result = reader.read_cstring("label");
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_set_encoding_name_is_eager() {
        let mut reader = Reader::new(&[]);
        assert!(reader.set_encoding_name("klingon").is_err());
        assert_eq!(reader.encoding(), TextEncoding::Utf8);

        let mut writer = Writer::new();
        writer.set_encoding_name("latin1").unwrap();
        assert_eq!(writer.encoding(), TextEncoding::Latin1);
    }

    #[test]
    fn test_find_bits() {
        let data = [0x00, 0b0001_0110, 0x00];
        let mut reader = Reader::new(&data);
        assert!(reader.find_bits(0b1011, 4, 1));
        assert_eq!(reader.pointer(), 11);

        let mut reader = Reader::new(&data);
        reader.read_ubits(2, "skip").unwrap();
        assert!(!reader.find_bits(0b1111, 4, 1));
        assert_eq!(reader.pointer(), 2);
    }

    #[test]
    fn test_find_word() {
        let data = [0x01, 0x02, 0xFF, 0xD8, 0x05];
        let mut reader = Reader::new(&data);
        assert!(reader.find_word(0xD8FF, 2, 1));
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_u16("marker").unwrap(), 0xD8FF);

        let mut reader = Reader::new(&data);
        assert!(!reader.find_word(0xBEEF, 2, 1));
        assert_eq!(reader.pointer(), 0);
    }

    #[test]
    fn test_unmark_detects_mismatch() {
        let data = [0u8; 4];

        let mut reader = Reader::new(&data);
        reader.mark();
        reader.read_u16("a").unwrap();
        reader.read_ubits(7, "b").unwrap();
        let result = reader.unmark(3, "Probe");
        assert!(matches!(
            result,
            Err(DecodeError::Underflow { object: "Probe", expected: 3, delta: -1, .. })
        ));

        let mut reader = Reader::new(&data);
        reader.mark();
        reader.read_u16("a").unwrap();
        reader.read_ubits(9, "b").unwrap();
        let result = reader.unmark(3, "Probe");
        assert!(matches!(result, Err(DecodeError::Overflow { delta: 1, .. })));

        let mut reader = Reader::new(&data);
        reader.mark();
        reader.read_bytes(3, "a").unwrap();
        assert!(reader.unmark(3, "Probe").is_ok());
    }

    #[test]
    fn test_writer_unmark_detects_mismatch() {
        let mut writer = Writer::new();
        writer.mark();
        writer.write_u32(7).unwrap();
        let result = writer.unmark(2, "Probe");
        assert!(matches!(result, Err(EncodeError::Overflow { delta: 16, .. })));

        let result = writer.unmark(0, "Probe");
        assert_eq!(result, Err(EncodeError::UnbalancedMark));
    }

    #[test]
    fn test_slice_reports_enclosing_location() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut reader = Reader::new(&data);
        reader.read_u16("skip").unwrap();
        let mut sub = reader.slice(2, "body").unwrap();
        assert_eq!(reader.position(), 4);
        assert_eq!(sub.read_byte("a").unwrap(), 3);
        assert_eq!(sub.location(), 3);
        let result = sub.read_u16("b");
        assert!(matches!(
            result,
            Err(DecodeError::UnexpectedEof { position: 24, .. })
        ));
    }

    #[test]
    fn test_sink_writer_flushes() {
        let mut sink = Vec::new();
        {
            let mut writer = Writer::with_sink(&mut sink);
            for i in 0..(WRITER_BUFFER_SIZE * 2 + 3) {
                writer.write_byte(i as u8).unwrap();
            }
            writer.write_bits(0b1, 1).unwrap();
            assert!(writer.as_bytes().len() < WRITER_BUFFER_SIZE);
            assert_eq!(writer.len(), WRITER_BUFFER_SIZE * 2 + 4);
            writer.finish().unwrap();
        }
        assert_eq!(sink.len(), WRITER_BUFFER_SIZE * 2 + 4);
        assert_eq!(sink[WRITER_BUFFER_SIZE], 0);
        assert_eq!(*sink.last().unwrap(), 0x80);
    }

    proptest! {
        #[test]
        fn prop_unsigned_bits_roundtrip(n in 1u32..=32, raw in any::<u32>(), lead in 0u32..8) {
            let value = if n == 32 { raw } else { raw & ((1u32 << n) - 1) };
            let mut writer = Writer::new();
            writer.write_bits(0, lead).unwrap();
            writer.write_bits(value, n).unwrap();

            let mut reader = Reader::new(writer.as_bytes());
            reader.read_ubits(lead, "lead").unwrap();
            prop_assert_eq!(reader.read_ubits(n, "value").unwrap(), value);
        }

        #[test]
        fn prop_signed_bits_roundtrip(n in 1u32..=32, raw in any::<i32>(), lead in 0u32..8) {
            let shift = 32 - n;
            let value = (raw << shift) >> shift;
            let mut writer = Writer::new();
            writer.write_bits(u32::MAX, lead).unwrap();
            writer.write_sbits(value, n).unwrap();

            let mut reader = Reader::new(writer.as_bytes());
            reader.read_ubits(lead, "lead").unwrap();
            prop_assert_eq!(reader.read_sbits(n, "value").unwrap(), value);
        }
    }
}
