//! Fixed-point and floating-point field codecs.
//!
//! Half-precision floats are converted with explicit bit manipulation:
//! decoding renormalizes subnormals and keeps NaN payloads, encoding
//! truncates the mantissa and flushes values below the smallest subnormal
//! to zero.

use crate::codec::cursor::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};

/// Signed 16.16 fixed-point number, stored as its raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ONE: Fixed = Fixed(0x1_0000);

    /// Converts from a float, truncating towards zero.
    pub fn from_f64(value: f64) -> Self {
        Fixed((value * 65536.0) as i32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 65536.0
    }
}

/// Signed 8.8 fixed-point number, stored as its raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Fixed8(pub i16);

impl Fixed8 {
    pub const ONE: Fixed8 = Fixed8(0x100);

    /// Converts from a float, truncating towards zero.
    pub fn from_f32(value: f32) -> Self {
        Fixed8((value * 256.0) as i16)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 256.0
    }
}

/// Returns the number of bits needed to hold `value` as an unsigned field.
pub fn unsigned_bits(value: u32) -> u32 {
    32 - value.leading_zeros()
}

/// Returns the number of bits needed to hold `value` as a signed field.
///
/// Zero needs no bits at all; `-1` needs one.
pub fn signed_bits(value: i32) -> u32 {
    match value {
        0 => 0,
        v if v > 0 => 33 - v.leading_zeros(),
        v => 33 - (!v).leading_zeros(),
    }
}

/// Returns the widest of the signed field sizes of `values`.
pub fn max_signed_bits(values: &[i32]) -> u32 {
    values.iter().map(|v| signed_bits(*v)).max().unwrap_or(0)
}

/// Converts half-precision bits (bias 15) to a single-precision float.
pub fn half_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) & 0x1) as u32;
    let mut exponent = ((bits >> 10) & 0x1F) as i32;
    let mut mantissa = (bits & 0x03FF) as u32;

    let single = if exponent == 0 {
        if mantissa == 0 {
            sign << 31
        } else {
            // Subnormal: shift until the implicit bit appears.
            while mantissa & 0x0400 == 0 {
                mantissa <<= 1;
                exponent -= 1;
            }
            exponent += 1;
            mantissa &= !0x0400;
            (sign << 31) | (((exponent + (127 - 15)) as u32) << 23) | (mantissa << 13)
        }
    } else if exponent == 0x1F {
        (sign << 31) | 0x7F80_0000 | (mantissa << 13)
    } else {
        (sign << 31) | (((exponent + (127 - 15)) as u32) << 23) | (mantissa << 13)
    };
    f32::from_bits(single)
}

/// Converts a single-precision float to half-precision bits (bias 15).
///
/// The mantissa is truncated. Values too large for a half become
/// infinity and values too small become zero.
pub fn f32_to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xFF) as i32 - (127 - 15);
    let mantissa = bits & 0x007F_FFFF;

    if exponent == 0xFF - (127 - 15) {
        if mantissa == 0 {
            sign | 0x7C00
        } else {
            // Keep NaN a NaN even if the payload lives in the dropped bits.
            let payload = (mantissa >> 13) as u16;
            sign | 0x7C00 | payload | u16::from(payload == 0)
        }
    } else if exponent <= 0 {
        if exponent < -10 {
            sign
        } else {
            let mantissa = (mantissa | 0x0080_0000) >> (1 - exponent);
            sign | (mantissa >> 13) as u16
        }
    } else if exponent > 30 {
        sign | 0x7C00
    } else {
        sign | ((exponent as u16) << 10) | (mantissa >> 13) as u16
    }
}

impl Reader<'_> {
    /// Reads a 16.16 fixed-point value.
    pub fn read_fixed(&mut self, context: &'static str) -> Result<Fixed, DecodeError> {
        Ok(Fixed(self.read_i32(context)?))
    }

    /// Reads an 8.8 fixed-point value.
    pub fn read_fixed8(&mut self, context: &'static str) -> Result<Fixed8, DecodeError> {
        Ok(Fixed8(self.read_i16(context)?))
    }

    /// Reads a 16.16 fixed-point value packed in `n` bits.
    pub fn read_fixed_bits(&mut self, n: u32, context: &'static str) -> Result<Fixed, DecodeError> {
        Ok(Fixed(self.read_sbits(n, context)?))
    }

    /// Reads a half-precision float.
    pub fn read_half(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        Ok(half_to_f32(self.read_u16(context)?))
    }

    /// Reads a little-endian single-precision float.
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_u32(context)?))
    }

    /// Reads a double stored as two little-endian words, high word first.
    pub fn read_double(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let high = self.read_u32(context)? as u64;
        let low = self.read_u32(context)? as u64;
        Ok(f64::from_bits((high << 32) | low))
    }

    /// Reads a big-endian double.
    pub fn read_f64_be(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let high = self.read_word_be(4, false, context)? as u64;
        let low = self.read_word_be(4, false, context)? as u64;
        Ok(f64::from_bits((high << 32) | low))
    }
}

impl Writer<'_> {
    pub fn write_fixed(&mut self, value: Fixed) -> Result<(), EncodeError> {
        self.write_i32(value.0)
    }

    pub fn write_fixed8(&mut self, value: Fixed8) -> Result<(), EncodeError> {
        self.write_i16(value.0)
    }

    pub fn write_fixed_bits(&mut self, value: Fixed, n: u32) -> Result<(), EncodeError> {
        self.write_sbits(value.0, n)
    }

    pub fn write_half(&mut self, value: f32) -> Result<(), EncodeError> {
        self.write_u16(f32_to_half(value))
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), EncodeError> {
        self.write_u32(value.to_bits())
    }

    /// Writes a double as two little-endian words, high word first.
    pub fn write_double(&mut self, value: f64) -> Result<(), EncodeError> {
        let bits = value.to_bits();
        self.write_u32((bits >> 32) as u32)?;
        self.write_u32(bits as u32)
    }

    pub fn write_f64_be(&mut self, value: f64) -> Result<(), EncodeError> {
        self.write_bytes(&value.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_sizes() {
        assert_eq!(unsigned_bits(0), 0);
        assert_eq!(unsigned_bits(1), 1);
        assert_eq!(unsigned_bits(255), 8);
        assert_eq!(signed_bits(0), 0);
        assert_eq!(signed_bits(-1), 1);
        assert_eq!(signed_bits(1), 2);
        assert_eq!(signed_bits(-2), 2);
        assert_eq!(signed_bits(127), 8);
        assert_eq!(signed_bits(-128), 8);
        assert_eq!(signed_bits(i32::MIN), 32);
        assert_eq!(max_signed_bits(&[0, 20, -300]), 10);
    }

    #[test]
    fn test_fixed_conversions() {
        assert_eq!(Fixed::from_f64(1.5), Fixed(0x18000));
        assert_eq!(Fixed(-0x8000).to_f64(), -0.5);
        assert_eq!(Fixed8::from_f32(24.0), Fixed8(0x1800));
        assert_eq!(Fixed8(0x0180).to_f32(), 1.5);
    }

    #[test]
    fn test_half_normal_values() {
        assert_eq!(half_to_f32(0x3C00), 1.0);
        assert_eq!(half_to_f32(0xC000), -2.0);
        assert_eq!(half_to_f32(0x7BFF), 65504.0);
        assert_eq!(f32_to_half(1.0), 0x3C00);
        assert_eq!(f32_to_half(-2.0), 0xC000);
        assert_eq!(f32_to_half(65504.0), 0x7BFF);
    }

    #[test]
    fn test_half_zero_and_subnormal() {
        assert_eq!(half_to_f32(0x0000).to_bits(), 0);
        assert_eq!(half_to_f32(0x8000).to_bits(), 0x8000_0000);
        // Smallest subnormal: 2^-24.
        assert_eq!(half_to_f32(0x0001), 2f32.powi(-24));
        assert_eq!(half_to_f32(0x0200), 2f32.powi(-15));
        assert_eq!(f32_to_half(2f32.powi(-24)), 0x0001);
        assert_eq!(f32_to_half(2f32.powi(-15)), 0x0200);
        assert_eq!(f32_to_half(2f32.powi(-30)), 0x0000);
        assert_eq!(f32_to_half(-(2f32.powi(-30))), 0x8000);
    }

    #[test]
    fn test_half_infinity_and_nan() {
        assert_eq!(half_to_f32(0x7C00), f32::INFINITY);
        assert_eq!(half_to_f32(0xFC00), f32::NEG_INFINITY);
        assert!(half_to_f32(0x7E00).is_nan());
        assert_eq!(f32_to_half(f32::INFINITY), 0x7C00);
        assert_eq!(f32_to_half(f32::NEG_INFINITY), 0xFC00);
        assert_eq!(f32_to_half(1.0e9), 0x7C00);
        assert_eq!(f32_to_half(f32::NAN) & 0x7C00, 0x7C00);
        assert_ne!(f32_to_half(f32::NAN) & 0x03FF, 0);
        // NaN whose payload only has low bits still encodes as NaN.
        assert_eq!(f32_to_half(f32::from_bits(0x7F80_0001)), 0x7C01);
    }

    #[test]
    fn test_half_truncates() {
        // 1 + 2^-11 is not representable; truncation gives 1.0.
        assert_eq!(f32_to_half(1.0 + 2f32.powi(-11)), 0x3C00);
    }

    #[test]
    fn test_double_word_order() {
        let mut writer = Writer::new();
        writer.write_double(1.0).unwrap();
        assert_eq!(writer.as_bytes(), &[0x00, 0x00, 0xF0, 0x3F, 0, 0, 0, 0]);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_double("double").unwrap(), 1.0);
    }

    #[test]
    fn test_float_roundtrips() {
        let mut writer = Writer::new();
        writer.write_f32(-3.25).unwrap();
        writer.write_f64_be(1234.5).unwrap();
        writer.write_half(0.5).unwrap();
        writer.write_fixed(Fixed(-0x18000)).unwrap();
        writer.write_fixed8(Fixed8(0x0280)).unwrap();
        writer.write_fixed_bits(Fixed(0x8000), 17).unwrap();

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_f32("a").unwrap(), -3.25);
        assert_eq!(reader.read_f64_be("b").unwrap(), 1234.5);
        assert_eq!(reader.read_half("c").unwrap(), 0.5);
        assert_eq!(reader.read_fixed("d").unwrap(), Fixed(-0x18000));
        assert_eq!(reader.read_fixed8("e").unwrap(), Fixed8(0x0280));
        assert_eq!(reader.read_fixed_bits(17, "f").unwrap(), Fixed(0x8000));
    }
}
