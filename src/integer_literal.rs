//! Exact signed/unsigned integer values with required-bit-count tracking.
//!
//! Used for metadata literals (enum ranges, sizes, ids) as well as for every integer
//! decoded from a stream.

use crate::error::{Error, MetadataError, UnsupportedValueError};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntegerValue {
    Signed(i64),
    Unsigned(u64),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct IntegerLiteral {
    value: IntegerValue,
    required_bit_count: u16,
}

impl IntegerLiteral {
    pub fn signed(v: i64) -> Self {
        IntegerLiteral {
            value: IntegerValue::Signed(v),
            required_bit_count: signed_bit_count(v),
        }
    }

    pub fn unsigned(v: u64) -> Self {
        IntegerLiteral {
            value: IntegerValue::Unsigned(v),
            required_bit_count: unsigned_bit_count(v),
        }
    }

    /// Parse a decimal, hexadecimal (`0x`) or octal (leading `0`) literal with an optional
    /// sign and an optional `u`/`l`/`ul`/`ull` suffix.
    pub fn parse(literal: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| {
            Error::from(MetadataError::InvalidLiteral {
                literal: literal.to_owned(),
                reason: reason.to_owned(),
            })
        };

        let s = literal.trim();
        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, s[1..].trim_start()),
            Some(b'+') => (false, s[1..].trim_start()),
            _ => (false, s),
        };

        let digits_end = s
            .find(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))
            .unwrap_or(s.len());
        let (body, suffix) = s.split_at(digits_end);
        let has_unsigned_suffix = match suffix.to_ascii_lowercase().as_str() {
            "" | "l" | "ll" => false,
            "u" | "ul" | "lu" | "ull" | "llu" => true,
            _ => return Err(invalid("unrecognized suffix")),
        };

        let (radix, digits) = if let Some(hex) = body
            .strip_prefix("0x")
            .or_else(|| body.strip_prefix("0X"))
        {
            (16, hex)
        } else if body.len() > 1 && body.starts_with('0') {
            (8, &body[1..])
        } else {
            (10, body)
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(invalid("not a number"));
        }

        let magnitude = u64::from_str_radix(digits, radix)
            .map_err(|_| UnsupportedValueError::TooWide(literal.to_owned()))?;

        if has_unsigned_suffix {
            if negative && magnitude != 0 {
                return Err(invalid("negative value with an unsigned suffix"));
            }
            return Ok(IntegerLiteral::unsigned(magnitude));
        }

        if negative {
            match 0_i128.checked_sub(i128::from(magnitude)) {
                Some(v) if v >= i128::from(i64::MIN) => Ok(IntegerLiteral::signed(v as i64)),
                _ => Err(UnsupportedValueError::TooWide(literal.to_owned()).into()),
            }
        } else if let Ok(v) = i64::try_from(magnitude) {
            Ok(IntegerLiteral::signed(v))
        } else {
            Ok(IntegerLiteral::unsigned(magnitude))
        }
    }

    pub fn value(&self) -> IntegerValue {
        self.value
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.value, IntegerValue::Signed(_))
    }

    pub fn is_negative(&self) -> bool {
        matches!(self.value, IntegerValue::Signed(v) if v < 0)
    }

    pub fn required_bit_count(&self) -> u16 {
        self.required_bit_count
    }

    pub fn as_signed(&self) -> Result<i64, UnsupportedValueError> {
        match self.value {
            IntegerValue::Signed(v) => Ok(v),
            IntegerValue::Unsigned(_) => Err(UnsupportedValueError::SignednessMismatch {
                requested: "signed",
                actual: "unsigned",
            }),
        }
    }

    pub fn as_unsigned(&self) -> Result<u64, UnsupportedValueError> {
        match self.value {
            IntegerValue::Unsigned(v) => Ok(v),
            IntegerValue::Signed(_) => Err(UnsupportedValueError::SignednessMismatch {
                requested: "unsigned",
                actual: "signed",
            }),
        }
    }

    /// Exact value regardless of representation, for comparisons.
    pub fn as_i128(&self) -> i128 {
        match self.value {
            IntegerValue::Signed(v) => i128::from(v),
            IntegerValue::Unsigned(v) => i128::from(v),
        }
    }

    /// Reinterpret as signed. The required bit count grows by the sign bit.
    ///
    /// Values above `i64::MAX` only convert when `force` is set, in which case they wrap.
    pub fn to_signed(&self, force: bool) -> Result<IntegerLiteral, UnsupportedValueError> {
        match self.value {
            IntegerValue::Signed(_) => Ok(*self),
            IntegerValue::Unsigned(v) => match i64::try_from(v) {
                Ok(sv) => Ok(IntegerLiteral {
                    value: IntegerValue::Signed(sv),
                    required_bit_count: (self.required_bit_count + 1).min(64),
                }),
                Err(_) if force => Ok(IntegerLiteral {
                    value: IntegerValue::Signed(v as i64),
                    required_bit_count: 64,
                }),
                Err(_) => Err(UnsupportedValueError::LossyConversion {
                    value: self.to_string(),
                    target: "signed",
                }),
            },
        }
    }

    /// Reinterpret as unsigned. The required bit count drops the sign bit.
    ///
    /// Negative values only convert when `force` is set, in which case they wrap.
    pub fn to_unsigned(&self, force: bool) -> Result<IntegerLiteral, UnsupportedValueError> {
        match self.value {
            IntegerValue::Unsigned(_) => Ok(*self),
            IntegerValue::Signed(v) if v >= 0 => Ok(IntegerLiteral {
                value: IntegerValue::Unsigned(v as u64),
                required_bit_count: self.required_bit_count.saturating_sub(1).max(1),
            }),
            IntegerValue::Signed(v) if force => Ok(IntegerLiteral {
                value: IntegerValue::Unsigned(v as u64),
                required_bit_count: 64,
            }),
            IntegerValue::Signed(_) => Err(UnsupportedValueError::LossyConversion {
                value: self.to_string(),
                target: "unsigned",
            }),
        }
    }

    fn check_fits(
        &self,
        target_bits: u16,
        target_signed: bool,
        target: &'static str,
    ) -> Result<(), UnsupportedValueError> {
        let required = match (self.value, target_signed) {
            (IntegerValue::Signed(_), true) | (IntegerValue::Unsigned(_), false) => {
                Some(self.required_bit_count)
            }
            (IntegerValue::Unsigned(_), true) => Some(self.required_bit_count + 1),
            (IntegerValue::Signed(v), false) if v >= 0 => {
                Some(self.required_bit_count.saturating_sub(1).max(1))
            }
            (IntegerValue::Signed(_), false) => None,
        };
        match required {
            Some(r) if r <= target_bits => Ok(()),
            Some(r) => Err(UnsupportedValueError::Narrowing {
                value: self.to_string(),
                required: r,
                target,
            }),
            None => Err(UnsupportedValueError::LossyConversion {
                value: self.to_string(),
                target,
            }),
        }
    }

    pub fn to_i8(&self) -> Result<i8, UnsupportedValueError> {
        self.check_fits(8, true, "i8")?;
        Ok(self.as_i128() as i8)
    }

    pub fn to_i16(&self) -> Result<i16, UnsupportedValueError> {
        self.check_fits(16, true, "i16")?;
        Ok(self.as_i128() as i16)
    }

    pub fn to_i32(&self) -> Result<i32, UnsupportedValueError> {
        self.check_fits(32, true, "i32")?;
        Ok(self.as_i128() as i32)
    }

    pub fn to_i64(&self) -> Result<i64, UnsupportedValueError> {
        self.check_fits(64, true, "i64")?;
        Ok(self.as_i128() as i64)
    }

    pub fn to_u8(&self) -> Result<u8, UnsupportedValueError> {
        self.check_fits(8, false, "u8")?;
        Ok(self.as_i128() as u8)
    }

    pub fn to_u16(&self) -> Result<u16, UnsupportedValueError> {
        self.check_fits(16, false, "u16")?;
        Ok(self.as_i128() as u16)
    }

    pub fn to_u32(&self) -> Result<u32, UnsupportedValueError> {
        self.check_fits(32, false, "u32")?;
        Ok(self.as_i128() as u32)
    }

    pub fn to_u64(&self) -> Result<u64, UnsupportedValueError> {
        self.check_fits(64, false, "u64")?;
        Ok(self.as_i128() as u64)
    }
}

/// Minimal width of an unsigned value, zero needs one bit.
fn unsigned_bit_count(v: u64) -> u16 {
    (64 - v.leading_zeros()).max(1) as u16
}

/// Minimal two's-complement width, including the sign bit.
fn signed_bit_count(v: i64) -> u16 {
    let magnitude_bits = if v < 0 { !v } else { v };
    (65 - magnitude_bits.leading_zeros()) as u16
}

impl From<i64> for IntegerLiteral {
    fn from(v: i64) -> Self {
        IntegerLiteral::signed(v)
    }
}

impl From<u64> for IntegerLiteral {
    fn from(v: u64) -> Self {
        IntegerLiteral::unsigned(v)
    }
}

impl FromStr for IntegerLiteral {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntegerLiteral::parse(s)
    }
}

impl PartialOrd for IntegerLiteral {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.as_i128().cmp(&other.as_i128()))
    }
}

impl fmt::Display for IntegerLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            IntegerValue::Signed(v) => write!(f, "{v}"),
            IntegerValue::Unsigned(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn parse_radixes_and_suffixes() {
        assert_eq!(IntegerLiteral::parse("42").unwrap(), IntegerLiteral::signed(42));
        assert_eq!(IntegerLiteral::parse("0x2A").unwrap(), IntegerLiteral::signed(42));
        assert_eq!(IntegerLiteral::parse("052").unwrap(), IntegerLiteral::signed(42));
        assert_eq!(IntegerLiteral::parse("0").unwrap(), IntegerLiteral::signed(0));
        assert_eq!(IntegerLiteral::parse("42u").unwrap(), IntegerLiteral::unsigned(42));
        assert_eq!(IntegerLiteral::parse("42UL").unwrap(), IntegerLiteral::unsigned(42));
        assert_eq!(IntegerLiteral::parse("42ull").unwrap(), IntegerLiteral::unsigned(42));
        assert_eq!(IntegerLiteral::parse("42l").unwrap(), IntegerLiteral::signed(42));
        assert_eq!(IntegerLiteral::parse("-1").unwrap(), IntegerLiteral::signed(-1));
        assert_eq!(
            IntegerLiteral::parse("0xFFFFFFFFFFFFFFFF").unwrap(),
            IntegerLiteral::unsigned(u64::MAX)
        );
        assert_eq!(
            IntegerLiteral::parse("-9223372036854775808").unwrap(),
            IntegerLiteral::signed(i64::MIN)
        );
    }

    #[test]
    fn parse_failures() {
        assert!(matches!(
            IntegerLiteral::parse("0x1FFFFFFFFFFFFFFFF"),
            Err(Error::UnsupportedValue(UnsupportedValueError::TooWide(_)))
        ));
        assert!(matches!(
            IntegerLiteral::parse("-9223372036854775809"),
            Err(Error::UnsupportedValue(UnsupportedValueError::TooWide(_)))
        ));
        assert!(matches!(
            IntegerLiteral::parse("12q"),
            Err(Error::Metadata(MetadataError::InvalidLiteral { .. }))
        ));
        assert!(IntegerLiteral::parse("08").is_err());
        assert!(IntegerLiteral::parse("").is_err());
        assert!(IntegerLiteral::parse("0x").is_err());
        assert!(IntegerLiteral::parse("-3u").is_err());
        assert!(IntegerLiteral::parse("3uu").is_err());
    }

    #[test]
    fn required_bit_counts() {
        assert_eq!(IntegerLiteral::unsigned(0).required_bit_count(), 1);
        assert_eq!(IntegerLiteral::signed(0).required_bit_count(), 1);
        assert_eq!(IntegerLiteral::unsigned(1).required_bit_count(), 1);
        assert_eq!(IntegerLiteral::unsigned(255).required_bit_count(), 8);
        assert_eq!(IntegerLiteral::unsigned(256).required_bit_count(), 9);
        assert_eq!(IntegerLiteral::unsigned(u64::MAX).required_bit_count(), 64);
        assert_eq!(IntegerLiteral::signed(5).required_bit_count(), 4);
        assert_eq!(IntegerLiteral::signed(127).required_bit_count(), 8);
        assert_eq!(IntegerLiteral::signed(128).required_bit_count(), 9);
        assert_eq!(IntegerLiteral::signed(-1).required_bit_count(), 1);
        assert_eq!(IntegerLiteral::signed(-128).required_bit_count(), 8);
        assert_eq!(IntegerLiteral::signed(-129).required_bit_count(), 9);
        assert_eq!(IntegerLiteral::signed(i64::MIN).required_bit_count(), 64);
        assert_eq!(IntegerLiteral::signed(i64::MAX).required_bit_count(), 64);
    }

    #[test]
    fn accessors_do_not_cast() {
        let s = IntegerLiteral::signed(3);
        assert_eq!(s.as_signed(), Ok(3));
        assert!(s.as_unsigned().is_err());
        let u = IntegerLiteral::unsigned(3);
        assert_eq!(u.as_unsigned(), Ok(3));
        assert!(u.as_signed().is_err());
    }

    #[test]
    fn narrowing_is_asymmetric_by_the_sign_bit() {
        assert_eq!(IntegerLiteral::unsigned(255).to_u8(), Ok(255));
        assert!(IntegerLiteral::unsigned(255).to_i8().is_err());
        assert_eq!(IntegerLiteral::unsigned(127).to_i8(), Ok(127));
        assert_eq!(IntegerLiteral::signed(127).to_i8(), Ok(127));
        assert_eq!(IntegerLiteral::signed(255).to_u8(), Ok(255));
        assert!(IntegerLiteral::signed(256).to_u8().is_err());
        assert_eq!(IntegerLiteral::signed(-128).to_i8(), Ok(-128));
        assert!(IntegerLiteral::signed(-129).to_i8().is_err());
        assert!(IntegerLiteral::signed(-1).to_u64().is_err());
        assert_eq!(IntegerLiteral::signed(-70000).to_i32(), Ok(-70000));
        assert!(IntegerLiteral::unsigned(70000).to_u16().is_err());
        assert_eq!(IntegerLiteral::unsigned(u64::MAX).to_u64(), Ok(u64::MAX));
        assert!(IntegerLiteral::unsigned(u64::MAX).to_i64().is_err());
    }

    #[test]
    fn conversions_adjust_bit_count() {
        let u = IntegerLiteral::unsigned(255);
        let s = u.to_signed(false).unwrap();
        assert_eq!(s.as_signed(), Ok(255));
        assert_eq!(s.required_bit_count(), 9);
        let back = s.to_unsigned(false).unwrap();
        assert_eq!(back.as_unsigned(), Ok(255));
        assert_eq!(back.required_bit_count(), 8);

        assert!(IntegerLiteral::unsigned(u64::MAX).to_signed(false).is_err());
        let forced = IntegerLiteral::unsigned(u64::MAX).to_signed(true).unwrap();
        assert_eq!(forced.as_signed(), Ok(-1));
        assert_eq!(forced.required_bit_count(), 64);

        assert!(IntegerLiteral::signed(-5).to_unsigned(false).is_err());
        let forced = IntegerLiteral::signed(-1).to_unsigned(true).unwrap();
        assert_eq!(forced.as_unsigned(), Ok(u64::MAX));
    }

    proptest! {
        #[test]
        fn parsed_bit_count_is_minimal(v in any::<u64>()) {
            let lit = IntegerLiteral::parse(&format!("{v}u")).unwrap();
            let bits = lit.required_bit_count();
            prop_assert!(bits <= 64);
            if bits < 64 {
                prop_assert!(v < (1_u64 << bits));
            }
            if bits > 1 {
                prop_assert!(v >= (1_u64 << (bits - 1)));
            }
            let hex = IntegerLiteral::parse(&format!("{v:#x}u")).unwrap();
            prop_assert_eq!(hex, lit);
            prop_assert_eq!(lit.to_string().parse::<u64>().unwrap(), v);
        }

        #[test]
        fn signed_bit_count_round_trips(v in any::<i64>()) {
            let lit = IntegerLiteral::parse(&v.to_string()).unwrap();
            prop_assert_eq!(lit.as_signed(), Ok(v));
            let bits = lit.required_bit_count();
            if bits < 64 {
                let shift = 64 - u32::from(bits);
                prop_assert_eq!((v << shift) >> shift, v);
            }
            if bits > 1 {
                let shift = 64 - u32::from(bits - 1);
                prop_assert_ne!((v << shift) >> shift, v);
            }
        }

        #[test]
        fn signed_unsigned_round_trip(v in any::<i64>()) {
            let lit = IntegerLiteral::signed(v);
            if lit.required_bit_count() < 64 {
                let force = v < 0;
                let back = lit
                    .to_unsigned(force)
                    .unwrap()
                    .to_signed(force)
                    .unwrap();
                prop_assert_eq!(back.as_signed(), Ok(v));
            }
        }
    }
}
