use crate::bit_reader::BitReader;
use crate::error::{Error, UnsupportedValueError};
use crate::field::FieldValue;
use crate::types::ByteOrder;
use std::io::BufRead;

/// IEEE 754 binary32 or binary64. `mant_dig` counts the implicit leading bit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FloatDescriptor {
    pub exp_dig: u32,
    pub mant_dig: u32,
    pub byte_order: ByteOrder,
    pub alignment: u64,
}

impl FloatDescriptor {
    pub(crate) fn validate(&self) -> Result<(), UnsupportedValueError> {
        match (self.exp_dig, self.mant_dig) {
            (8, 24) | (11, 53) => Ok(()),
            (e, m) => Err(UnsupportedValueError::FloatSize {
                exp_dig: u64::from(e),
                mant_dig: u64::from(m),
            }),
        }
    }

    pub(crate) fn read<R: BufRead>(&self, reader: &mut BitReader<R>) -> Result<FieldValue, Error> {
        self.validate()?;
        reader.align(self.alignment)?;
        let bits = self.exp_dig + self.mant_dig;
        let raw = reader.read_unsigned(bits, self.byte_order)?;
        let value = if bits == 32 {
            f64::from(f32::from_bits(raw as u32))
        } else {
            f64::from_bits(raw)
        };
        Ok(FieldValue::Float(value))
    }
}
