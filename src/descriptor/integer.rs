use crate::bit_reader::BitReader;
use crate::error::Error;
use crate::field::IntegerField;
use crate::integer_literal::IntegerLiteral;
use crate::types::{ByteOrder, Encoding};
use std::io::BufRead;
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IntegerDescriptor {
    /// Width in bits, 1..=64
    pub size: u32,
    /// Alignment in bits
    pub alignment: u64,
    pub signed: bool,
    /// Never `Native` once the metadata is compiled
    pub byte_order: ByteOrder,
    pub encoding: Encoding,
    /// Display base hint (2, 8, 10 or 16)
    pub base: u8,
    /// Clock name from `map = clock.<name>.value`
    pub mapped_clock: Option<Arc<str>>,
}

impl IntegerDescriptor {
    pub(crate) fn read<R: BufRead>(&self, reader: &mut BitReader<R>) -> Result<IntegerField, Error> {
        reader.align(self.alignment)?;
        let value = if self.signed {
            IntegerLiteral::signed(reader.read_signed(self.size, self.byte_order)?)
        } else {
            IntegerLiteral::unsigned(reader.read_unsigned(self.size, self.byte_order)?)
        };
        Ok(IntegerField {
            value,
            size: self.size,
            mapped_clock: self.mapped_clock.clone(),
        })
    }

    /// Byte-sized integers carrying a text encoding are characters.
    pub fn is_character(&self) -> bool {
        self.size == 8 && self.encoding != Encoding::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_reader::test_util::BitWriter;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn desc(size: u32, signed: bool, byte_order: ByteOrder, alignment: u64) -> IntegerDescriptor {
        IntegerDescriptor {
            size,
            alignment,
            signed,
            byte_order,
            encoding: Encoding::None,
            base: 10,
            mapped_clock: Some(Arc::from("monotonic")),
        }
    }

    #[test]
    fn aligns_then_reads() {
        let bytes = BitWriter::new()
            .le(1, 3)
            .align(16)
            .be(0xBEEF, 16)
            .le(0b1101, 4)
            .finish();
        let mut r = BitReader::new(Cursor::new(bytes));
        let three = desc(3, false, ByteOrder::LittleEndian, 1);
        assert_eq!(three.read(&mut r).unwrap().value, IntegerLiteral::unsigned(1));
        let f = desc(16, false, ByteOrder::BigEndian, 16).read(&mut r).unwrap();
        assert_eq!(f.value, IntegerLiteral::unsigned(0xBEEF));
        assert_eq!(f.size, 16);
        assert_eq!(f.mapped_clock.as_deref(), Some("monotonic"));
        let s = desc(4, true, ByteOrder::LittleEndian, 1).read(&mut r).unwrap();
        assert_eq!(s.value, IntegerLiteral::signed(-3));
    }
}
