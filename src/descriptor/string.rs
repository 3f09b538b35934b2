use crate::bit_reader::BitReader;
use crate::error::{CorruptStreamError, Error};
use crate::field::FieldValue;
use crate::types::{ByteOrder, Encoding};
use std::io::BufRead;

/// NUL-terminated string.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StringDescriptor {
    pub encoding: Encoding,
}

impl Default for StringDescriptor {
    fn default() -> Self {
        StringDescriptor {
            encoding: Encoding::Utf8,
        }
    }
}

impl StringDescriptor {
    pub(crate) fn read<R: BufRead>(&self, reader: &mut BitReader<R>) -> Result<FieldValue, Error> {
        reader.align(8)?;
        let offset = reader.byte_offset();
        let mut bytes = Vec::new();
        loop {
            let b = reader.read_unsigned(8, ByteOrder::LittleEndian)? as u8;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        decode_text(bytes, self.encoding, offset).map(FieldValue::String)
    }
}

/// Decode string bytes according to their declared encoding.
pub(crate) fn decode_text(bytes: Vec<u8>, encoding: Encoding, offset: u64) -> Result<String, Error> {
    match encoding {
        Encoding::Ascii if !bytes.is_ascii() => {
            Err(CorruptStreamError::InvalidString { offset }.into())
        }
        _ => String::from_utf8(bytes)
            .map_err(|_| CorruptStreamError::InvalidString { offset }.into()),
    }
}
