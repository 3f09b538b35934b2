use super::string::decode_text;
use super::{ReadContext, TypeDescriptor};
use crate::bit_reader::BitReader;
use crate::error::{CorruptStreamError, Error};
use crate::field::FieldValue;
use std::io::BufRead;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ArrayLength {
    Fixed(u64),
    /// Path to a previously read unsigned integer (a CTF sequence)
    Field(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ArrayDescriptor {
    pub element: Box<TypeDescriptor>,
    pub length: ArrayLength,
}

impl ArrayDescriptor {
    pub(crate) fn read<R: BufRead>(
        &self,
        reader: &mut BitReader<R>,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldValue, Error> {
        let length = match &self.length {
            ArrayLength::Fixed(n) => *n,
            ArrayLength::Field(path) => ctx.lookup_u64(path, reader)?,
        };

        // Every element but an empty structure takes at least one bit
        let zero_sized = matches!(&*self.element, TypeDescriptor::Struct(s) if s.fields.is_empty());
        if let Some(remaining) = reader.remaining_content_bits() {
            if !zero_sized && length > remaining {
                return Err(CorruptStreamError::ArrayTooLong {
                    offset: reader.byte_offset(),
                    field: match &self.length {
                        ArrayLength::Field(p) => p.clone(),
                        ArrayLength::Fixed(_) => String::from("<fixed>"),
                    },
                    length,
                }
                .into());
            }
        }

        reader.align(self.element.alignment())?;

        if let TypeDescriptor::Integer(int) = &*self.element {
            if int.is_character() {
                let offset = reader.byte_offset();
                let mut bytes = Vec::with_capacity(length.min(4096) as usize);
                for _ in 0..length {
                    bytes.push(int.read(reader)?.value.as_i128() as u8);
                }
                if let Some(nul) = bytes.iter().position(|b| *b == 0) {
                    bytes.truncate(nul);
                }
                return decode_text(bytes, int.encoding, offset).map(FieldValue::String);
            }
        }

        let mut elements = Vec::with_capacity(length.min(4096) as usize);
        for _ in 0..length {
            elements.push(self.element.read(reader, ctx)?);
        }
        Ok(FieldValue::Array(elements))
    }
}
