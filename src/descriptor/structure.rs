use super::{ReadContext, TypeDescriptor};
use crate::bit_reader::BitReader;
use crate::error::Error;
use crate::field::{FieldValue, StructValue};
use std::io::BufRead;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructField {
    pub name: String,
    pub ty: TypeDescriptor,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        StructField {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructDescriptor {
    pub fields: Vec<StructField>,
    /// Minimum alignment from an `align(N)` attribute
    pub min_alignment: u64,
}

impl StructDescriptor {
    pub fn new(fields: Vec<StructField>, min_alignment: u64) -> Self {
        StructDescriptor {
            fields,
            min_alignment,
        }
    }

    pub fn alignment(&self) -> u64 {
        self.fields
            .iter()
            .map(|f| f.ty.alignment())
            .fold(self.min_alignment.max(1), u64::max)
    }

    pub fn field(&self, name: &str) -> Option<&TypeDescriptor> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }

    pub(crate) fn read<R: BufRead>(
        &self,
        reader: &mut BitReader<R>,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldValue, Error> {
        reader.align(self.alignment())?;
        ctx.push_struct();
        let result = self.read_fields(reader, ctx);
        let fields = ctx.pop_struct();
        result.map(|()| FieldValue::Struct(StructValue { fields }))
    }

    fn read_fields<R: BufRead>(
        &self,
        reader: &mut BitReader<R>,
        ctx: &mut ReadContext<'_>,
    ) -> Result<(), Error> {
        for f in self.fields.iter() {
            ctx.begin_field(&f.name);
            let value = f.ty.read(reader, ctx)?;
            ctx.push_field(&f.name, value);
        }
        Ok(())
    }
}
