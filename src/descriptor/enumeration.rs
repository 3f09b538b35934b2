use super::IntegerDescriptor;
use crate::bit_reader::BitReader;
use crate::error::Error;
use crate::field::{EnumField, FieldValue};
use crate::integer_literal::IntegerLiteral;
use std::io::BufRead;
use tracing::debug;

/// Inclusive value range.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EnumRange {
    pub start: IntegerLiteral,
    pub end: IntegerLiteral,
}

impl EnumRange {
    pub fn single(v: IntegerLiteral) -> Self {
        EnumRange { start: v, end: v }
    }

    pub fn contains(&self, v: &IntegerLiteral) -> bool {
        let v = v.as_i128();
        self.start.as_i128() <= v && v <= self.end.as_i128()
    }
}

/// A label and every range mapped to it. Ranges under one label may be disjoint.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumMapping {
    pub label: String,
    pub ranges: Vec<EnumRange>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumDescriptor {
    pub container: IntegerDescriptor,
    /// In declaration order
    pub mappings: Vec<EnumMapping>,
}

impl EnumDescriptor {
    /// First label, in declaration order, with a range containing `v`.
    pub fn label_for(&self, v: &IntegerLiteral) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.ranges.iter().any(|r| r.contains(v)))
            .map(|m| m.label.as_str())
    }

    pub fn mapping(&self, label: &str) -> Option<&EnumMapping> {
        self.mappings.iter().find(|m| m.label == label)
    }

    pub(crate) fn read<R: BufRead>(&self, reader: &mut BitReader<R>) -> Result<FieldValue, Error> {
        let integer = self.container.read(reader)?;
        let label = self.label_for(&integer.value).map(str::to_owned);
        if label.is_none() {
            debug!(
                value = %integer.value,
                offset = reader.byte_offset(),
                "Enumeration value has no label mapping"
            );
        }
        Ok(FieldValue::Enum(EnumField { integer, label }))
    }
}
