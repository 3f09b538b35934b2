//! Decoded values, shaped like the descriptor that produced them.

use crate::integer_literal::{IntegerLiteral, IntegerValue};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, PartialEq, Debug)]
pub enum FieldValue {
    Integer(IntegerField),
    Enum(EnumField),
    Float(f64),
    String(String),
    Struct(StructValue),
    Array(Vec<FieldValue>),
    Variant(VariantField),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IntegerField {
    pub value: IntegerLiteral,
    /// Declared width in bits
    pub size: u32,
    /// Name of the clock this integer samples, from the `map` attribute
    pub mapped_clock: Option<Arc<str>>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumField {
    pub integer: IntegerField,
    /// `None` when the value falls outside every declared range
    pub label: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct StructValue {
    pub fields: Vec<(String, FieldValue)>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct VariantField {
    pub tag: String,
    pub value: Box<FieldValue>,
}

impl IntegerField {
    /// The value as `u64`, if it is unsigned or non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self.value.value() {
            IntegerValue::Unsigned(v) => Some(v),
            IntegerValue::Signed(v) => u64::try_from(v).ok(),
        }
    }
}

impl StructValue {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "an integer",
            FieldValue::Enum(_) => "an enumeration",
            FieldValue::Float(_) => "a floating point number",
            FieldValue::String(_) => "a string",
            FieldValue::Struct(_) => "a structure",
            FieldValue::Array(_) => "an array",
            FieldValue::Variant(_) => "a variant",
        }
    }

    /// Look up a direct child by name.
    ///
    /// Variants are transparent: the lookup continues in the selected member, and the
    /// member's own name also resolves to it.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Struct(s) => s.get(name),
            FieldValue::Variant(v) if v.tag == name => Some(&v.value),
            FieldValue::Variant(v) => v.value.get(name),
            _ => None,
        }
    }

    /// Look up a dotted path such as `v.extended.timestamp`.
    pub fn path(&self, path: &str) -> Option<&FieldValue> {
        path.split('.')
            .filter(|c| !c.is_empty())
            .try_fold(self, |v, component| v.get(component))
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            FieldValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Integers and enumerations both expose their integer.
    pub fn as_integer(&self) -> Option<&IntegerField> {
        match self {
            FieldValue::Integer(i) => Some(i),
            FieldValue::Enum(e) => Some(&e.integer),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(IntegerField::as_u64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn enum_label(&self) -> Option<&str> {
        match self {
            FieldValue::Enum(e) => e.label.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i.value),
            FieldValue::Enum(e) => match &e.label {
                Some(l) => write!(f, "{} ({l})", e.integer.value),
                None => write!(f, "{}", e.integer.value),
            },
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::String(s) => write!(f, "{s:?}"),
            FieldValue::Struct(s) => {
                f.write_str("{ ")?;
                for (i, (n, v)) in s.fields.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{n} = {v}")?;
                }
                f.write_str(" }")
            }
            FieldValue::Array(elems) => {
                f.write_str("[")?;
                for (i, v) in elems.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            FieldValue::Variant(v) => write!(f, "{}: {}", v.tag, v.value),
        }
    }
}

#[cfg(test)]
pub(crate) fn uint(v: u64, size: u32) -> FieldValue {
    FieldValue::Integer(IntegerField {
        value: IntegerLiteral::unsigned(v),
        size,
        mapped_clock: None,
    })
}
