//! Type descriptors compiled from TSDL, and the protocol for reading one instance of a
//! type from a [`BitReader`].
//!
//! The set of kinds is closed. Each kind lives in its own module and [`TypeDescriptor::read`]
//! dispatches on the variant.

use crate::bit_reader::BitReader;
use crate::error::{CorruptStreamError, Error};
use crate::field::FieldValue;
use derive_more::Display;
use std::io::BufRead;

pub use array::{ArrayDescriptor, ArrayLength};
pub use enumeration::{EnumDescriptor, EnumMapping, EnumRange};
pub use float::FloatDescriptor;
pub use integer::IntegerDescriptor;
pub use string::StringDescriptor;
pub use structure::{StructDescriptor, StructField};
pub use variant::VariantDescriptor;

mod array;
mod enumeration;
mod float;
mod integer;
mod string;
mod structure;
mod variant;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum CtfTypeKind {
    #[display(fmt = "integer")]
    Integer,
    #[display(fmt = "floating_point")]
    Float,
    #[display(fmt = "string")]
    String,
    #[display(fmt = "struct")]
    Struct,
    #[display(fmt = "enum")]
    Enum,
    #[display(fmt = "variant")]
    Variant,
    #[display(fmt = "array")]
    Array,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TypeDescriptor {
    Integer(IntegerDescriptor),
    Float(FloatDescriptor),
    String(StringDescriptor),
    Struct(StructDescriptor),
    Enum(EnumDescriptor),
    Variant(VariantDescriptor),
    Array(ArrayDescriptor),
}

impl TypeDescriptor {
    pub fn kind(&self) -> CtfTypeKind {
        match self {
            TypeDescriptor::Integer(_) => CtfTypeKind::Integer,
            TypeDescriptor::Float(_) => CtfTypeKind::Float,
            TypeDescriptor::String(_) => CtfTypeKind::String,
            TypeDescriptor::Struct(_) => CtfTypeKind::Struct,
            TypeDescriptor::Enum(_) => CtfTypeKind::Enum,
            TypeDescriptor::Variant(_) => CtfTypeKind::Variant,
            TypeDescriptor::Array(_) => CtfTypeKind::Array,
        }
    }

    /// Required alignment in bits.
    pub fn alignment(&self) -> u64 {
        match self {
            TypeDescriptor::Integer(d) => d.alignment,
            TypeDescriptor::Float(d) => d.alignment,
            TypeDescriptor::String(_) => 8,
            TypeDescriptor::Struct(d) => d.alignment(),
            TypeDescriptor::Enum(d) => d.container.alignment,
            // The selected member aligns itself
            TypeDescriptor::Variant(_) => 1,
            TypeDescriptor::Array(d) => d.element.alignment(),
        }
    }

    /// Declared size in bits, when it does not depend on the data.
    pub fn size(&self) -> Option<u64> {
        match self {
            TypeDescriptor::Integer(d) => Some(u64::from(d.size)),
            TypeDescriptor::Float(d) => Some(u64::from(d.exp_dig + d.mant_dig)),
            TypeDescriptor::Enum(d) => Some(u64::from(d.container.size)),
            TypeDescriptor::Array(d) => match (&d.length, d.element.size()) {
                (ArrayLength::Fixed(n), Some(s)) if d.element.alignment() <= s => Some(n * s),
                _ => None,
            },
            TypeDescriptor::Struct(_) | TypeDescriptor::String(_) | TypeDescriptor::Variant(_) => {
                None
            }
        }
    }

    pub fn as_struct(&self) -> Option<&StructDescriptor> {
        match self {
            TypeDescriptor::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn read<R: BufRead>(
        &self,
        reader: &mut BitReader<R>,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldValue, Error> {
        match self {
            TypeDescriptor::Integer(d) => d.read(reader).map(FieldValue::Integer),
            TypeDescriptor::Float(d) => d.read(reader),
            TypeDescriptor::String(d) => d.read(reader),
            TypeDescriptor::Struct(d) => d.read(reader, ctx),
            TypeDescriptor::Enum(d) => d.read(reader),
            TypeDescriptor::Variant(d) => d.read(reader, ctx),
            TypeDescriptor::Array(d) => d.read(reader, ctx),
        }
    }
}

/// The CTF dynamic scopes a field path may be rooted at.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum Scope {
    #[display(fmt = "trace.packet.header")]
    PacketHeader,
    #[display(fmt = "stream.packet.context")]
    PacketContext,
    #[display(fmt = "stream.event.header")]
    EventHeader,
    #[display(fmt = "stream.event.context")]
    EventStreamContext,
    #[display(fmt = "event.context")]
    EventContext,
    #[display(fmt = "event.fields")]
    EventFields,
}

impl Scope {
    const ALL: [Scope; 6] = [
        Scope::PacketHeader,
        Scope::PacketContext,
        Scope::EventHeader,
        Scope::EventStreamContext,
        Scope::EventContext,
        Scope::EventFields,
    ];

    /// Split an absolute path into its scope and the path within that scope.
    fn split(path: &str) -> Option<(Scope, &str)> {
        Scope::ALL.iter().find_map(|s| {
            let prefix = s.to_string();
            path.strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| (*s, rest))
        })
    }
}

/// State threaded through a read so fields can refer to previously read fields.
///
/// Holds the already-decoded roots of earlier scopes, plus a stack of the structures
/// being decoded in the current scope (innermost last).
pub struct ReadContext<'a> {
    current: Scope,
    roots: &'a [(Scope, &'a FieldValue)],
    stack: Vec<Frame>,
}

#[derive(Default)]
struct Frame {
    fields: Vec<(String, FieldValue)>,
    /// Field of this structure whose value is still being decoded
    reading: Option<String>,
}

impl<'a> ReadContext<'a> {
    pub fn new(current: Scope, roots: &'a [(Scope, &'a FieldValue)]) -> Self {
        ReadContext {
            current,
            roots,
            stack: Vec::new(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.current
    }

    fn push_struct(&mut self) {
        self.stack.push(Frame::default());
    }

    fn begin_field(&mut self, name: &str) {
        if let Some(f) = self.stack.last_mut() {
            f.reading = Some(name.to_owned());
        }
    }

    fn push_field(&mut self, name: &str, value: FieldValue) {
        if let Some(f) = self.stack.last_mut() {
            f.reading = None;
            f.fields.push((name.to_owned(), value));
        }
    }

    fn pop_struct(&mut self) -> Vec<(String, FieldValue)> {
        self.stack.pop().map(|f| f.fields).unwrap_or_default()
    }

    /// Resolve a field reference, either relative (searching enclosing structures from the
    /// innermost outward) or absolute (rooted at a dynamic scope).
    ///
    /// Absolute references into the scope being decoded may name fields of structures
    /// that are still in progress.
    pub fn lookup(&self, path: &str) -> Option<&FieldValue> {
        if let Some((scope, rest)) = Scope::split(path) {
            if scope == self.current {
                return lookup_in_frames(&self.stack, rest);
            }
            let (_, root) = self.roots.iter().find(|(s, _)| *s == scope)?;
            return root.path(rest);
        }
        self.stack
            .iter()
            .rev()
            .find_map(|f| lookup_in_fields(&f.fields, path))
    }

    pub(crate) fn lookup_u64<R: BufRead>(
        &self,
        path: &str,
        reader: &BitReader<R>,
    ) -> Result<u64, Error> {
        let field = self
            .lookup(path)
            .ok_or_else(|| CorruptStreamError::FieldNotFound {
                offset: reader.byte_offset(),
                field: path.to_owned(),
            })?;
        field.as_u64().ok_or_else(|| {
            CorruptStreamError::WrongFieldType {
                offset: reader.byte_offset(),
                field: path.to_owned(),
                expected: "an unsigned integer",
            }
            .into()
        })
    }
}

fn lookup_in_frames<'f>(frames: &'f [Frame], path: &str) -> Option<&'f FieldValue> {
    let (frame, inner) = frames.split_first()?;
    if let Some(v) = lookup_in_fields(&frame.fields, path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    if frame.reading.as_deref() == Some(head) {
        return lookup_in_frames(inner, rest);
    }
    None
}

fn lookup_in_fields<'f>(fields: &'f [(String, FieldValue)], path: &str) -> Option<&'f FieldValue> {
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };
    let (_, value) = fields.iter().rev().find(|(n, _)| n == head)?;
    match rest {
        Some(r) => value.path(r),
        None => Some(value),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::types::{ByteOrder, Encoding};

    pub fn int(size: u32, signed: bool) -> TypeDescriptor {
        TypeDescriptor::Integer(IntegerDescriptor {
            size,
            alignment: if size % 8 == 0 { 8 } else { 1 },
            signed,
            byte_order: ByteOrder::LittleEndian,
            encoding: Encoding::None,
            base: 10,
            mapped_clock: None,
        })
    }

    pub fn structure(fields: Vec<(&str, TypeDescriptor)>) -> TypeDescriptor {
        TypeDescriptor::Struct(StructDescriptor::new(
            fields
                .into_iter()
                .map(|(n, t)| StructField::new(n, t))
                .collect(),
            1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::bit_reader::test_util::BitWriter;
    use crate::field::uint;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn struct_fields_keep_declared_order() {
        let desc = structure(vec![
            ("a", int(8, false)),
            ("b", int(16, false)),
            ("c", int(8, false)),
        ]);
        for (a, b, c) in [(1, 2, 3), (255, 0, 0), (0, 65535, 7)] {
            let bytes = BitWriter::new().le(a, 8).le(b, 16).le(c, 8).finish();
            let mut r = BitReader::new(Cursor::new(bytes));
            let mut ctx = ReadContext::new(Scope::EventFields, &[]);
            let v = desc.read(&mut r, &mut ctx).unwrap();
            let s = v.as_struct().unwrap();
            assert_eq!(s.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
            assert_eq!(s.get("a"), Some(&uint(a, 8)));
            assert_eq!(s.get("b"), Some(&uint(b, 16)));
            assert_eq!(s.get("c"), Some(&uint(c, 8)));
        }
    }

    #[test]
    fn absolute_and_relative_lookups() {
        let header = FieldValue::Struct(crate::field::StructValue {
            fields: vec![("id".to_owned(), uint(4, 8))],
        });
        let roots = [(Scope::EventHeader, &header)];
        let mut ctx = ReadContext::new(Scope::EventFields, &roots);
        ctx.push_struct();
        ctx.push_field("len", uint(2, 8));
        ctx.push_struct();
        ctx.push_field("inner", uint(9, 8));

        assert_eq!(ctx.lookup("inner"), Some(&uint(9, 8)));
        assert_eq!(ctx.lookup("len"), Some(&uint(2, 8)));
        assert_eq!(ctx.lookup("event.fields.len"), Some(&uint(2, 8)));
        assert_eq!(ctx.lookup("stream.event.header.id"), Some(&uint(4, 8)));
        assert_eq!(ctx.lookup("event.fields.inner"), None);
        assert_eq!(ctx.lookup("stream.packet.context.id"), None);
    }

    #[test]
    fn absolute_lookup_into_struct_being_read() {
        let roots = [];
        let mut ctx = ReadContext::new(Scope::EventFields, &roots);
        ctx.push_struct();
        ctx.push_field("len", uint(2, 8));
        ctx.begin_field("inner");
        ctx.push_struct();
        ctx.push_field("count", uint(3, 8));

        assert_eq!(ctx.lookup("event.fields.inner.count"), Some(&uint(3, 8)));
        assert_eq!(ctx.lookup("event.fields.len"), Some(&uint(2, 8)));
        assert_eq!(ctx.lookup("event.fields.other.count"), None);

        let inner = ctx.pop_struct();
        ctx.push_field("inner", FieldValue::Struct(crate::field::StructValue { fields: inner }));
        assert_eq!(ctx.lookup("event.fields.inner.count"), Some(&uint(3, 8)));
    }

    #[test]
    fn sequence_sized_by_absolute_path_into_enclosing_struct() {
        let desc = structure(vec![(
            "inner",
            structure(vec![
                ("len", int(8, false)),
                (
                    "data",
                    TypeDescriptor::Array(ArrayDescriptor {
                        element: Box::new(int(8, false)),
                        length: ArrayLength::Field("event.fields.inner.len".to_owned()),
                    }),
                ),
            ]),
        )]);
        let mut r = BitReader::new(Cursor::new(vec![0x02, 0x07, 0x09]));
        let mut ctx = ReadContext::new(Scope::EventFields, &[]);
        let v = desc.read(&mut r, &mut ctx).unwrap();
        assert_eq!(v.path("inner.len"), Some(&uint(2, 8)));
        assert_eq!(
            v.path("inner.data"),
            Some(&FieldValue::Array(vec![uint(7, 8), uint(9, 8)]))
        );
    }

    #[test]
    fn static_properties() {
        assert_eq!(int(27, false).alignment(), 1);
        assert_eq!(int(32, false).alignment(), 8);
        assert_eq!(int(32, false).size(), Some(32));
        assert_eq!(int(32, false).kind(), CtfTypeKind::Integer);
        assert_eq!(structure(vec![("a", int(32, false))]).alignment(), 8);
        assert_eq!(structure(vec![]).size(), None);
    }
}
