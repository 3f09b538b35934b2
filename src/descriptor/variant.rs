use super::{ReadContext, StructField, TypeDescriptor};
use crate::bit_reader::BitReader;
use crate::error::{CorruptStreamError, Error};
use crate::field::{FieldValue, VariantField};
use std::io::BufRead;

/// Tagged union selected by a previously read enumeration field.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VariantDescriptor {
    /// Path to the enumeration field holding the discriminant. Named variants may leave
    /// this unset and have it supplied where they are used.
    pub tag: Option<String>,
    pub options: Vec<StructField>,
}

impl VariantDescriptor {
    /// Option whose name matches `label`. Leading underscores are not significant, as
    /// tracers prefix names that would otherwise clash with TSDL keywords.
    pub fn option(&self, label: &str) -> Option<&StructField> {
        self.options
            .iter()
            .find(|o| o.name == label)
            .or_else(|| {
                let bare = label.trim_start_matches('_');
                self.options
                    .iter()
                    .find(|o| o.name.trim_start_matches('_') == bare)
            })
    }

    pub(crate) fn read<R: BufRead>(
        &self,
        reader: &mut BitReader<R>,
        ctx: &mut ReadContext<'_>,
    ) -> Result<FieldValue, Error> {
        let tag_path = self.tag.as_deref().unwrap_or_default();
        let tag = ctx
            .lookup(tag_path)
            .ok_or_else(|| CorruptStreamError::FieldNotFound {
                offset: reader.byte_offset(),
                field: tag_path.to_owned(),
            })?;
        let label = match tag {
            FieldValue::Enum(e) => match &e.label {
                Some(l) => l.clone(),
                None => {
                    return Err(CorruptStreamError::UnknownVariantTag {
                        offset: reader.byte_offset(),
                        field: tag_path.to_owned(),
                        tag: e.integer.value.to_string(),
                    }
                    .into())
                }
            },
            _ => {
                return Err(CorruptStreamError::WrongFieldType {
                    offset: reader.byte_offset(),
                    field: tag_path.to_owned(),
                    expected: "an enumeration",
                }
                .into())
            }
        };

        let option = self
            .option(&label)
            .ok_or_else(|| CorruptStreamError::UnknownVariantTag {
                offset: reader.byte_offset(),
                field: tag_path.to_owned(),
                tag: label.clone(),
            })?;
        let value = option.ty.read(reader, ctx)?;
        Ok(FieldValue::Variant(VariantField {
            tag: option.name.clone(),
            value: Box::new(value),
        }))
    }
}

impl From<VariantDescriptor> for TypeDescriptor {
    fn from(v: VariantDescriptor) -> Self {
        TypeDescriptor::Variant(v)
    }
}
