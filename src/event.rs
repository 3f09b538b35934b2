use crate::attrs::{AttrVal, EventAttrKey};
use crate::field::{FieldValue, IntegerField};
use crate::integer_literal::IntegerValue;
use crate::metadata::EventDescriptor;
use crate::packet::Packet;
use crate::timestamp::Timestamp;
use crate::types::{EventId, StreamId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// The stream-defined part of an event, available before its descriptor is known.
#[derive(Clone, PartialEq, Debug)]
pub struct EventHeader {
    /// Stream-absolute byte offset of the event
    pub offset: u64,
    pub header: FieldValue,
    pub stream_context: Option<FieldValue>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Event {
    /// Stream-absolute byte offset
    pub offset: u64,
    /// Byte offset within the owning packet
    pub packet_offset: u64,
    pub header: FieldValue,
    pub stream_context: Option<FieldValue>,
    pub context: Option<FieldValue>,
    pub payload: Option<FieldValue>,
    pub descriptor: Arc<EventDescriptor>,
    pub timestamp: Option<Timestamp>,
    /// Events the tracer lost right before this one
    pub discarded: u64,
    pub packet: Arc<Packet>,
}

impl Event {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn id(&self) -> EventId {
        self.descriptor.id
    }

    pub fn stream_id(&self) -> StreamId {
        self.descriptor.stream_id
    }

    /// A payload field by dotted path.
    pub fn field(&self, path: &str) -> Option<&FieldValue> {
        self.payload.as_ref().and_then(|p| p.path(path))
    }

    /// Flatten the event into attribute key/value pairs.
    pub fn attrs(&self, sequence_number: Option<u64>, cpu: Option<u32>) -> BTreeMap<EventAttrKey, AttrVal> {
        let mut attrs = BTreeMap::new();

        attrs.insert(EventAttrKey::Name, self.name().into());

        if let Some(ts) = &self.timestamp {
            match ts.ns() {
                Some(ns) => {
                    attrs.insert(EventAttrKey::Timestamp, AttrVal::Timestamp(ns));
                }
                None => warn!(
                    "Dropping Event ID {} timestamp because it's negative, consider adjusting the clock offset configuration",
                    self.id()
                ),
            }
            attrs.insert(EventAttrKey::ClockSnapshot, AttrVal::unsigned(ts.cycles()));
        }

        attrs.insert(EventAttrKey::StreamId, AttrVal::unsigned(self.stream_id().0));
        attrs.insert(EventAttrKey::Id, AttrVal::unsigned(self.id().0));
        if let Some(ll) = self.descriptor.log_level {
            attrs.insert(EventAttrKey::LogLevel, ll.into());
        }
        if let Some(seq) = sequence_number {
            attrs.insert(EventAttrKey::SequenceNumber, AttrVal::unsigned(seq));
        }
        if let Some(cpu) = cpu {
            attrs.insert(EventAttrKey::Cpu, i64::from(cpu).into());
        }
        if self.discarded != 0 {
            attrs.insert(EventAttrKey::EventsDiscarded, AttrVal::unsigned(self.discarded));
        }

        let scopes: [(Option<&FieldValue>, fn(String) -> EventAttrKey); 5] = [
            (Some(&self.header), EventAttrKey::Header),
            (self.stream_context.as_ref(), EventAttrKey::CommonContext),
            (self.context.as_ref(), EventAttrKey::SpecificContext),
            (Some(&self.packet.context), EventAttrKey::PacketContext),
            (self.payload.as_ref(), EventAttrKey::Field),
        ];
        for (field, to_key) in scopes {
            if let Some(f) = field {
                for (k, v) in field_to_attrs(f) {
                    attrs.insert(to_key(k), v);
                }
            }
        }

        attrs
    }
}

/// Yields a map of <'possibly.nested.key', AttrVal>
pub fn field_to_attrs(f: &FieldValue) -> BTreeMap<String, AttrVal> {
    FieldToAttrKeysGen::new().generate(f)
}

#[derive(Debug)]
struct FieldToAttrKeysGen {
    // A stack of attr key components built from the field names.
    // Invariant: none of the entries contain a '.' character, TSDL field names
    // are C identifiers
    attr_key_stack: Vec<String>,

    // Index used to name a root value that isn't a structure
    anonymous_fields: usize,

    root_struct_observed: bool,

    attrs: BTreeMap<String, AttrVal>,
}

impl FieldToAttrKeysGen {
    fn new() -> Self {
        Self {
            attr_key_stack: Vec::new(),
            anonymous_fields: 0,
            root_struct_observed: false,
            attrs: Default::default(),
        }
    }

    /// Destructure the contents of `root_field`
    /// into its representative set of attr keys and values
    fn generate(mut self, root_field: &FieldValue) -> BTreeMap<String, AttrVal> {
        self.generate_inner(None, root_field);
        self.attrs
    }

    fn generate_inner(&mut self, name: Option<&str>, field: &FieldValue) {
        match field {
            FieldValue::Struct(s) => {
                let nested = self.begin_nested_structure(name);
                for (n, f) in s.fields.iter() {
                    self.generate_inner(Some(n), f);
                }
                if nested {
                    self.end_nested_structure();
                }
            }
            // Variants are transparent, the selected member takes the variant's name
            FieldValue::Variant(v) => self.generate_inner(name, &v.value),
            FieldValue::Array(elems) => {
                if let Some(bytes) = byte_array(elems) {
                    let k = self.attr_key_for_field_name(name);
                    self.attrs.insert(k, hex::encode(bytes).into());
                    return;
                }
                self.push_component(name);
                for (i, e) in elems.iter().enumerate() {
                    let idx = i.to_string();
                    self.generate_inner(Some(&idx), e);
                }
                self.end_nested_structure();
            }
            FieldValue::Enum(e) => {
                let k = self.attr_key_for_field_name(name);
                // Enums get an extra `.label` attr
                if let Some(label) = &e.label {
                    self.attrs.insert(format!("{k}.label"), label.as_str().into());
                }
                self.attrs.insert(k, integer_to_val(&e.integer));
            }
            FieldValue::Integer(i) => {
                let k = self.attr_key_for_field_name(name);
                self.attrs.insert(k, integer_to_val(i));
            }
            FieldValue::Float(v) => {
                let k = self.attr_key_for_field_name(name);
                self.attrs.insert(k, (*v).into());
            }
            FieldValue::String(s) => {
                let k = self.attr_key_for_field_name(name);
                self.attrs.insert(k, s.as_str().into());
            }
        }
    }

    /// Get the fully qualified attr key for the given field name.
    ///
    /// The key is returned as a string so the caller may do additional things
    /// like join with `.label` in the case of enum fields.
    fn attr_key_for_field_name(&mut self, field_name: Option<&str>) -> String {
        let key_suffix = self.resolve_field_name(field_name);
        self.attr_key_stack
            .iter()
            .cloned()
            .chain(std::iter::once(key_suffix))
            .collect::<Vec<String>>()
            .join(".")
    }

    /// If the field name is none, generate the next anonymous field name,
    /// otherwise return the provided name.
    fn resolve_field_name(&mut self, field_name: Option<&str>) -> String {
        match field_name {
            Some(n) => n.to_owned(),
            None => {
                let n = format!("anonymous_{}", self.anonymous_fields);
                self.anonymous_fields += 1;
                n
            }
        }
    }

    /// Push down a new level of structure nesting. Returns false for the root structure,
    /// which is flattened out.
    fn begin_nested_structure(&mut self, field_name: Option<&str>) -> bool {
        if field_name.is_none() && !self.root_struct_observed {
            self.root_struct_observed = true;
            return false;
        }
        self.push_component(field_name);
        true
    }

    fn push_component(&mut self, field_name: Option<&str>) {
        let name = self.resolve_field_name(field_name);
        self.attr_key_stack.push(name);
    }

    /// Mark the end of the current level of structure nesting.
    fn end_nested_structure(&mut self) {
        let _ = self.attr_key_stack.pop();
    }
}

// Plain byte buffers (e.g. a uuid) are rendered as hex rather than one attr per byte
fn byte_array(elems: &[FieldValue]) -> Option<Vec<u8>> {
    if elems.is_empty() {
        return None;
    }
    elems
        .iter()
        .map(|e| match e {
            FieldValue::Integer(i) if i.size == 8 && !i.value.is_signed() => {
                i.as_u64().map(|v| v as u8)
            }
            _ => None,
        })
        .collect()
}

fn integer_to_val(i: &IntegerField) -> AttrVal {
    match i.value.value() {
        IntegerValue::Signed(v) => v.into(),
        IntegerValue::Unsigned(v) => AttrVal::unsigned(v),
    }
}
