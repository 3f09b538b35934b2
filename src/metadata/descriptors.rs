use crate::descriptor::{StructDescriptor, TypeDescriptor};
use crate::types::{ByteOrder, EventId, StreamId};
use std::sync::Arc;
use uuid::Uuid;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Assignments collected from one scope, in declaration order.
///
/// Properties the compiler does not interpret stay here untouched.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PropertyBag {
    pub values: Vec<(String, String)>,
    pub types: Vec<(String, TypeDescriptor)>,
}

impl PropertyBag {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn type_of(&self, key: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.types.is_empty()
    }

    /// Remove every assignment to `key`, returning the last one.
    pub(crate) fn take_value(&mut self, key: &str) -> Option<String> {
        let mut last = None;
        self.values.retain(|(k, v)| {
            if k == key {
                last = Some(v.clone());
                false
            } else {
                true
            }
        });
        last
    }

    pub(crate) fn take_type(&mut self, key: &str) -> Option<TypeDescriptor> {
        let idx = self.types.iter().rposition(|(k, _)| k == key)?;
        let (_, ty) = self.types.remove(idx);
        self.types.retain(|(k, _)| k != key);
        Some(ty)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TraceDescriptor {
    pub major: u64,
    pub minor: u64,
    /// Nil when the metadata declares none
    pub uuid: Uuid,
    /// Never `Native`
    pub byte_order: ByteOrder,
    pub packet_header: Option<StructDescriptor>,
    pub extra: PropertyBag,
}

impl TraceDescriptor {
    pub fn has_uuid(&self) -> bool {
        !self.uuid.is_nil()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EnvValue {
    Integer(i64),
    String(String),
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Environment {
    entries: Vec<(String, EnvValue)>,
}

impl Environment {
    pub(crate) fn insert(&mut self, key: String, value: EnvValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(EnvValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClockDescriptor {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub description: Option<String>,
    /// Cycles per second
    pub frequency: u64,
    pub precision: u64,
    pub offset_s: i64,
    /// Cycles, added to `offset_s`
    pub offset: i64,
    /// Origin is the Unix epoch, so nanoseconds from the origin are Unix time
    pub absolute: bool,
}

impl ClockDescriptor {
    pub const DEFAULT_FREQUENCY: u64 = 1_000_000_000;

    /// Total offset of the clock origin, in cycles.
    pub fn offset_cycles(&self) -> i128 {
        i128::from(self.offset_s) * i128::from(self.frequency) + i128::from(self.offset)
    }

    /// Convert a cycle count to nanoseconds since the clock origin, offset included.
    pub fn cycles_to_ns(&self, cycles: u64) -> i128 {
        let total = i128::from(cycles) + self.offset_cycles();
        let freq = i128::from(self.frequency.max(1));
        if freq == NANOS_PER_SEC {
            total
        } else {
            total * NANOS_PER_SEC / freq
        }
    }

    /// Shift the clock origin by a signed number of seconds and nanoseconds.
    pub fn adjust_offset(&mut self, seconds: i64, nanoseconds: i64) {
        self.offset_s = self.offset_s.saturating_add(seconds);
        let cycles = i128::from(nanoseconds) * i128::from(self.frequency) / NANOS_PER_SEC;
        self.offset = self
            .offset
            .saturating_add(i64::try_from(cycles).unwrap_or(if cycles < 0 { i64::MIN } else { i64::MAX }));
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StreamDescriptor {
    pub id: StreamId,
    pub packet_context: StructDescriptor,
    pub event_header: StructDescriptor,
    pub event_context: Option<StructDescriptor>,
    pub extra: PropertyBag,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EventDescriptor {
    pub id: EventId,
    pub stream_id: StreamId,
    pub name: String,
    pub log_level: Option<i64>,
    pub model_emf_uri: Option<String>,
    pub context: Option<TypeDescriptor>,
    pub payload: Option<TypeDescriptor>,
    pub extra: PropertyBag,
}

pub type ClockRef = Arc<ClockDescriptor>;
