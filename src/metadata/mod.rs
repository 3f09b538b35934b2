//! TSDL metadata: tokenizing, parsing and compiling into descriptors.
//!
//! Metadata is compiled once per trace, before any packet is read, and is immutable
//! afterwards. Stream and event descriptors are reference counted so decoded events can
//! point back at them without borrowing the whole [`Metadata`].

use crate::error::{Error, MetadataError};
use crate::types::{EventId, StreamId};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub use descriptors::{
    ClockDescriptor, ClockRef, EnvValue, Environment, EventDescriptor, PropertyBag,
    StreamDescriptor, TraceDescriptor,
};

pub mod ast;
mod compiler;
mod descriptors;
pub mod lexer;
pub mod packetized;
pub mod parser;
mod scope;

/// Adjustments applied while compiling, typically from configuration.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MetadataOptions {
    /// Added to every clock's `offset_s`
    pub clock_offset_s: i64,
    /// Added to every clock's offset, converted to cycles
    pub clock_offset_ns: i64,
    /// Treat every clock's origin as the Unix epoch.
    ///
    /// Only marks clocks as absolute; nanosecond values are unchanged and are then
    /// read as Unix time.
    pub force_clock_origin_unix_epoch: bool,
    /// Used when the metadata does not declare a trace UUID
    pub trace_uuid: Option<Uuid>,
}

#[derive(Clone, Debug)]
pub struct Metadata {
    pub trace: TraceDescriptor,
    pub environment: Environment,
    pub clocks: Vec<ClockRef>,
    pub streams: BTreeMap<StreamId, Arc<StreamDescriptor>>,
    events: BTreeMap<(StreamId, EventId), Arc<EventDescriptor>>,
    /// `callsite` scopes, kept uninterpreted
    pub callsites: Vec<PropertyBag>,
}

impl Metadata {
    pub fn stream(&self, id: StreamId) -> Option<&Arc<StreamDescriptor>> {
        self.streams.get(&id)
    }

    /// The stream a packet without a `stream_id` belongs to.
    pub fn single_stream(&self) -> Option<&Arc<StreamDescriptor>> {
        if self.streams.len() == 1 {
            self.streams.values().next()
        } else {
            None
        }
    }

    pub fn event(&self, stream: StreamId, id: EventId) -> Option<&Arc<EventDescriptor>> {
        self.events.get(&(stream, id))
    }

    pub fn events(&self) -> impl Iterator<Item = &Arc<EventDescriptor>> {
        self.events.values()
    }

    pub fn stream_events(&self, stream: StreamId) -> impl Iterator<Item = &Arc<EventDescriptor>> {
        self.events
            .range((stream, EventId(0))..=(stream, EventId(u64::MAX)))
            .map(|(_, e)| e)
    }

    pub fn clock(&self, name: &str) -> Option<&ClockRef> {
        self.clocks.iter().find(|c| c.name == name)
    }

    /// The clock integers without a `map` attribute refer to, when there is only one.
    pub fn default_clock(&self) -> Option<&ClockRef> {
        if self.clocks.len() == 1 {
            self.clocks.first()
        } else {
            None
        }
    }

    /// Value of the `tracer_name` environment entry.
    pub fn tracer_name(&self) -> Option<&str> {
        self.environment.get_str("tracer_name")
    }
}

/// Reads plain-text or packetized metadata and compiles it.
#[derive(Clone, Debug, Default)]
pub struct MetadataParser {
    options: MetadataOptions,
}

impl MetadataParser {
    pub fn new(options: MetadataOptions) -> Self {
        MetadataParser { options }
    }

    pub fn options(&self) -> &MetadataOptions {
        &self.options
    }

    pub fn parse_text(&self, text: &str) -> Result<Metadata, Error> {
        let decls = parser::parse(text)?;
        compiler::compile(&decls, &self.options)
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Metadata, Error> {
        if packetized::detect(bytes).is_none() {
            let text = std::str::from_utf8(bytes).map_err(|_| MetadataError::NotUtf8)?;
            return self.parse_text(text);
        }

        let (text, packet_uuid) = packetized::decode(bytes)?;
        debug!(uuid = %packet_uuid, len = text.len(), "Decoded packetized metadata");
        let mut metadata = self.parse_text(&text)?;
        if !packet_uuid.is_nil() {
            if !metadata.trace.has_uuid() {
                metadata.trace.uuid = packet_uuid;
            } else if metadata.trace.uuid != packet_uuid {
                return Err(MetadataError::InvalidPacket {
                    offset: 0,
                    reason: format!(
                        "packet UUID {packet_uuid} does not match the trace UUID {}",
                        metadata.trace.uuid
                    ),
                }
                .into());
            }
        }
        Ok(metadata)
    }

    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<Metadata, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.parse_bytes(&bytes)
    }
}
