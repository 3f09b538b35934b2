//! Tracer-specific conventions the format-agnostic decoder defers to.
//!
//! CTF leaves several things to the producer: where the event id lives in the event
//! header, which packet-context fields carry sizes and time bounds, and how per-stream
//! context such as the CPU is derived. A [`Customization`] answers those questions for
//! one family of tracers and dispatches every decoded event to registered callbacks.

use crate::descriptor::Scope;
use crate::error::{CorruptStreamError, Error};
use crate::event::{Event, EventHeader};
use crate::field::FieldValue;
use crate::input::{StreamSource, TraceInput};
use crate::metadata::{EventDescriptor, Metadata, MetadataOptions, MetadataParser};
use crate::packet::Packet;
use crate::timestamp::{reconstruct, Timestamp};
use crate::types::EventId;
use derive_more::Display;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub use lttng::LttngCustomization;
pub use perf::PerfCustomization;

pub mod lttng;
pub mod perf;

/// Everything a callback gets to see about one event.
#[derive(Copy, Clone, Debug)]
pub struct DecodedEvent<'a> {
    /// Position of the event in playback order, starting at 0
    pub sequence_number: u64,
    pub cpu: Option<u32>,
    pub event: &'a Event,
    pub packet: &'a Packet,
    pub input: &'a TraceInput,
    pub stream: &'a StreamSource,
}

pub type EventCallback = Box<dyn FnMut(&DecodedEvent<'_>) -> Result<(), Error> + Send>;

/// Registered event callbacks, invoked in registration order.
#[derive(Default)]
pub struct EventCallbacks {
    callbacks: Mutex<Vec<EventCallback>>,
}

impl EventCallbacks {
    pub fn register<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnMut(&DecodedEvent<'_>) -> Result<(), Error> + Send + 'static,
    {
        self.lock()?.push(Box::new(f));
        Ok(())
    }

    /// Invoke every callback with `event`, stopping at the first error.
    ///
    /// The registry is not locked while callbacks run, so a callback may register
    /// further callbacks; those first see the next event.
    pub fn dispatch(&self, event: &DecodedEvent<'_>) -> Result<(), Error> {
        let mut callbacks = std::mem::take(&mut *self.lock()?);
        let result = callbacks.iter_mut().try_for_each(|cb| cb(event));
        let mut registry = self.lock()?;
        callbacks.append(&mut registry);
        *registry = callbacks;
        result
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<EventCallback>>, Error> {
        self.callbacks
            .lock()
            .map_err(|_| Error::Callback("callback registry lock poisoned".to_owned()))
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCallbacks")
            .field("len", &self.len())
            .finish()
    }
}

/// Stream to CPU index mapping, filled as packets are seen.
#[derive(Debug, Default)]
pub struct CpuCache {
    cpus: Mutex<HashMap<(String, usize), u32>>,
}

impl CpuCache {
    /// The cached CPU of `stream`, computing it with `derive` on a miss.
    pub fn get_or_insert_with<F>(&self, input: &TraceInput, stream: &StreamSource, derive: F) -> Option<u32>
    where
        F: FnOnce() -> Option<u32>,
    {
        let key = (input.name.clone(), stream.index);
        let mut cpus = self.cpus.lock().ok()?;
        if let Some(cpu) = cpus.get(&key) {
            return Some(*cpu);
        }
        let cpu = derive()?;
        debug!(stream = %stream.name, cpu, "Mapped stream to CPU");
        cpus.insert(key, cpu);
        Some(cpu)
    }
}

/// Tracer-specific decoding decisions.
///
/// Implementations are shared between the streams of a trace, so any bookkeeping they
/// keep must be synchronized.
pub trait Customization: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_metadata_parser(&self, input: &TraceInput) -> MetadataParser;

    /// Resolve the descriptor of the event whose header was just read.
    fn get_event_descriptor(
        &self,
        metadata: &Metadata,
        packet: &Packet,
        event: &EventHeader,
    ) -> Result<Arc<EventDescriptor>, Error>;

    /// Total bits of the packet, padding included. `None` runs to the end of the stream.
    fn bits_in_packet(&self, packet: &Packet) -> Result<Option<u64>, Error> {
        packet.context_u64("packet_size")
    }

    /// Bits holding header, context and events.
    fn packet_content_bit_count(&self, packet: &Packet) -> Result<Option<u64>, Error> {
        match packet.context_u64("content_size")? {
            Some(bits) => Ok(Some(bits)),
            None => self.bits_in_packet(packet),
        }
    }

    fn timestamps_from_packet_context(
        &self,
        metadata: &Metadata,
        packet: &Packet,
    ) -> Result<Option<(Timestamp, Timestamp)>, Error> {
        let begin = packet.context_field("timestamp_begin");
        let end = packet.context_field("timestamp_end");
        match (begin, end) {
            (Some(b), Some(e)) => {
                let field = |name: &str, f: &FieldValue| {
                    clock_timestamp(metadata, f, None).ok_or_else(|| {
                        Error::from(CorruptStreamError::WrongFieldType {
                            offset: packet.offset,
                            field: format!("{}.{name}", Scope::PacketContext),
                            expected: "an unsigned integer",
                        })
                    })
                };
                Ok(Some((field("timestamp_begin", b)?, field("timestamp_end", e)?)))
            }
            _ => Ok(None),
        }
    }

    /// Full timestamp of an event, reconstructed against the previous one of its stream.
    fn timestamp_from_event_header(
        &self,
        metadata: &Metadata,
        event: &EventHeader,
        previous: Option<&Timestamp>,
    ) -> Result<Option<Timestamp>, Error>;

    fn callbacks(&self) -> &EventCallbacks;

    /// CPU index of the stream a packet belongs to.
    fn cpu_for_stream(&self, packet: &Packet, input: &TraceInput, stream: &StreamSource) -> Option<u32>;

    /// Hand a fully decoded event to the registered callbacks.
    fn process_event(
        &self,
        event: &Event,
        packet: &Packet,
        input: &TraceInput,
        stream: &StreamSource,
        sequence_number: u64,
    ) -> Result<(), Error> {
        let decoded = DecodedEvent {
            sequence_number,
            cpu: self.cpu_for_stream(packet, input, stream),
            event,
            packet,
            input,
            stream,
        };
        self.callbacks().dispatch(&decoded)
    }
}

/// Which [`Customization`] to decode a trace with.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomizationKind {
    /// Pick from the metadata's `tracer_name` environment entry
    #[default]
    #[display(fmt = "auto")]
    Auto,
    #[display(fmt = "lttng")]
    Lttng,
    #[display(fmt = "perf")]
    Perf,
}

impl FromStr for CustomizationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(CustomizationKind::Auto),
            "lttng" => Ok(CustomizationKind::Lttng),
            "perf" => Ok(CustomizationKind::Perf),
            other => Err(format!("'{other}' is not a customization, expected auto, lttng or perf")),
        }
    }
}

impl CustomizationKind {
    /// Resolve `Auto` using the metadata's environment. Anything but perf decodes the
    /// LTTng way, which also covers plain CTF producers.
    pub fn resolve(self, metadata: &Metadata) -> CustomizationKind {
        match self {
            CustomizationKind::Auto => match metadata.tracer_name() {
                Some(n) if n.starts_with("perf") => CustomizationKind::Perf,
                _ => CustomizationKind::Lttng,
            },
            k => k,
        }
    }

    /// Build the customization. `Auto` must have been resolved first and falls back to LTTng.
    pub fn build(self, options: MetadataOptions) -> Arc<dyn Customization> {
        match self {
            CustomizationKind::Perf => Arc::new(PerfCustomization::new(options)),
            CustomizationKind::Lttng | CustomizationKind::Auto => {
                Arc::new(LttngCustomization::new(options))
            }
        }
    }
}

/// Timestamp from a clock-sampling integer, using the clock it maps to (or the only
/// clock of the trace).
pub fn clock_timestamp(
    metadata: &Metadata,
    field: &FieldValue,
    previous: Option<&Timestamp>,
) -> Option<Timestamp> {
    let integer = field.as_integer()?;
    let raw = integer.as_u64()?;
    let clock = match &integer.mapped_clock {
        Some(name) => metadata.clock(name),
        None => metadata.default_clock(),
    }
    .cloned();
    let cycles = reconstruct(previous.map(Timestamp::cycles), raw, integer.size);
    Some(Timestamp::new(cycles, clock))
}

/// Descriptor lookup shared by the customizations: a missing id means event 0.
pub(crate) fn lookup_event(
    metadata: &Metadata,
    packet: &Packet,
    event: &EventHeader,
    id: Option<&FieldValue>,
) -> Result<Arc<EventDescriptor>, Error> {
    let stream_id = packet.stream_id();
    let id = match id {
        None => EventId(0),
        Some(f) => f.as_u64().map(EventId).ok_or_else(|| CorruptStreamError::WrongFieldType {
            offset: event.offset,
            field: format!("{}.id", Scope::EventHeader),
            expected: "an unsigned integer",
        })?,
    };
    metadata.event(stream_id, id).cloned().ok_or_else(|| {
        CorruptStreamError::MissingEvent {
            offset: event.offset,
            stream_id: stream_id.0,
            event_id: id.0,
        }
        .into()
    })
}

pub(crate) fn header_timestamp(
    metadata: &Metadata,
    event: &EventHeader,
    field: Option<(&str, &FieldValue)>,
    previous: Option<&Timestamp>,
) -> Result<Option<Timestamp>, Error> {
    match field {
        None => Ok(None),
        Some((path, f)) => clock_timestamp(metadata, f, previous).map(Some).ok_or_else(|| {
            CorruptStreamError::WrongFieldType {
                offset: event.offset,
                field: format!("{}.{path}", Scope::EventHeader),
                expected: "an unsigned integer",
            }
            .into()
        }),
    }
}

pub(crate) fn packet_context_cpu(packet: &Packet) -> Option<u32> {
    packet
        .context_field("cpu_id")
        .and_then(FieldValue::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}
