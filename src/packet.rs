//! Packet-by-packet, event-by-event decoding of one binary stream.

use crate::bit_reader::BitReader;
use crate::customization::Customization;
use crate::descriptor::{ReadContext, Scope, StructDescriptor, TypeDescriptor};
use crate::error::{CorruptStreamError, Error};
use crate::event::{Event, EventHeader};
use crate::field::FieldValue;
use crate::metadata::{Metadata, StreamDescriptor};
use crate::timestamp::Timestamp;
use crate::types::StreamId;
use derive_more::Display;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

pub const PACKET_MAGIC: u64 = 0xC1FC_1FC1;

/// Where a [`StreamDecoder`] is within the current packet.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum PacketState {
    #[display(fmt = "awaiting packet")]
    AwaitingPacket,
    #[display(fmt = "header read")]
    HeaderRead,
    #[display(fmt = "context read")]
    ContextRead,
    #[display(fmt = "iterating events")]
    EventsIterating,
    #[display(fmt = "packet exhausted")]
    PacketExhausted,
}

/// Decoded packet header and context. Immutable once its events start being read.
#[derive(Clone, PartialEq, Debug)]
pub struct Packet {
    /// Index of this packet within its stream
    pub index: u64,
    /// Stream-absolute byte offset
    pub offset: u64,
    pub header: Option<FieldValue>,
    pub context: FieldValue,
    pub stream: Arc<StreamDescriptor>,
    /// Total bits including padding, `None` when the packet runs to the end of the stream
    pub packet_bits: Option<u64>,
    /// Bits holding header, context and events
    pub content_bits: Option<u64>,
    /// Start and end timestamps, when the context carries them
    pub bounds: Option<(Timestamp, Timestamp)>,
    /// Events lost between the previous packet of this stream and this one
    pub events_discarded: u64,
}

impl Packet {
    pub fn stream_id(&self) -> StreamId {
        self.stream.id
    }

    pub fn header_field(&self, name: &str) -> Option<&FieldValue> {
        self.header.as_ref().and_then(|h| h.get(name))
    }

    pub fn context_field(&self, name: &str) -> Option<&FieldValue> {
        self.context.get(name)
    }

    /// An unsigned integer from the packet context.
    ///
    /// Absent fields are `None`, fields of another kind are an error.
    pub fn context_u64(&self, name: &str) -> Result<Option<u64>, Error> {
        match self.context_field(name) {
            None => Ok(None),
            Some(f) => f.as_u64().map(Some).ok_or_else(|| {
                CorruptStreamError::WrongFieldType {
                    offset: self.offset,
                    field: format!("{}.{name}", Scope::PacketContext),
                    expected: "an unsigned integer",
                }
                .into()
            }),
        }
    }

    /// Sequence number of the packet within its stream, from `packet_seq_num`.
    pub fn sequence_number(&self) -> Option<u64> {
        self.context_field("packet_seq_num").and_then(FieldValue::as_u64)
    }

    fn roots(&self) -> Vec<(Scope, &FieldValue)> {
        let mut roots = Vec::with_capacity(2);
        if let Some(h) = &self.header {
            roots.push((Scope::PacketHeader, h));
        }
        roots.push((Scope::PacketContext, &self.context));
        roots
    }
}

/// Decodes the packets and events of one stream.
///
/// Each stream gets its own decoder and bit position. Decoding stops at the first error;
/// there is no recovery within a stream.
pub struct StreamDecoder<R> {
    reader: BitReader<R>,
    metadata: Arc<Metadata>,
    state: PacketState,
    packet: Option<Arc<Packet>>,
    packets_read: u64,
    /// Reference for reconstructing narrow clock fields
    clock: Option<Timestamp>,
    /// Timestamp of the previous event, for the monotonicity check
    last_timestamp: Option<Timestamp>,
    /// Last `events_discarded` snapshot, with its width in bits
    discarded_snapshot: Option<(u64, u32)>,
    /// Discarded count to attach to the next event
    pending_discarded: u64,
}

impl<R: BufRead> StreamDecoder<R> {
    pub fn new(inner: R, metadata: Arc<Metadata>) -> Self {
        StreamDecoder {
            reader: BitReader::new(inner),
            metadata,
            state: PacketState::AwaitingPacket,
            packet: None,
            packets_read: 0,
            clock: None,
            last_timestamp: None,
            discarded_snapshot: None,
            pending_discarded: 0,
        }
    }

    pub fn state(&self) -> PacketState {
        self.state
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    pub fn current_packet(&self) -> Option<&Arc<Packet>> {
        self.packet.as_ref()
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    /// Read the next packet's header and context. `None` at the end of the stream.
    ///
    /// Any unread events of the current packet are skipped.
    pub fn next_packet(
        &mut self,
        customization: &dyn Customization,
    ) -> Result<Option<Arc<Packet>>, Error> {
        if self.state == PacketState::EventsIterating {
            self.finish_packet()?;
        }
        self.state = PacketState::AwaitingPacket;
        self.packet = None;
        if self.reader.is_at_end()? {
            return Ok(None);
        }

        self.reader.begin_packet();
        let offset = self.reader.byte_offset();

        let header = match &self.metadata.trace.packet_header {
            Some(h) => Some(read_struct(h, Scope::PacketHeader, &[], &mut self.reader)?),
            None => None,
        };
        self.state = PacketState::HeaderRead;
        if let Some(h) = &header {
            self.validate_header(h, offset)?;
        }

        let stream = self.resolve_stream(header.as_ref(), offset)?;
        let context = {
            let roots: Vec<(Scope, &FieldValue)> =
                header.iter().map(|h| (Scope::PacketHeader, h)).collect();
            read_struct(
                &stream.packet_context,
                Scope::PacketContext,
                &roots,
                &mut self.reader,
            )?
        };
        self.state = PacketState::ContextRead;

        let mut packet = Packet {
            index: self.packets_read,
            offset,
            header,
            context,
            stream,
            packet_bits: None,
            content_bits: None,
            bounds: None,
            events_discarded: 0,
        };

        let packet_bits = customization.bits_in_packet(&packet)?;
        let content_bits = customization.packet_content_bit_count(&packet)?;
        self.check_sizes(offset, packet_bits, content_bits)?;
        if let Some(c) = content_bits {
            self.reader.set_content_limit(c, packet_bits)?;
        }
        packet.packet_bits = packet_bits;
        packet.content_bits = content_bits;

        packet.bounds = customization.timestamps_from_packet_context(&self.metadata, &packet)?;
        if let Some((start, end)) = &packet.bounds {
            if end < start {
                return Err(CorruptStreamError::TimestampOutOfBounds {
                    offset,
                    timestamp: end.cycles(),
                    start: start.cycles(),
                    end: end.cycles(),
                }
                .into());
            }
            // Narrow event clocks count from the packet start
            self.clock = Some(start.clone());
        }

        packet.events_discarded = self.discarded_since_last_packet(&packet)?;
        if packet.events_discarded != 0 {
            warn!(
                stream_id = %packet.stream_id(),
                packet_offset = offset,
                count = packet.events_discarded,
                "Tracer discarded events before this packet"
            );
        }
        self.pending_discarded = packet.events_discarded;

        debug!(
            stream_id = %packet.stream_id(),
            index = packet.index,
            offset,
            packet_bits = ?packet.packet_bits,
            content_bits = ?packet.content_bits,
            "Read packet"
        );

        self.packets_read += 1;
        let packet = Arc::new(packet);
        self.packet = Some(packet.clone());
        self.state = PacketState::EventsIterating;
        Ok(Some(packet))
    }

    /// Decode the next event, crossing packet boundaries as needed. `None` at the end
    /// of the stream.
    pub fn next_event(&mut self, customization: &dyn Customization) -> Result<Option<Event>, Error> {
        loop {
            let current = match self.state {
                PacketState::EventsIterating => self.packet.clone(),
                _ => None,
            };
            let packet = match current {
                Some(p) => p,
                None => match self.next_packet(customization)? {
                    Some(p) => p,
                    None => return Ok(None),
                },
            };
            if self.content_exhausted()? {
                self.finish_packet()?;
                continue;
            }
            return self.read_event(customization, packet).map(Some);
        }
    }

    fn content_exhausted(&mut self) -> Result<bool, Error> {
        match self.reader.remaining_content_bits() {
            Some(remaining) => Ok(remaining == 0),
            None => self.reader.is_at_end(),
        }
    }

    /// Skip trailing padding and wait for the next packet.
    fn finish_packet(&mut self) -> Result<(), Error> {
        if let Some(bits) = self.packet.as_ref().and_then(|p| p.packet_bits) {
            self.reader.read_to_end_of_packet(bits)?;
        }
        trace!(offset = self.reader.byte_offset(), "Packet exhausted");
        self.state = PacketState::PacketExhausted;
        Ok(())
    }

    fn read_event(
        &mut self,
        customization: &dyn Customization,
        packet: Arc<Packet>,
    ) -> Result<Event, Error> {
        let offset = self.reader.byte_offset();
        let packet_offset = self.reader.packet_position() / 8;
        let mut roots = packet.roots();

        let header = read_struct(
            &packet.stream.event_header,
            Scope::EventHeader,
            &roots,
            &mut self.reader,
        )?;
        let stream_context = match &packet.stream.event_context {
            Some(c) => {
                let mut with_header = roots.clone();
                with_header.push((Scope::EventHeader, &header));
                Some(read_struct(
                    c,
                    Scope::EventStreamContext,
                    &with_header,
                    &mut self.reader,
                )?)
            }
            None => None,
        };

        let preamble = EventHeader {
            offset,
            header,
            stream_context,
        };
        let descriptor = customization.get_event_descriptor(&self.metadata, &packet, &preamble)?;
        let timestamp = customization.timestamp_from_event_header(
            &self.metadata,
            &preamble,
            self.clock.as_ref(),
        )?;
        if let Some(ts) = &timestamp {
            self.check_timestamp(ts, &packet, offset)?;
        }

        roots.push((Scope::EventHeader, &preamble.header));
        if let Some(sc) = &preamble.stream_context {
            roots.push((Scope::EventStreamContext, sc));
        }
        let context = match &descriptor.context {
            Some(ty) => Some(read_type(ty, Scope::EventContext, &roots, &mut self.reader)?),
            None => None,
        };
        if let Some(c) = &context {
            roots.push((Scope::EventContext, c));
        }
        let payload = match &descriptor.payload {
            Some(ty) => Some(read_type(ty, Scope::EventFields, &roots, &mut self.reader)?),
            None => None,
        };

        if let Some(ts) = &timestamp {
            self.clock = Some(ts.clone());
            self.last_timestamp = Some(ts.clone());
        }
        let discarded = std::mem::take(&mut self.pending_discarded);

        trace!(
            offset,
            event = %descriptor.name,
            id = %descriptor.id,
            "Read event"
        );

        Ok(Event {
            offset,
            packet_offset,
            header: preamble.header,
            stream_context: preamble.stream_context,
            context,
            payload,
            descriptor,
            timestamp,
            discarded,
            packet,
        })
    }

    fn check_timestamp(&self, ts: &Timestamp, packet: &Packet, offset: u64) -> Result<(), Error> {
        if let Some(prev) = &self.last_timestamp {
            if ts.cycles() < prev.cycles() {
                return Err(CorruptStreamError::TimestampNotMonotonic {
                    offset,
                    timestamp: ts.cycles(),
                    previous: prev.cycles(),
                }
                .into());
            }
        }
        if let Some((start, end)) = &packet.bounds {
            if ts.cycles() < start.cycles() || ts.cycles() > end.cycles() {
                return Err(CorruptStreamError::TimestampOutOfBounds {
                    offset,
                    timestamp: ts.cycles(),
                    start: start.cycles(),
                    end: end.cycles(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn validate_header(&self, header: &FieldValue, offset: u64) -> Result<(), Error> {
        if let Some(magic) = header.get("magic") {
            let actual = magic.as_u64().unwrap_or_default();
            if actual != PACKET_MAGIC {
                return Err(CorruptStreamError::BadMagic { offset, actual }.into());
            }
        }
        let expected = self.metadata.trace.uuid;
        if let (Some(FieldValue::Array(bytes)), false) = (header.get("uuid"), expected.is_nil()) {
            let mut raw = [0_u8; 16];
            if bytes.len() == raw.len() {
                for (dst, b) in raw.iter_mut().zip(bytes.iter()) {
                    *dst = b.as_u64().unwrap_or_default() as u8;
                }
                let actual = Uuid::from_bytes(raw);
                if actual != expected {
                    return Err(CorruptStreamError::UuidMismatch {
                        offset,
                        expected,
                        actual,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn resolve_stream(
        &self,
        header: Option<&FieldValue>,
        offset: u64,
    ) -> Result<Arc<StreamDescriptor>, Error> {
        let id = header.and_then(|h| h.get("stream_id")).and_then(FieldValue::as_u64);
        match id {
            Some(id) => self.metadata.stream(StreamId(id)).cloned().ok_or_else(|| {
                CorruptStreamError::MissingStream {
                    offset,
                    stream_id: id,
                }
                .into()
            }),
            None => self.metadata.single_stream().cloned().ok_or_else(|| {
                CorruptStreamError::AmbiguousStream {
                    offset,
                    stream_count: self.metadata.streams.len(),
                }
                .into()
            }),
        }
    }

    fn check_sizes(
        &self,
        offset: u64,
        packet_bits: Option<u64>,
        content_bits: Option<u64>,
    ) -> Result<(), Error> {
        let read_bits = self.reader.packet_position();
        let invalid = |packet_bits: u64, content_bits: u64| -> Result<(), Error> {
            Err(CorruptStreamError::InvalidPacketSize {
                offset,
                packet_bits,
                content_bits,
                read_bits,
            }
            .into())
        };
        match (packet_bits, content_bits) {
            (Some(p), _) if p % 8 != 0 => invalid(p, content_bits.unwrap_or(p)),
            (Some(p), Some(c)) if c > p || c < read_bits => invalid(p, c),
            (None, Some(c)) if c % 8 != 0 || c < read_bits => invalid(c, c),
            _ => Ok(()),
        }
    }

    /// Wrap-aware difference between this packet's `events_discarded` and the previous one.
    fn discarded_since_last_packet(&mut self, packet: &Packet) -> Result<u64, Error> {
        let Some(field) = packet.context_field("events_discarded") else {
            return Ok(0);
        };
        let integer = field.as_integer().ok_or_else(|| CorruptStreamError::WrongFieldType {
            offset: packet.offset,
            field: format!("{}.events_discarded", Scope::PacketContext),
            expected: "an integer",
        })?;
        let current = integer.as_u64().unwrap_or_default();
        let (previous, _) = self.discarded_snapshot.unwrap_or((0, integer.size));
        self.discarded_snapshot = Some((current, integer.size));
        let delta = current.wrapping_sub(previous);
        Ok(if integer.size >= 64 {
            delta
        } else {
            delta & ((1_u64 << integer.size) - 1)
        })
    }
}

fn read_struct<R: BufRead>(
    ty: &StructDescriptor,
    scope: Scope,
    roots: &[(Scope, &FieldValue)],
    reader: &mut BitReader<R>,
) -> Result<FieldValue, Error> {
    let mut ctx = ReadContext::new(scope, roots);
    ty.read(reader, &mut ctx)
}

fn read_type<R: BufRead>(
    ty: &TypeDescriptor,
    scope: Scope,
    roots: &[(Scope, &FieldValue)],
    reader: &mut BitReader<R>,
) -> Result<FieldValue, Error> {
    let mut ctx = ReadContext::new(scope, roots);
    ty.read(reader, &mut ctx)
}
