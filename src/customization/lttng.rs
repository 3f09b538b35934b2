//! LTTng kernel and userspace traces.
//!
//! LTTng event headers come in a compact and an extended form selected by the `id`
//! enumeration: ids below 31 are stored inline with a 27-bit timestamp, larger ids escape
//! to the `extended` member of the `v` variant, which carries the real id and a 64-bit
//! timestamp.

use super::{
    header_timestamp, lookup_event, packet_context_cpu, CpuCache, Customization, EventCallbacks,
};
use crate::error::Error;
use crate::event::EventHeader;
use crate::input::{StreamSource, TraceInput};
use crate::metadata::{EventDescriptor, Metadata, MetadataOptions, MetadataParser};
use crate::packet::Packet;
use crate::timestamp::Timestamp;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct LttngCustomization {
    options: MetadataOptions,
    callbacks: EventCallbacks,
    cpus: CpuCache,
}

impl LttngCustomization {
    pub fn new(options: MetadataOptions) -> Self {
        LttngCustomization {
            options,
            callbacks: Default::default(),
            cpus: Default::default(),
        }
    }
}

impl Customization for LttngCustomization {
    fn name(&self) -> &'static str {
        "lttng"
    }

    fn create_metadata_parser(&self, _input: &TraceInput) -> MetadataParser {
        MetadataParser::new(self.options.clone())
    }

    fn get_event_descriptor(
        &self,
        metadata: &Metadata,
        packet: &Packet,
        event: &EventHeader,
    ) -> Result<Arc<EventDescriptor>, Error> {
        let id = event
            .header
            .path("v.id")
            .or_else(|| event.header.get("id"));
        lookup_event(metadata, packet, event, id)
    }

    fn timestamp_from_event_header(
        &self,
        metadata: &Metadata,
        event: &EventHeader,
        previous: Option<&Timestamp>,
    ) -> Result<Option<Timestamp>, Error> {
        let field = event
            .header
            .path("v.timestamp")
            .map(|f| ("v.timestamp", f))
            .or_else(|| event.header.get("timestamp").map(|f| ("timestamp", f)));
        header_timestamp(metadata, event, field, previous)
    }

    fn callbacks(&self) -> &EventCallbacks {
        &self.callbacks
    }

    /// `cpu_id` from the packet context, or the `_<cpu>` suffix LTTng gives stream files.
    fn cpu_for_stream(
        &self,
        packet: &Packet,
        input: &TraceInput,
        stream: &StreamSource,
    ) -> Option<u32> {
        self.cpus.get_or_insert_with(input, stream, || {
            packet_context_cpu(packet).or_else(|| {
                stream
                    .name
                    .rsplit_once('_')
                    .and_then(|(_, cpu)| cpu.parse().ok())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_reader::test_util::BitWriter;
    use crate::customization::test_util::lttng_metadata;
    use crate::field::FieldValue;
    use crate::packet::StreamDecoder;
    use crate::types::{ByteOrder, EventId};
    use pretty_assertions::assert_eq;

    const LE: ByteOrder = ByteOrder::LittleEndian;

    fn packet(w: &mut BitWriter, begin: u64, end: u64, events: &dyn Fn(&mut BitWriter)) {
        let mut body = BitWriter::new();
        events(&mut body);
        let body = body.finish();
        // 8 header bytes, 40 context bytes
        let content_bits = (8 + 40 + body.len() as u64) * 8;
        let packet_bits = content_bits + 16;
        w.le(0xC1FC_1FC1, 32);
        w.le(0, 32);
        w.le(begin, 64);
        w.le(end, 64);
        w.le(content_bits, 64);
        w.le(packet_bits, 64);
        w.le(0, 32);
        w.le(2, 32);
        w.bytes(&body);
        w.le(0, 16);
    }

    fn compact(w: &mut BitWriter, id: u64, ts: u64, x: u8) {
        w.write(id, 5, LE);
        w.write(ts, 27, LE);
        w.le(u64::from(x), 8);
    }

    fn extended(w: &mut BitWriter, id: u32, ts: u64, x: u8) {
        w.write(31, 5, LE);
        w.align(8);
        w.le(u64::from(id), 32);
        w.le(ts, 64);
        w.le(u64::from(x), 8);
    }

    #[test]
    fn compact_and_extended_headers() {
        let metadata = Arc::new(lttng_metadata());
        let mut w = BitWriter::new();
        packet(&mut w, 0x1_0000_0000, 0x1_0000_1000, &|w| {
            compact(w, 0, 0x10, 1);
            extended(w, 40, 0x1_0000_0020, 2);
            compact(w, 0, 0x30, 3);
        });
        let bytes = w.finish();

        let lttng = LttngCustomization::default();
        let mut decoder = StreamDecoder::new(bytes.as_slice(), metadata);
        let mut seen = Vec::new();
        while let Some(event) = decoder.next_event(&lttng).unwrap() {
            seen.push((
                event.id(),
                event.timestamp.as_ref().map(Timestamp::cycles),
                event.field("x").and_then(|f| f.as_u64()),
            ));
        }
        assert_eq!(
            seen,
            vec![
                (EventId(0), Some(0x1_0000_0010), Some(1)),
                (EventId(40), Some(0x1_0000_0020), Some(2)),
                (EventId(0), Some(0x1_0000_0030), Some(3)),
            ]
        );
    }

    #[test]
    fn cpu_from_packet_context_or_stream_name() {
        let metadata = Arc::new(lttng_metadata());
        let mut w = BitWriter::new();
        packet(&mut w, 0, 10, &|w| compact(w, 0, 1, 0));
        let bytes = w.finish();
        let lttng = LttngCustomization::default();
        let mut decoder = StreamDecoder::new(bytes.as_slice(), metadata);
        let packet = decoder.next_packet(&lttng).unwrap().unwrap();

        let input = TraceInput::from_memory(
            "t",
            Vec::new(),
            vec![("chan_0".to_owned(), Vec::new()), ("chan_7".to_owned(), Vec::new())],
        )
        .unwrap();
        assert_eq!(lttng.cpu_for_stream(&packet, &input, &input.streams()[0]), Some(2));

        let mut bare = (*packet).clone();
        bare.context = FieldValue::Struct(Default::default());
        // Cached per stream
        assert_eq!(lttng.cpu_for_stream(&bare, &input, &input.streams()[0]), Some(2));
        assert_eq!(lttng.cpu_for_stream(&bare, &input, &input.streams()[1]), Some(7));
    }
}
