//! Traces converted from `perf.data` with `perf data convert --to-ctf`.
//!
//! Perf writes a flat event header holding `id` and a full-width `timestamp`, and one
//! stream file per CPU named `perf_stream_<cpu>`.

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

const STREAM_FILE_PREFIX: &str = "perf_stream_";

#[derive(Debug, Default)]
pub struct PerfCustomization {
    options: MetadataOptions,
    callbacks: EventCallbacks,
    cpus: CpuCache,
}

impl PerfCustomization {
    pub fn new(options: MetadataOptions) -> Self {
        PerfCustomization {
            options,
            callbacks: Default::default(),
            cpus: Default::default(),
        }
    }
}

impl Customization for PerfCustomization {
    fn name(&self) -> &'static str {
        "perf"
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
        lookup_event(metadata, packet, event, event.header.get("id"))
    }

    fn timestamp_from_event_header(
        &self,
        metadata: &Metadata,
        event: &EventHeader,
        previous: Option<&Timestamp>,
    ) -> Result<Option<Timestamp>, Error> {
        let field = event.header.get("timestamp").map(|f| ("timestamp", f));
        header_timestamp(metadata, event, field, previous)
    }

    fn callbacks(&self) -> &EventCallbacks {
        &self.callbacks
    }

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
                    .strip_prefix(STREAM_FILE_PREFIX)
                    .and_then(|cpu| cpu.parse().ok())
            })
        })
    }
}
