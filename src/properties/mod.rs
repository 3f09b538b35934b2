use crate::attrs::{AttrVal, TimelineAttrKey};
use crate::input::TraceInput;
use crate::metadata::Metadata;
use std::collections::BTreeMap;
use uuid::Uuid;

pub use stream::CtfStreamProperties;
pub use trace::CtfTraceProperties;

pub(crate) mod stream;
pub(crate) mod trace;

/// Attribute view of a trace and each of its streams.
#[derive(Clone, PartialEq, Debug)]
pub struct CtfProperties {
    pub trace: CtfTraceProperties,
    /// Keyed by the stream's position within the trace input
    pub streams: BTreeMap<usize, CtfStreamProperties>,
}

impl CtfProperties {
    pub fn new(input: &TraceInput, metadata: &Metadata, customization: &str) -> Self {
        // Timeline ids are a composite of the trace UUID and the stream position.
        // Fallback to making a new random UUID when the trace doesn't declare one.
        let trace_uuid = if metadata.trace.has_uuid() {
            metadata.trace.uuid
        } else {
            Uuid::new_v4()
        };

        let trace = CtfTraceProperties::new(input, metadata, customization);
        let streams = input
            .streams()
            .iter()
            .map(|s| (s.index, CtfStreamProperties::new(&trace_uuid, s, metadata)))
            .collect();
        Self { trace, streams }
    }

    pub fn timelines(&self) -> impl Iterator<Item = (usize, Uuid, Vec<(TimelineAttrKey, AttrVal)>)> + '_ {
        let trace_attr_kvs = self.trace.attr_kvs();
        self.streams.iter().map(move |(index, p)| {
            let mut attr_kvs = p.attr_kvs();
            attr_kvs.extend_from_slice(&trace_attr_kvs);
            (*index, p.timeline_id(), attr_kvs)
        })
    }
}
