//! Drives decoding of a whole trace and hands every event to the customization.

use crate::customization::{Customization, CustomizationKind};
use crate::error::Error;
use crate::event::Event;
use crate::input::{StreamSource, TraceInput};
use crate::metadata::{Metadata, MetadataOptions};
use crate::packet::StreamDecoder;
use crate::types::Interruptor;
use derive_more::Display;
use serde::Deserialize;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// How events of different streams are interleaved.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamOrdering {
    /// Merge streams by event timestamp, ties broken by stream order
    #[default]
    #[display(fmt = "timestamp")]
    Timestamp,
    /// Every event of a stream before the next stream
    #[display(fmt = "sequential")]
    Sequential,
}

impl FromStr for StreamOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "timestamp" => Ok(StreamOrdering::Timestamp),
            "sequential" => Ok(StreamOrdering::Sequential),
            other => Err(format!(
                "'{other}' is not a stream ordering, expected timestamp or sequential"
            )),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct PlaybackSummary {
    pub events: u64,
    pub packets: u64,
    /// Playback stopped early because the interruptor was set
    pub interrupted: bool,
}

type Reader = Box<dyn BufRead + Send>;

struct StreamCursor<'a> {
    source: &'a StreamSource,
    decoder: StreamDecoder<Reader>,
    /// Next event of this stream, read ahead for timestamp ordering
    pending: Option<Event>,
}

impl<'a> StreamCursor<'a> {
    fn advance(&mut self, customization: &dyn Customization) -> Result<(), Error> {
        self.pending = self.decoder.next_event(customization)?;
        Ok(())
    }
}

/// Plays back one trace.
pub struct Playback {
    input: TraceInput,
    customization: Arc<dyn Customization>,
    metadata: Arc<Metadata>,
    ordering: StreamOrdering,
    interruptor: Interruptor,
}

impl Playback {
    /// Compile the trace's metadata with the parser `customization` provides.
    pub fn new(input: TraceInput, customization: Arc<dyn Customization>) -> Result<Self, Error> {
        let parser = customization.create_metadata_parser(&input);
        let metadata = parser.parse_bytes(&input.metadata_bytes()?)?;
        Ok(Self::from_parts(input, customization, metadata))
    }

    /// Compile the metadata, then pick the customization, resolving
    /// [`CustomizationKind::Auto`] from the metadata environment.
    ///
    /// Metadata is always compiled by the parser of the customization that ends up
    /// selected. `Auto` parses with the LTTng one first and re-parses when the
    /// environment names another tracer.
    pub fn with_customization_kind(
        input: TraceInput,
        kind: CustomizationKind,
        options: MetadataOptions,
    ) -> Result<Self, Error> {
        let bytes = input.metadata_bytes()?;
        let mut customization = kind.build(options.clone());
        let mut metadata = customization.create_metadata_parser(&input).parse_bytes(&bytes)?;
        let resolved = kind.resolve(&metadata);
        if resolved.to_string() != customization.name() {
            customization = resolved.build(options);
            metadata = customization.create_metadata_parser(&input).parse_bytes(&bytes)?;
        }
        debug!(trace = %input.name, customization = %resolved, "Selected customization");
        Ok(Self::from_parts(input, customization, metadata))
    }

    fn from_parts(
        input: TraceInput,
        customization: Arc<dyn Customization>,
        metadata: Metadata,
    ) -> Self {
        Playback {
            input,
            customization,
            metadata: Arc::new(metadata),
            ordering: StreamOrdering::default(),
            interruptor: Interruptor::new(),
        }
    }

    pub fn with_ordering(mut self, ordering: StreamOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_interruptor(mut self, interruptor: Interruptor) -> Self {
        self.interruptor = interruptor;
        self
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    pub fn input(&self) -> &TraceInput {
        &self.input
    }

    pub fn customization(&self) -> &Arc<dyn Customization> {
        &self.customization
    }

    /// Decode every stream, dispatching events through the customization.
    ///
    /// The first error aborts the playback.
    pub fn run(&self) -> Result<PlaybackSummary, Error> {
        let mut cursors = self
            .input
            .streams()
            .iter()
            .map(|source| -> Result<StreamCursor<'_>, Error> {
                Ok(StreamCursor {
                    source,
                    decoder: StreamDecoder::new(source.open()?, self.metadata.clone()),
                    pending: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            trace = %self.input.name,
            streams = cursors.len(),
            ordering = %self.ordering,
            customization = self.customization.name(),
            "Starting playback"
        );

        let mut summary = PlaybackSummary::default();
        let result = match self.ordering {
            StreamOrdering::Sequential => self.run_sequential(&mut cursors, &mut summary),
            StreamOrdering::Timestamp => self.run_merged(&mut cursors, &mut summary),
        };
        summary.packets = cursors.iter().map(|c| c.decoder.packets_read()).sum();
        result?;

        debug!(
            events = summary.events,
            packets = summary.packets,
            interrupted = summary.interrupted,
            "Playback complete"
        );
        Ok(summary)
    }

    fn run_sequential(
        &self,
        cursors: &mut [StreamCursor<'_>],
        summary: &mut PlaybackSummary,
    ) -> Result<(), Error> {
        let customization = self.customization.as_ref();
        for cursor in cursors.iter_mut() {
            loop {
                if self.interrupted(summary) {
                    return Ok(());
                }
                let Some(event) = cursor.decoder.next_event(customization)? else {
                    break;
                };
                self.dispatch(&event, cursor.source, summary)?;
            }
        }
        Ok(())
    }

    fn run_merged(
        &self,
        cursors: &mut [StreamCursor<'_>],
        summary: &mut PlaybackSummary,
    ) -> Result<(), Error> {
        let customization = self.customization.as_ref();
        for cursor in cursors.iter_mut() {
            cursor.advance(customization)?;
        }

        loop {
            if self.interrupted(summary) {
                return Ok(());
            }
            // Events without a timestamp go first so their stream keeps moving
            let next = cursors
                .iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    c.pending.as_ref().map(|e| {
                        let ts = e.timestamp.as_ref().map(|t| t.ns_from_origin());
                        (ts, c.source.index, i)
                    })
                })
                .min();
            let Some((_, _, i)) = next else {
                return Ok(());
            };
            let cursor = &mut cursors[i];
            if let Some(event) = cursor.pending.take() {
                self.dispatch(&event, cursor.source, summary)?;
            }
            cursor.advance(customization)?;
        }
    }

    fn dispatch(
        &self,
        event: &Event,
        stream: &StreamSource,
        summary: &mut PlaybackSummary,
    ) -> Result<(), Error> {
        self.customization.process_event(
            event,
            &event.packet,
            &self.input,
            stream,
            summary.events,
        )?;
        summary.events += 1;
        Ok(())
    }

    fn interrupted(&self, summary: &mut PlaybackSummary) -> bool {
        if self.interruptor.is_set() {
            warn!(events = summary.events, "Playback interrupted");
            summary.interrupted = true;
        }
        summary.interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_reader::test_util::BitWriter;
    use crate::customization::{DecodedEvent, PerfCustomization};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const METADATA: &str = r#"/* CTF 1.8 */
        typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
        typealias integer { size = 16; align = 8; signed = false; } := uint16_t;
        typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
        trace {
            major = 1; minor = 8; byte_order = le;
            packet.header := struct { uint32_t magic; uint8_t stream_id; };
        };
        env { tracer_name = "perf"; };
        stream {
            id = 0;
            event.header := struct { uint8_t id; uint16_t timestamp; };
            packet.context := struct { uint16_t packet_size; uint16_t content_size; };
        };
        event { name = "tick"; id = 0; stream_id = 0; fields := struct { uint8_t v; }; };
    "#;

    /// One packet holding events of (timestamp, value).
    fn stream(events: &[(u64, u8)]) -> Vec<u8> {
        let bits = (9 + 4 * events.len() as u64) * 8;
        let mut w = BitWriter::new();
        w.le(0xC1FC_1FC1, 32).le(0, 8).le(bits + 8, 16).le(bits, 16);
        for (ts, v) in events {
            w.le(0, 8).le(*ts, 16).le(u64::from(*v), 8);
        }
        w.le(0, 8);
        w.finish()
    }

    fn input() -> TraceInput {
        TraceInput::from_memory(
            "two-streams",
            METADATA.as_bytes().to_vec(),
            vec![
                ("a".to_owned(), stream(&[(10, 1), (30, 3)])),
                ("b".to_owned(), stream(&[(20, 2), (30, 4), (40, 5)])),
            ],
        )
        .unwrap()
    }

    fn collect(playback: &Playback) -> Arc<Mutex<Vec<(u64, String, u8)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        playback
            .customization()
            .callbacks()
            .register(move |e: &DecodedEvent<'_>| {
                let v = e.event.field("v").and_then(|f| f.as_u64()).unwrap_or_default();
                sink.lock()
                    .unwrap()
                    .push((e.sequence_number, e.stream.name.clone(), v as u8));
                Ok(())
            })
            .unwrap();
        seen
    }

    #[test]
    fn merges_streams_by_timestamp() {
        let playback = Playback::with_customization_kind(
            input(),
            CustomizationKind::Auto,
            MetadataOptions::default(),
        )
        .unwrap();
        assert_eq!(playback.customization().name(), "perf");
        let seen = collect(&playback);

        let summary = playback.run().unwrap();
        assert_eq!(
            summary,
            PlaybackSummary {
                events: 5,
                packets: 2,
                interrupted: false
            }
        );
        let values = seen
            .lock()
            .unwrap()
            .iter()
            .map(|(seq, s, v)| (*seq, s.clone(), *v))
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                (0, "a".to_owned(), 1),
                (1, "b".to_owned(), 2),
                (2, "a".to_owned(), 3),
                (3, "b".to_owned(), 4),
                (4, "b".to_owned(), 5),
            ]
        );
    }

    #[test]
    fn selected_customization_compiles_metadata() {
        let uuid = uuid::Uuid::from_u128(0x35fc_a2e4_c9b6_4f26_a8e6_4d6e_3e1f_0a11);
        for kind in [
            CustomizationKind::Auto,
            CustomizationKind::Perf,
            CustomizationKind::Lttng,
        ] {
            let options = MetadataOptions {
                trace_uuid: Some(uuid),
                ..Default::default()
            };
            let playback = Playback::with_customization_kind(input(), kind, options).unwrap();
            let expected = match kind {
                CustomizationKind::Lttng => "lttng",
                _ => "perf",
            };
            assert_eq!(playback.customization().name(), expected);
            assert_eq!(playback.metadata().trace.uuid, uuid);
        }
    }

    #[test]
    fn sequential_ordering() {
        let playback = Playback::new(input(), Arc::new(PerfCustomization::default()))
            .unwrap()
            .with_ordering(StreamOrdering::Sequential);
        let seen = collect(&playback);
        playback.run().unwrap();
        let values = seen.lock().unwrap().iter().map(|(_, _, v)| *v).collect::<Vec<_>>();
        assert_eq!(values, vec![1, 3, 2, 4, 5]);
    }

    #[test]
    fn interruption_is_checked_between_events() {
        let interruptor = Interruptor::new();
        let playback = Playback::new(input(), Arc::new(PerfCustomization::default()))
            .unwrap()
            .with_interruptor(interruptor.clone());
        let intr = interruptor.clone();
        playback
            .customization()
            .callbacks()
            .register(move |e: &DecodedEvent<'_>| {
                if e.sequence_number == 1 {
                    intr.set();
                }
                Ok(())
            })
            .unwrap();
        let summary = playback.run().unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.events, 2);
    }

    #[test]
    fn callback_errors_abort() {
        let playback = Playback::new(input(), Arc::new(PerfCustomization::default())).unwrap();
        playback
            .customization()
            .callbacks()
            .register(|_: &DecodedEvent<'_>| Err(Error::Callback("nope".to_owned())))
            .unwrap();
        assert!(matches!(playback.run(), Err(Error::Callback(_))));
    }

    #[test]
    fn callbacks_can_register_callbacks() {
        let perf = Arc::new(PerfCustomization::default());
        let playback = Playback::new(input(), perf.clone()).unwrap();
        let late = Arc::new(Mutex::new(Vec::new()));
        let sink = late.clone();
        playback
            .customization()
            .callbacks()
            .register(move |e: &DecodedEvent<'_>| {
                if e.sequence_number == 0 {
                    let sink = sink.clone();
                    perf.callbacks().register(move |e: &DecodedEvent<'_>| {
                        sink.lock().unwrap().push(e.sequence_number);
                        Ok(())
                    })?;
                }
                Ok(())
            })
            .unwrap();

        let summary = playback.run().unwrap();
        assert_eq!(summary.events, 5);
        assert_eq!(*late.lock().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(playback.customization().callbacks().len(), 2);
    }

    #[test]
    fn ordering_from_str() {
        assert_eq!(
            StreamOrdering::from_str("Sequential"),
            Ok(StreamOrdering::Sequential)
        );
        assert!(StreamOrdering::from_str("random").is_err());
    }
}
