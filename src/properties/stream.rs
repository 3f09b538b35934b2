use crate::attrs::{AttrVal, TimelineAttrKey, TIMELINE_INGEST_SOURCE_VAL};
use crate::input::StreamSource;
use crate::metadata::Metadata;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

const CLOCK_STYLE_RELATIVE: &str = "relative";
const CLOCK_STYLE_UTC: &str = "utc";

#[derive(Clone, PartialEq, Debug)]
pub struct CtfStreamProperties {
    timeline_id: Uuid,
    attrs: BTreeMap<TimelineAttrKey, AttrVal>,
}

impl CtfStreamProperties {
    pub fn new(trace_uuid: &Uuid, s: &StreamSource, metadata: &Metadata) -> Self {
        let mut attrs = BTreeMap::default();
        let timeline_id = Uuid::new_v5(trace_uuid, &(s.index as u64).to_le_bytes());

        // Prefer the file name component of on-disk streams, fallback to
        // "stream{index}" which is the default naming convention used within
        // the LTTng ecosystem
        let stream_name = s
            .path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .or_else(|| Some(s.name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| format!("stream{}", s.index));

        attrs.insert(
            TimelineAttrKey::Description,
            format!("CTF stream '{stream_name}'").into(),
        );
        attrs.insert(TimelineAttrKey::Name, stream_name.clone().into());
        attrs.insert(TimelineAttrKey::StreamName, stream_name.into());
        attrs.insert(TimelineAttrKey::Id, timeline_id.to_string().into());
        attrs.insert(
            TimelineAttrKey::IngestSource,
            TIMELINE_INGEST_SOURCE_VAL.into(),
        );
        if let Some(len) = s.len() {
            attrs.insert(TimelineAttrKey::StreamSize, AttrVal::unsigned(len));
        }

        // A stream file's class is only known from its packets, unless there is just one
        if let Some(stream) = metadata.single_stream() {
            attrs.insert(TimelineAttrKey::StreamId, AttrVal::unsigned(stream.id.0));
            attrs.insert(
                TimelineAttrKey::StreamEventClassCount,
                AttrVal::unsigned(metadata.stream_events(stream.id).count() as u64),
            );
        }

        if let Some(c) = metadata.default_clock() {
            attrs.insert(TimelineAttrKey::StreamClockFreq, AttrVal::unsigned(c.frequency));
            attrs.insert(TimelineAttrKey::StreamClockOffsetSeconds, c.offset_s.into());
            attrs.insert(TimelineAttrKey::StreamClockOffsetCycles, c.offset.into());
            attrs.insert(TimelineAttrKey::StreamClockPrecision, AttrVal::unsigned(c.precision));
            attrs.insert(TimelineAttrKey::StreamClockUnixEpoch, c.absolute.into());
            attrs.insert(TimelineAttrKey::StreamClockName, c.name.as_str().into());
            if let Some(cd) = &c.description {
                attrs.insert(TimelineAttrKey::StreamClockDesc, cd.as_str().into());
            }
            if let Some(cid) = &c.uuid {
                attrs.insert(TimelineAttrKey::StreamClockUuid, cid.to_string().into());
                attrs.insert(TimelineAttrKey::TimeDomain, cid.to_string().into());
            }
            attrs.insert(
                TimelineAttrKey::ClockStyle,
                if c.absolute {
                    CLOCK_STYLE_UTC
                } else {
                    CLOCK_STYLE_RELATIVE
                }
                .into(),
            );
        }

        Self { timeline_id, attrs }
    }

    pub fn timeline_id(&self) -> Uuid {
        self.timeline_id
    }

    pub fn attr_kvs(&self) -> Vec<(TimelineAttrKey, AttrVal)> {
        self.attrs.clone().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TraceInput;
    use crate::metadata::{MetadataOptions, MetadataParser};
    use crate::properties::CtfProperties;
    use pretty_assertions::assert_eq;

    const METADATA: &str = r#"/* CTF 1.8 */
        typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
        trace { major = 1; minor = 8; byte_order = be; uuid = "2a6422d0-6cee-11e0-8c08-cb07d7b3a564"; };
        env { hostname = "box"; tracer_major = 2; };
        clock { name = monotonic; freq = 1000; offset_s = 10; absolute = true; };
        stream {
            event.header := struct { uint32_t id; };
            packet.context := struct { uint32_t packet_size; };
        };
        event { name = a; };
    "#;

    #[test]
    fn timeline_attrs() {
        let metadata = MetadataParser::default().parse_text(METADATA).unwrap();
        let input = TraceInput::from_memory(
            "trace",
            Vec::new(),
            vec![("chan_0".to_owned(), vec![0; 4]), ("chan_1".to_owned(), vec![])],
        )
        .unwrap();
        let props = CtfProperties::new(&input, &metadata, "lttng");
        let timelines = props.timelines().collect::<Vec<_>>();
        assert_eq!(timelines.len(), 2);

        let (index, id, attrs) = &timelines[0];
        assert_eq!(*index, 0);
        assert_eq!(*id, Uuid::new_v5(&metadata.trace.uuid, &0_u64.to_le_bytes()));
        assert_ne!(timelines[1].1, *id);

        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>();
        let get = |k: &str| attrs.get(k).cloned();
        assert_eq!(get("timeline.name"), Some("chan_0".into()));
        assert_eq!(get("timeline.clock_style"), Some("utc".into()));
        assert_eq!(get("timeline.internal.ctf.stream.size"), Some(AttrVal::BigInt(4)));
        assert_eq!(get("timeline.internal.ctf.stream.id"), Some(AttrVal::BigInt(0)));
        assert_eq!(get("timeline.internal.ctf.stream.event_count"), Some(AttrVal::BigInt(1)));
        assert_eq!(get("timeline.internal.ctf.stream.clock.offset_seconds"), Some(AttrVal::Integer(10)));
        assert_eq!(get("timeline.internal.ctf.trace.version"), Some("1.8".into()));
        assert_eq!(get("timeline.internal.ctf.trace.byte_order"), Some("be".into()));
        assert_eq!(get("timeline.internal.ctf.trace.env.hostname"), Some("box".into()));
        assert_eq!(get("timeline.internal.ctf.trace.env.tracer_major"), Some(AttrVal::Integer(2)));
        assert_eq!(get("timeline.internal.ctf.trace.customization"), Some("lttng".into()));
        assert_eq!(
            get("timeline.internal.ctf.trace.uuid"),
            Some("2a6422d0-6cee-11e0-8c08-cb07d7b3a564".into())
        );
    }

    #[test]
    fn forced_unix_epoch_origin() {
        let text = METADATA.replace("absolute = true;", "");
        let relative = MetadataParser::default().parse_text(&text).unwrap();
        let forced = MetadataParser::new(MetadataOptions {
            force_clock_origin_unix_epoch: true,
            ..Default::default()
        })
        .parse_text(&text)
        .unwrap();
        let input = TraceInput::from_memory("trace", Vec::new(), vec![("chan_0".to_owned(), vec![])])
            .unwrap();

        let style = |metadata: &Metadata| {
            let props = CtfProperties::new(&input, metadata, "lttng");
            let (_, _, attrs) = props.timelines().next().unwrap();
            let get = |key: TimelineAttrKey| {
                attrs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
            };
            (get(TimelineAttrKey::ClockStyle), get(TimelineAttrKey::StreamClockUnixEpoch))
        };
        assert_eq!(style(&relative), (Some("relative".into()), Some(false.into())));
        assert_eq!(style(&forced), (Some("utc".into()), Some(true.into())));

        let ns = |metadata: &Metadata| metadata.clock("monotonic").unwrap().cycles_to_ns(1500);
        assert_eq!(ns(&forced), ns(&relative));
        assert_eq!(ns(&forced), 11_500_000_000);
    }
}
