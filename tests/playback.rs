use ctf_playback::attrs::{AttrVal, EventAttrKey, TimelineAttrKey};
use ctf_playback::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const METADATA: &str = r#"/* CTF 1.8 */
typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
typealias integer { size = 32; align = 8; signed = false; map = clock.monotonic.value; } := uint32_clock_t;

trace {
    major = 1;
    minor = 8;
    byte_order = le;
    packet.header := struct {
        uint32_t magic;
    };
};

env {
    hostname = "target";
};

clock {
    name = "monotonic";
    freq = 1000000000;
};

stream {
    event.header := struct {
        uint32_t id;
        uint32_clock_t timestamp;
    };
    packet.context := struct {
        uint32_t packet_size;
        uint32_t content_size;
    };
};

event {
    name = "sample";
    id = 0;
    fields := struct {
        uint8_t v;
    };
};
"#;

/// One packet of (timestamp, value) events.
fn stream(events: &[(u32, u8)]) -> Vec<u8> {
    let bits = (12 + 9 * events.len() as u32) * 8;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xC1FC_1FC1_u32.to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());
    for (ts, v) in events {
        bytes.extend_from_slice(&0_u32.to_le_bytes());
        bytes.extend_from_slice(&ts.to_le_bytes());
        bytes.push(*v);
    }
    bytes
}

fn write_trace(dir: &Path) {
    fs::write(dir.join("metadata"), METADATA).unwrap();
    fs::write(dir.join("chan_0"), stream(&[(5, 1), (25, 3)])).unwrap();
    fs::write(dir.join("chan_1"), stream(&[(15, 2)])).unwrap();
}

#[test]
fn plays_back_trace_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_trace(dir.path());

    let trace_uuid = Uuid::from_u128(0xa1a2a3a4_b1b2_c1c2_d1d2_d3d4d5d6d7d8);
    let options = MetadataOptions {
        clock_offset_s: 1,
        trace_uuid: Some(trace_uuid),
        ..Default::default()
    };
    let input = TraceInput::from_dir(dir.path()).unwrap();
    let playback =
        Playback::with_customization_kind(input, CustomizationKind::Auto, options).unwrap();
    assert_eq!(playback.customization().name(), "lttng");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    playback
        .customization()
        .callbacks()
        .register(move |e: &DecodedEvent<'_>| {
            let attrs = e.event.attrs(Some(e.sequence_number), e.cpu);
            sink.lock().unwrap().push((
                e.stream.name.clone(),
                attrs.get(&EventAttrKey::Timestamp).cloned(),
                attrs.get(&EventAttrKey::Field("v".to_owned())).cloned(),
                e.cpu,
            ));
            Ok(())
        })
        .unwrap();

    let summary = playback.run().unwrap();
    assert_eq!(
        summary,
        PlaybackSummary {
            events: 3,
            packets: 2,
            interrupted: false,
        }
    );

    let ns = |ts: u64| Some(AttrVal::Timestamp(1_000_000_000 + ts));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("chan_0".to_owned(), ns(5), Some(AttrVal::unsigned(1)), Some(0)),
            ("chan_1".to_owned(), ns(15), Some(AttrVal::unsigned(2)), Some(1)),
            ("chan_0".to_owned(), ns(25), Some(AttrVal::unsigned(3)), Some(0)),
        ]
    );

    let props = CtfProperties::new(
        playback.input(),
        playback.metadata(),
        playback.customization().name(),
    );
    let timelines = props.timelines().collect::<Vec<_>>();
    assert_eq!(timelines.len(), 2);
    let (index, tid, attr_kvs) = &timelines[1];
    assert_eq!(*index, 1);
    assert_eq!(*tid, Uuid::new_v5(&trace_uuid, &1_u64.to_le_bytes()));
    let get = |key: TimelineAttrKey| {
        attr_kvs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(get(TimelineAttrKey::Name), Some("chan_1".into()));
    assert_eq!(get(TimelineAttrKey::TraceUuid), Some(trace_uuid.to_string().into()));
    assert_eq!(
        get(TimelineAttrKey::TraceEnv("hostname".to_owned())),
        Some("target".into())
    );
    assert_eq!(get(TimelineAttrKey::TraceCustomization), Some("lttng".into()));
    assert_eq!(get(TimelineAttrKey::StreamClockOffsetSeconds), Some(1_i64.into()));
}

#[test]
fn truncated_stream_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_trace(dir.path());
    let mut bytes = stream(&[(5, 1), (25, 3)]);
    bytes.truncate(bytes.len() - 4);
    fs::write(dir.path().join("chan_0"), bytes).unwrap();

    let input = TraceInput::from_dir(dir.path()).unwrap();
    let playback = Playback::with_customization_kind(
        input,
        CustomizationKind::Perf,
        MetadataOptions::default(),
    )
    .unwrap()
    .with_ordering(StreamOrdering::Sequential);
    assert!(playback.run().is_err());
}

const TIMESTAMP_ONLY_METADATA: &str = r#"/* CTF 1.8 */
typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
typealias integer { size = 32; align = 8; signed = false; map = clock.monotonic.value; } := uint32_clock_t;

trace {
    major = 1;
    minor = 8;
    byte_order = le;
};

clock {
    name = "monotonic";
    freq = 1000000000;
};

stream {
    event.header := struct {
        uint32_clock_t timestamp;
    };
    packet.context := struct {
        uint32_t packet_size;
        uint32_t content_size;
    };
};

event {
    name = "sample";
    fields := struct {
        uint8_t v;
    };
};
"#;

#[test]
fn header_without_event_id_plays_back() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("metadata"), TIMESTAMP_ONLY_METADATA).unwrap();
    let events: [(u32, u8); 2] = [(10, 4), (20, 6)];
    let bits = (8 + 5 * events.len() as u32) * 8;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&bits.to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());
    for (ts, v) in events {
        bytes.extend_from_slice(&ts.to_le_bytes());
        bytes.push(v);
    }
    fs::write(dir.path().join("chan_0"), bytes).unwrap();

    let input = TraceInput::from_dir(dir.path()).unwrap();
    let playback = Playback::with_customization_kind(
        input,
        CustomizationKind::Perf,
        MetadataOptions::default(),
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    playback
        .customization()
        .callbacks()
        .register(move |e: &DecodedEvent<'_>| {
            sink.lock().unwrap().push((
                e.event.name().to_owned(),
                e.event.timestamp.as_ref().and_then(|t| t.ns()),
                e.event.field("v").and_then(|f| f.as_u64()),
            ));
            Ok(())
        })
        .unwrap();

    let summary = playback.run().unwrap();
    assert_eq!(summary.events, 2);
    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("sample".to_owned(), Some(10), Some(4)),
            ("sample".to_owned(), Some(20), Some(6)),
        ]
    );
    assert!(seen[0].1 < seen[1].1);
}
