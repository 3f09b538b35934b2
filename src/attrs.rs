use derive_more::Display;
use std::fmt;

// N.B. maybe we'll expand on this to separate out the various CTF producers
// (lttng/perf/barectf/etc), the customization name covers it for now.
pub(crate) const TIMELINE_INGEST_SOURCE_VAL: &str = "ctf";

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum TimelineAttrKey {
    #[display(fmt = "timeline.name")]
    Name,
    #[display(fmt = "timeline.description")]
    Description,
    #[display(fmt = "timeline.id")]
    Id,
    #[display(fmt = "timeline.time_domain")]
    TimeDomain,
    #[display(fmt = "timeline.clock_style")]
    ClockStyle,
    #[display(fmt = "timeline.ingest_source")]
    IngestSource,

    #[display(fmt = "timeline.internal.ctf.trace.name")]
    TraceName,
    #[display(fmt = "timeline.internal.ctf.trace.uuid")]
    TraceUuid,
    #[display(fmt = "timeline.internal.ctf.trace.version")]
    TraceVersion,
    #[display(fmt = "timeline.internal.ctf.trace.byte_order")]
    TraceByteOrder,
    #[display(fmt = "timeline.internal.ctf.trace.stream_count")]
    TraceStreamCount,
    #[display(fmt = "timeline.internal.ctf.trace.customization")]
    TraceCustomization,
    #[display(fmt = "timeline.internal.ctf.trace.env.{_0}")]
    TraceEnv(String),

    #[display(fmt = "timeline.internal.ctf.stream.id")]
    StreamId,
    #[display(fmt = "timeline.internal.ctf.stream.name")]
    StreamName,
    #[display(fmt = "timeline.internal.ctf.stream.size")]
    StreamSize,
    #[display(fmt = "timeline.internal.ctf.stream.event_count")]
    StreamEventClassCount,
    #[display(fmt = "timeline.internal.ctf.stream.clock.frequency")]
    StreamClockFreq,
    #[display(fmt = "timeline.internal.ctf.stream.clock.offset_seconds")]
    StreamClockOffsetSeconds,
    #[display(fmt = "timeline.internal.ctf.stream.clock.offset_cycles")]
    StreamClockOffsetCycles,
    #[display(fmt = "timeline.internal.ctf.stream.clock.precision")]
    StreamClockPrecision,
    #[display(fmt = "timeline.internal.ctf.stream.clock.unix_epoch_origin")]
    StreamClockUnixEpoch,
    #[display(fmt = "timeline.internal.ctf.stream.clock.name")]
    StreamClockName,
    #[display(fmt = "timeline.internal.ctf.stream.clock.description")]
    StreamClockDesc,
    #[display(fmt = "timeline.internal.ctf.stream.clock.uuid")]
    StreamClockUuid,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum EventAttrKey {
    #[display(fmt = "event.name")]
    Name,
    #[display(fmt = "event.timestamp")]
    Timestamp,

    #[display(fmt = "event.internal.ctf.stream_id")]
    StreamId,
    #[display(fmt = "event.internal.ctf.id")]
    Id,
    #[display(fmt = "event.internal.ctf.log_level")]
    LogLevel,
    #[display(fmt = "event.internal.ctf.clock_snapshot")]
    ClockSnapshot,
    #[display(fmt = "event.internal.ctf.sequence_number")]
    SequenceNumber,
    #[display(fmt = "event.internal.ctf.cpu")]
    Cpu,
    #[display(fmt = "event.internal.ctf.events_discarded")]
    EventsDiscarded,

    #[display(fmt = "event.internal.ctf.header.{_0}")]
    Header(String),
    #[display(fmt = "event.internal.ctf.common_context.{_0}")]
    CommonContext(String),
    #[display(fmt = "event.internal.ctf.specific_context.{_0}")]
    SpecificContext(String),
    #[display(fmt = "event.internal.ctf.packet_context.{_0}")]
    PacketContext(String),

    #[display(fmt = "event.{_0}")]
    Field(String),
}

/// Attribute value of a flattened field or property.
#[derive(Clone, PartialEq, Debug)]
pub enum AttrVal {
    Integer(i64),
    /// Unsigned values, which may not fit `i64`
    BigInt(i128),
    Float(f64),
    String(String),
    Bool(bool),
    /// Nanoseconds since the clock origin
    Timestamp(u64),
}

impl AttrVal {
    pub fn unsigned(v: u64) -> Self {
        AttrVal::BigInt(i128::from(v))
    }
}

impl fmt::Display for AttrVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrVal::Integer(v) => write!(f, "{v}"),
            AttrVal::BigInt(v) => write!(f, "{v}"),
            AttrVal::Float(v) => write!(f, "{v}"),
            AttrVal::String(v) => write!(f, "{v:?}"),
            AttrVal::Bool(v) => write!(f, "{v}"),
            AttrVal::Timestamp(v) => write!(f, "{v}ns"),
        }
    }
}

impl From<i64> for AttrVal {
    fn from(v: i64) -> Self {
        AttrVal::Integer(v)
    }
}

impl From<f64> for AttrVal {
    fn from(v: f64) -> Self {
        AttrVal::Float(v)
    }
}

impl From<bool> for AttrVal {
    fn from(v: bool) -> Self {
        AttrVal::Bool(v)
    }
}

impl From<String> for AttrVal {
    fn from(v: String) -> Self {
        AttrVal::String(v)
    }
}

impl From<&str> for AttrVal {
    fn from(v: &str) -> Self {
        AttrVal::String(v.to_owned())
    }
}
