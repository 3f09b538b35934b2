use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    CorruptStream(#[from] CorruptStreamError),

    #[error(transparent)]
    UnsupportedValue(#[from] UnsupportedValueError),

    #[error("Encountered an I/O error while reading '{}'. {source}", path.display())]
    InputIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Encountered an I/O error. {0}")]
    Io(#[from] std::io::Error),

    #[error("The trace input '{0}' does not contain a metadata file")]
    MissingMetadata(String),

    #[error("The trace input '{0}' does not contain any stream files")]
    NoStreams(String),

    #[error("An event callback failed. {0}")]
    Callback(String),
}

/// Errors raised while turning TSDL text into descriptors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("The '{scope}' scope is missing the required '{property}' property")]
    MissingProperty {
        scope: &'static str,
        property: &'static str,
    },

    #[error("The '{scope}' scope has an invalid '{property}' value '{value}'")]
    InvalidProperty {
        scope: &'static str,
        property: String,
        value: String,
    },

    #[error("Reference to undeclared type '{0}'")]
    UnknownType(String),

    #[error("Type '{0}' is declared more than once in the same scope")]
    DuplicateType(String),

    #[error("Invalid UUID '{0}'")]
    InvalidUuid(String),

    #[error("Invalid integer literal '{literal}'. {reason}")]
    InvalidLiteral { literal: String, reason: String },

    #[error("The metadata does not contain a 'trace' scope")]
    MissingTrace,

    #[error("The metadata declares more than one 'trace' scope")]
    DuplicateTrace,

    #[error("Stream {0} is declared more than once")]
    DuplicateStream(u64),

    #[error("Event {event_id} of stream {stream_id} is declared more than once")]
    DuplicateEvent { stream_id: u64, event_id: u64 },

    #[error("Event '{event}' references undeclared stream {stream_id}")]
    EventStreamNotFound { event: String, stream_id: u64 },

    #[error("Invalid metadata packet at byte offset {offset}: {reason}")]
    InvalidPacket { offset: u64, reason: String },

    #[error("Metadata text is not valid UTF-8")]
    NotUtf8,
}

/// Structural violations found while decoding the binary stream.
///
/// Offsets are stream-absolute byte offsets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorruptStreamError {
    #[error("Read of {requested} bits at byte offset {offset} runs past the packet content ({content_bits} bits)")]
    ReadPastContent {
        offset: u64,
        requested: u64,
        content_bits: u64,
    },

    #[error("Unexpected end of stream at byte offset {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("Invalid packet magic {actual:#010x} at byte offset {offset}")]
    BadMagic { offset: u64, actual: u64 },

    #[error("Packet at byte offset {offset} has trace UUID {actual}, expected {expected}")]
    UuidMismatch {
        offset: u64,
        expected: uuid::Uuid,
        actual: uuid::Uuid,
    },

    #[error("Packet at byte offset {offset} references undeclared stream {stream_id}")]
    MissingStream { offset: u64, stream_id: u64 },

    #[error("Packet at byte offset {offset} has no stream_id and the trace declares {stream_count} streams")]
    AmbiguousStream { offset: u64, stream_count: usize },

    #[error("Event at byte offset {offset} has id {event_id} which is not declared for stream {stream_id}")]
    MissingEvent {
        offset: u64,
        stream_id: u64,
        event_id: u64,
    },

    #[error("Variant '{field}' at byte offset {offset} has no member for tag '{tag}'")]
    UnknownVariantTag {
        offset: u64,
        field: String,
        tag: String,
    },

    #[error("Field '{field}' referenced at byte offset {offset} was not found")]
    FieldNotFound { offset: u64, field: String },

    #[error("Field '{field}' at byte offset {offset} is not {expected}")]
    WrongFieldType {
        offset: u64,
        field: String,
        expected: &'static str,
    },

    #[error("Event timestamp {timestamp} at byte offset {offset} is outside of the packet bounds [{start}, {end}]")]
    TimestampOutOfBounds {
        offset: u64,
        timestamp: u64,
        start: u64,
        end: u64,
    },

    #[error("Event timestamp {timestamp} at byte offset {offset} precedes the previous timestamp {previous}")]
    TimestampNotMonotonic {
        offset: u64,
        timestamp: u64,
        previous: u64,
    },

    #[error("Packet at byte offset {offset} has invalid sizes (packet {packet_bits} bits, content {content_bits} bits, already read {read_bits} bits)")]
    InvalidPacketSize {
        offset: u64,
        packet_bits: u64,
        content_bits: u64,
        read_bits: u64,
    },

    #[error("String at byte offset {offset} is not valid for its declared encoding")]
    InvalidString { offset: u64 },

    #[error("Array '{field}' at byte offset {offset} has length {length} which exceeds the remaining packet content")]
    ArrayTooLong {
        offset: u64,
        field: String,
        length: u64,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnsupportedValueError {
    #[error("The literal '{0}' requires more than 64 bits")]
    TooWide(String),

    #[error("The value is {actual}, not {requested}")]
    SignednessMismatch {
        requested: &'static str,
        actual: &'static str,
    },

    #[error("Converting {value} to {target} would lose information")]
    LossyConversion { value: String, target: &'static str },

    #[error("The value {value} requires {required} bits and does not fit in {target}")]
    Narrowing {
        value: String,
        required: u16,
        target: &'static str,
    },

    #[error("Integers of {0} bits are not supported")]
    IntegerSize(u64),

    #[error("Floating point values with {exp_dig} exponent and {mant_dig} mantissa bits are not supported")]
    FloatSize { exp_dig: u64, mant_dig: u64 },
}
