//! # Overview
//!
//! Decodes Common Trace Format (CTF 1.8) traces without any external tracing library.
//!
//! Conceptually CTF data is organized as followed:
//! * Trace: one TSDL metadata description shared by all of its streams
//!   - One or more streams (timelines), each a series of packets
//!     * Packets: header, context, then a series of events
//!
//! The [`metadata`] module compiles TSDL text into type descriptors, [`packet`] walks the
//! binary streams with them and [`playback`] merges the streams, handing each event to a
//! [`customization::Customization`] which knows the conventions of the tracer that produced
//! the trace.
//!
//! # Attrs Mappings
//!
//! Trace Attrs
//! * timeline.internal.ctf.trace.name
//! * timeline.internal.ctf.trace.uuid
//! * timeline.internal.ctf.trace.version
//! * timeline.internal.ctf.trace.byte_order
//! * timeline.internal.ctf.trace.stream_count
//! * timeline.internal.ctf.trace.customization
//! * timeline.internal.ctf.trace.env.`<fields>`
//!
//! Stream Attrs
//! * timeline.internal.ctf.stream.id
//! * timeline.internal.ctf.stream.name
//!   - timeline.name
//! * timeline.internal.ctf.stream.size
//! * timeline.internal.ctf.stream.clock.frequency
//! * timeline.internal.ctf.stream.clock.offset_seconds
//! * timeline.internal.ctf.stream.clock.offset_cycles
//! * timeline.internal.ctf.stream.clock.precision
//! * timeline.internal.ctf.stream.clock.unix_epoch_origin
//! * timeline.internal.ctf.stream.clock.name
//! * timeline.internal.ctf.stream.clock.description
//! * timeline.internal.ctf.stream.clock.uuid
//!   - timeline.time_domain
//! * timeline.ingest_source
//!
//! Event Attrs
//! * event.internal.ctf.stream_id
//! * event.internal.ctf.id
//! * event.name
//! * event.internal.ctf.log_level
//! * event.internal.ctf.clock_snapshot
//!   - event.timestamp
//! * event.internal.ctf.header.<possibly.nested.fields>
//! * event.internal.ctf.common_context.<possibly.nested.fields>
//! * event.internal.ctf.specific_context.<possibly.nested.fields>
//! * event.internal.ctf.packet_context.<possibly.nested.fields>
//! * event.<possibly.nested.fields>
//!
//! # Mapping Conventions
//!
//! ## Enumeration classes
//!
//! Enumerations are given an Attr for the integer value and, when the value maps to a
//! label, a `.label` Attr.
//!
//! Example: `my_enum` is an enumeration with value 5 and label mapping "RUNNING"
//! * event.my_enum = 5
//! * event.my_enum.label = "RUNNING"
//!
//! Example: `my_enum` is an enumeration with value 7 and no label mapping
//! * event.my_enum = 7
//!
//! ## Arrays and sequences
//!
//! Arrays of unsigned bytes become a single hex string Attr, other arrays get one Attr per
//! element, suffixed with the element index.
//!
//! ## Variants
//!
//! Variants are transparent, the selected member is mapped in place of the variant.
#![deny(warnings, clippy::all)]

pub mod attrs;
pub mod bit_reader;
pub mod config;
pub mod customization;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod field;
pub mod input;
pub mod integer_literal;
pub mod metadata;
pub mod opts;
pub mod packet;
pub mod playback;
pub mod prelude;
pub mod properties;
pub mod timestamp;
pub mod tracing;
pub mod types;
