pub use crate::attrs::{AttrVal, EventAttrKey, TimelineAttrKey};
pub use crate::config::PlaybackConfig;
pub use crate::customization::{
    Customization, CustomizationKind, DecodedEvent, LttngCustomization, PerfCustomization,
};
pub use crate::event::Event;
pub use crate::input::{StreamSource, TraceInput};
pub use crate::metadata::{Metadata, MetadataOptions, MetadataParser};
pub use crate::opts::PlaybackOpts;
pub use crate::playback::{Playback, PlaybackSummary, StreamOrdering};
pub use crate::properties::{CtfProperties, CtfStreamProperties, CtfTraceProperties};
pub use crate::types::Interruptor;
