use crate::customization::CustomizationKind;
use crate::playback::StreamOrdering;
use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

/// Playback options shared by the binaries, merged over the configuration file.
#[derive(Parser, Debug, Clone, Default)]
pub struct PlaybackOpts {
    /// Use configuration from file
    #[clap(
        long = "config",
        name = "config file",
        env = "CTF_PLAYBACK_CONFIG",
        help_heading = "PLAYBACK CONFIGURATION"
    )]
    pub config_file: Option<PathBuf>,

    /// Tracer conventions to decode with: auto, lttng or perf
    #[clap(long, name = "customization", help_heading = "PLAYBACK CONFIGURATION")]
    pub customization: Option<CustomizationKind>,

    /// How events of different streams are interleaved: timestamp or sequential
    #[clap(long, name = "stream-ordering", help_heading = "PLAYBACK CONFIGURATION")]
    pub stream_ordering: Option<StreamOrdering>,

    /// Optionally provide a trace UUID, used when the metadata does not declare one
    #[clap(long, name = "trace-uuid", help_heading = "PLAYBACK CONFIGURATION")]
    pub trace_uuid: Option<Uuid>,

    /// Add offset-ns nanoseconds to the offset of every clock
    #[clap(long, name = "offset-ns", help_heading = "PLAYBACK CONFIGURATION")]
    pub clock_offset_ns: Option<i64>,

    /// Add offset-s seconds to the offset of every clock
    #[clap(long, name = "offset-s", help_heading = "PLAYBACK CONFIGURATION")]
    pub clock_offset_s: Option<i64>,

    /// Force the origin of every clock to be the Unix epoch
    #[clap(long, name = "unix-epoch", help_heading = "PLAYBACK CONFIGURATION")]
    pub force_clock_origin_unix_epoch: Option<bool>,

    /// Path to trace directories
    #[clap(name = "input", help_heading = "PLAYBACK CONFIGURATION")]
    pub inputs: Vec<PathBuf>,
}
