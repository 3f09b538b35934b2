use crate::customization::CustomizationKind;
use crate::metadata::MetadataOptions;
use crate::opts::PlaybackOpts;
use crate::playback::StreamOrdering;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const CONFIG_ENV_VAR: &str = "CTF_PLAYBACK_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read the configuration file '{}'. {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse the configuration file '{}'. {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlaybackConfig {
    /// Trace directories
    pub inputs: Vec<PathBuf>,

    pub customization: CustomizationKind,

    pub stream_ordering: StreamOrdering,

    /// Optionally provide a trace UUID, used when the metadata does not declare one.
    ///
    /// This is useful for constructing deterministic timeline IDs.
    pub trace_uuid: Option<Uuid>,

    /// Added to the offset of every clock
    pub clock_offset_s: Option<i64>,

    /// Added to the offset of every clock
    pub clock_offset_ns: Option<i64>,

    pub force_clock_origin_unix_epoch: Option<bool>,
}

impl PlaybackConfig {
    pub fn try_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_owned(),
            source,
        })
    }

    /// Load the configuration file, if any, and apply the command line options over it.
    pub fn load_merge_with_opts(opts: PlaybackOpts) -> Result<Self, ConfigError> {
        let cfg = if let Some(cfg_path) = &opts.config_file {
            Self::try_from_file(cfg_path)?
        } else if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
            Self::try_from_file(Path::new(&env_path))?
        } else {
            Self::default()
        };

        Ok(PlaybackConfig {
            inputs: if opts.inputs.is_empty() {
                cfg.inputs
            } else {
                opts.inputs
            },
            customization: opts.customization.unwrap_or(cfg.customization),
            stream_ordering: opts.stream_ordering.unwrap_or(cfg.stream_ordering),
            trace_uuid: opts.trace_uuid.or(cfg.trace_uuid),
            clock_offset_s: opts.clock_offset_s.or(cfg.clock_offset_s),
            clock_offset_ns: opts.clock_offset_ns.or(cfg.clock_offset_ns),
            force_clock_origin_unix_epoch: opts
                .force_clock_origin_unix_epoch
                .or(cfg.force_clock_origin_unix_epoch),
        })
    }

    pub fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions {
            clock_offset_s: self.clock_offset_s.unwrap_or_default(),
            clock_offset_ns: self.clock_offset_ns.unwrap_or_default(),
            force_clock_origin_unix_epoch: self.force_clock_origin_unix_epoch.unwrap_or_default(),
            trace_uuid: self.trace_uuid,
        }
    }
}
