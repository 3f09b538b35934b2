#![deny(warnings, clippy::all)]

use clap::Parser;
use ctf_playback::error::Error as CtfError;
use ctf_playback::input::METADATA_FILE_NAME;
use ctf_playback::{prelude::*, tracing::try_init_tracing_subscriber};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Play back CTF traces, printing every timeline and event
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    #[clap(flatten)]
    pub playback_opts: PlaybackOpts,

    /// Stop after printing this many events
    #[clap(long, name = "limit", help_heading = "OUTPUT")]
    pub limit: Option<u64>,

    /// Only print the timeline attributes
    #[clap(long, name = "timelines-only", help_heading = "OUTPUT")]
    pub timelines_only: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ctf(#[from] CtfError),

    #[error(transparent)]
    Config(#[from] ctf_playback::config::ConfigError),

    #[error("At least one CTF containing input path is required.")]
    MissingInputs,
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    try_init_tracing_subscriber()?;

    let intr = Interruptor::new();
    let interruptor = intr.clone();
    ctrlc::set_handler(move || {
        if intr.is_set() {
            // 128 (fatal error signal "n") + 2 (control-c is fatal error signal 2)
            std::process::exit(130);
        } else {
            intr.set();
        }
    })?;

    let cfg = PlaybackConfig::load_merge_with_opts(opts.playback_opts).map_err(Error::from)?;

    if cfg.inputs.is_empty() {
        return Err(Error::MissingInputs.into());
    }
    for p in cfg.inputs.iter() {
        if !p.join(METADATA_FILE_NAME).exists() {
            warn!(
                "Input path '{}' does not contain a metadata file",
                p.display()
            );
        }
    }

    let printed = Arc::new(AtomicU64::new(0));
    for p in cfg.inputs.iter() {
        if interruptor.is_set() {
            break;
        }

        let input = TraceInput::from_dir(p).map_err(Error::from)?;
        let playback =
            Playback::with_customization_kind(input, cfg.customization, cfg.metadata_options())
                .map_err(Error::from)?
                .with_ordering(cfg.stream_ordering)
                .with_interruptor(interruptor.clone());

        let props = CtfProperties::new(
            playback.input(),
            playback.metadata(),
            playback.customization().name(),
        );
        {
            let mut out = std::io::stdout().lock();
            for (index, tid, attr_kvs) in props.timelines() {
                writeln!(out, "timeline {index} {tid}")?;
                for (k, v) in attr_kvs {
                    writeln!(out, "  {k} = {v}")?;
                }
            }
        }
        if opts.timelines_only {
            continue;
        }

        let count = printed.clone();
        let limit = opts.limit;
        let limit_intr = interruptor.clone();
        playback
            .customization()
            .callbacks()
            .register(move |e: &DecodedEvent<'_>| {
                let attrs = e.event.attrs(Some(e.sequence_number), e.cpu);
                let line = attrs
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(std::io::stdout(), "[{}] {line}", e.stream.index)
                    .map_err(|e| CtfError::Callback(e.to_string()))?;

                let n = count.fetch_add(1, Ordering::Relaxed) + 1;
                if matches!(limit, Some(l) if n >= l) {
                    limit_intr.set();
                }
                Ok(())
            })
            .map_err(Error::from)?;

        let summary = playback.run().map_err(Error::from)?;
        debug!(
            trace = %playback.input().name,
            events = summary.events,
            packets = summary.packets,
            "Finished trace"
        );
    }

    Ok(())
}
