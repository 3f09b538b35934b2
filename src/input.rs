//! Where a trace's metadata and stream bytes come from.

use crate::error::Error;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const METADATA_FILE_NAME: &str = "metadata";

#[derive(Clone, Debug)]
enum Source {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// One binary stream of a trace.
#[derive(Clone, Debug)]
pub struct StreamSource {
    /// Position of the stream within its trace
    pub index: usize,
    pub name: String,
    source: Source,
}

impl StreamSource {
    pub fn open(&self) -> Result<Box<dyn BufRead + Send>, Error> {
        match &self.source {
            Source::File(p) => {
                let f = File::open(p).map_err(|source| Error::InputIo {
                    path: p.clone(),
                    source,
                })?;
                Ok(Box::new(BufReader::new(f)))
            }
            Source::Memory(bytes) => Ok(Box::new(Cursor::new(SharedBytes(bytes.clone())))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(p) => Some(p),
            Source::Memory(_) => None,
        }
    }

    /// Size in bytes, when it can be determined.
    pub fn len(&self) -> Option<u64> {
        match &self.source {
            Source::File(p) => fs::metadata(p).ok().map(|m| m.len()),
            Source::Memory(b) => Some(b.len() as u64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

#[derive(Clone, Debug)]
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A trace: one metadata blob and its binary streams.
#[derive(Clone, Debug)]
pub struct TraceInput {
    pub name: String,
    metadata: Source,
    streams: Vec<StreamSource>,
}

impl TraceInput {
    /// A CTF trace directory: a `metadata` file and one file per stream.
    ///
    /// Hidden files and subdirectories are ignored. Streams are ordered by file name.
    pub fn from_dir<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let io_err = |source| Error::InputIo {
            path: path.to_owned(),
            source,
        };
        let name = path.display().to_string();

        let metadata = path.join(METADATA_FILE_NAME);
        if !metadata.is_file() {
            return Err(Error::MissingMetadata(name));
        }

        let mut stream_paths = Vec::new();
        for entry in fs::read_dir(path).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name == METADATA_FILE_NAME || file_name.starts_with('.') {
                continue;
            }
            if entry.file_type().map_err(io_err)?.is_file() {
                stream_paths.push((file_name, entry.path()));
            }
        }
        if stream_paths.is_empty() {
            return Err(Error::NoStreams(name));
        }
        stream_paths.sort();

        let streams = stream_paths
            .into_iter()
            .enumerate()
            .map(|(index, (name, p))| StreamSource {
                index,
                name,
                source: Source::File(p),
            })
            .collect::<Vec<_>>();
        debug!(trace = %name, streams = streams.len(), "Found trace directory");

        Ok(TraceInput {
            name,
            metadata: Source::File(metadata),
            streams,
        })
    }

    /// A trace held in memory, streams given as (name, bytes).
    pub fn from_memory<N: Into<String>>(
        name: N,
        metadata: Vec<u8>,
        streams: Vec<(String, Vec<u8>)>,
    ) -> Result<Self, Error> {
        let name = name.into();
        if streams.is_empty() {
            return Err(Error::NoStreams(name));
        }
        Ok(TraceInput {
            name,
            metadata: Source::Memory(metadata.into()),
            streams: streams
                .into_iter()
                .enumerate()
                .map(|(index, (name, bytes))| StreamSource {
                    index,
                    name,
                    source: Source::Memory(bytes.into()),
                })
                .collect(),
        })
    }

    pub fn streams(&self) -> &[StreamSource] {
        &self.streams
    }

    pub fn metadata_bytes(&self) -> Result<Vec<u8>, Error> {
        match &self.metadata {
            Source::File(p) => fs::read(p).map_err(|source| Error::InputIo {
                path: p.clone(),
                source,
            }),
            Source::Memory(b) => Ok(b.to_vec()),
        }
    }
}
