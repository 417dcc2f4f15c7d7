//! Upstream pipe reader
//!
//! Opens the source once and pumps fixed-size reads into the broadcaster
//! until the writer goes away or the read fails. There is no retry: the
//! upstream is expected to live as long as the relay, and when it stops the
//! listeners simply stop receiving data.

use bytes::Bytes;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::broadcast::Broadcaster;
use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::error::SourceError;

/// How the read loop finished when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Zero-byte read: the writer closed its end
    Eof,
}

/// Lifecycle of the upstream reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Opening,
    Streaming,
    Ended,
    Failed,
}

impl SourceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SourceState::Opening,
            1 => SourceState::Streaming,
            2 => SourceState::Ended,
            _ => SourceState::Failed,
        }
    }
}

/// Counters published by the reader
#[derive(Debug)]
pub struct SourceStats {
    chunks_read: AtomicU64,
    bytes_read: AtomicU64,
    state: AtomicU8,
}

impl SourceStats {
    pub fn new() -> Self {
        Self {
            chunks_read: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            state: AtomicU8::new(SourceState::Opening as u8),
        }
    }

    pub fn chunks_read(&self) -> u64 {
        self.chunks_read.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SourceState {
        SourceState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: SourceState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn record(&self, n: usize) {
        self.chunks_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }
}

impl Default for SourceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader bound to one upstream path
#[derive(Debug, Clone)]
pub struct SourceReader {
    path: PathBuf,
    chunk_size: usize,
    stats: Arc<SourceStats>,
}

impl SourceReader {
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            chunk_size: chunk_size.max(1),
            stats: Arc::new(SourceStats::new()),
        }
    }

    /// Reader with the default 8 KiB chunk size
    pub fn with_default_chunk(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DEFAULT_CHUNK_SIZE)
    }

    /// Shared handle to the reader's counters
    pub fn stats(&self) -> Arc<SourceStats> {
        self.stats.clone()
    }

    /// Open the source and relay it until it ends
    ///
    /// For a named pipe, opening waits until a writer appears.
    pub async fn run(&self, broadcaster: &Broadcaster) -> Result<StreamEnd, SourceError> {
        tracing::info!(path = %self.path.display(), "Opening audio source");

        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(source) => {
                self.stats.set_state(SourceState::Failed);
                return Err(SourceError::Open {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        tracing::info!(
            path = %self.path.display(),
            chunk_size = self.chunk_size,
            "Audio source opened"
        );

        pump(file, broadcaster, self.chunk_size, &self.stats).await
    }
}

/// Relay `source` into `broadcaster` in reads of at most `chunk_size` bytes
///
/// Each non-empty read is delivered as exactly the bytes read. A zero-byte
/// read ends the loop cleanly; any other error ends it with
/// [`SourceError::Read`].
pub async fn pump<R>(
    mut source: R,
    broadcaster: &Broadcaster,
    chunk_size: usize,
    stats: &SourceStats,
) -> Result<StreamEnd, SourceError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    stats.set_state(SourceState::Streaming);

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                stats.set_state(SourceState::Failed);
                return Err(SourceError::Read(e));
            }
        };

        if n == 0 {
            stats.set_state(SourceState::Ended);
            tracing::info!(
                chunks = stats.chunks_read(),
                bytes = stats.bytes_read(),
                "Audio source reached end of stream"
            );
            return Ok(StreamEnd::Eof);
        }

        stats.record(n);
        broadcaster.deliver(Bytes::copy_from_slice(&buffer[..n]));
    }
}
