//! # pipecast
//!
//! Live HTTP fan-out of an encoded audio stream read from a named pipe.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌──────────────────────┐
//!   │  Encoder (external)  │  writes MP3 into the pipe
//!   └──────────┬───────────┘
//!              │ named pipe
//!              ▼
//!   ┌──────────────────────┐
//!   │ Source Reader        │  8 KiB reads, one task
//!   │ (source::reader)     │
//!   └──────────┬───────────┘
//!              │ deliver(chunk)
//!              ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │ Broadcaster (broadcast::broadcaster)                 │
//!   │  RwLock<HashMap<SubscriberId, bounded queue>>        │
//!   │  try_send to every queue, full queue = dropped chunk │
//!   └──────┬──────────────────┬──────────────────┬─────────┘
//!          ▼                  ▼                  ▼
//!   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!   │ ChunkReader │    │ ChunkReader │    │ ChunkReader │
//!   └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!          ▼                  ▼                  ▼
//!     HTTP response      HTTP response      HTTP response
//!     (audio/mpeg)       (audio/mpeg)       (audio/mpeg)
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod http;
pub mod relay;
pub mod source;

pub use broadcast::{Broadcaster, ChunkReader, Subscriber, SubscriberId};
pub use config::RelayConfig;
pub use error::{Error, Result};
pub use relay::Relay;

/// Application-wide constants
pub mod constants {
    /// Maximum bytes taken from the source per read
    pub const DEFAULT_CHUNK_SIZE: usize = 8192;

    /// Chunks a listener may fall behind before it starts missing data
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8000;

    /// Content type of every audio response
    pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
}
