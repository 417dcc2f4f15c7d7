//! Fan-out core
//!
//! [`Broadcaster`] owns the live listener set; [`ChunkReader`] is the
//! per-connection handle that drains one subscription.

pub mod broadcaster;
pub mod reader;

pub use broadcaster::{Broadcaster, Subscriber, SubscriberId};
pub use reader::ChunkReader;
