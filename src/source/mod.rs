//! Upstream byte source

pub mod reader;

pub use reader::{pump, SourceReader, SourceState, SourceStats, StreamEnd};
