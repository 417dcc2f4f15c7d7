//! HTTP front end

pub mod handlers;
pub mod server;

pub use server::{router, AppState, StreamServer};
