//! Live deployment log feed

pub mod client;
pub mod streamer;
