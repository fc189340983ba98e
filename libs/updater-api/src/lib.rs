//! Wire models for the remote update service API

pub mod models;

pub use models::*;
