//! In-memory caches

pub mod config;
