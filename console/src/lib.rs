//! Updater Console Library
//!
//! Client-side state and workflows of the update service operator console.

pub mod app;
pub mod cache;
pub mod deployments;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod logstream;
pub mod models;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod versioning;
pub mod view;
pub mod workflow;
