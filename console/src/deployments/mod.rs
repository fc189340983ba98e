//! Deployment records: history list and file changes

pub mod changes;
pub mod history;
