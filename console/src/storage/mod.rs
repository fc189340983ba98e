//! Console settings on disk

pub mod layout;
pub mod settings;
