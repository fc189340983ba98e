//! Keeping client state aligned with the server

pub mod projects;
pub mod resync;
