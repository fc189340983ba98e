//! HTTP access to the update service

pub mod api;
pub mod client;
pub mod config;
pub mod deployments;
pub mod events;
pub mod upload;
