//! Package transfer workflows

pub mod fsm;
pub mod progress;
pub mod recovery;
pub mod self_update;
pub mod upload;
