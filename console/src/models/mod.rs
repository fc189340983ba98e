//! Console-side models

pub mod forms;
