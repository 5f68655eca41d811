//! Budget records dashboard: remote sheet → cascading filters → table / xlsx.

pub mod app;
pub mod data;
pub mod settings;
pub mod state;
pub mod ui;
