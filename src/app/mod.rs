//! Application layer: configuration loading and component wiring.

pub mod config;
pub mod orchestrator;

pub use config::Settings;
pub use orchestrator::App;
