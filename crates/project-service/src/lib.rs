//! Pomodex project service: HTTP API, orchestrator, and inactivity sweeper.

pub mod config;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod sweeper;

pub use config::Configuration;
pub use orchestrator::Orchestrator;
