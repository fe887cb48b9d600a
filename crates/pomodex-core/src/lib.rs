pub mod auth;
pub mod cloud;
pub mod config;
pub mod db;
pub mod docker;
pub mod error;
pub mod ids;
pub mod scheduler;
pub mod snapshot;

pub use error::{PomodexError, Result};
