//! Core types shared across the gala crates: configuration, the unified
//! error enum, and the domain models (events, prompts, uploads).

pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
