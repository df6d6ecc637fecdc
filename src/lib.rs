//! trailwatch library interface
//!
//! Exposes core modules for use by the binary and tests.

pub mod alerts;
pub mod config;
pub mod engine;
pub mod models;
pub mod normalizer;
pub mod notifier;
pub mod utils;
