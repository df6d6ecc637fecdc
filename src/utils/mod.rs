//! Utility modules for trailwatch

pub mod time;

pub use time::to_utc_timestamp;
