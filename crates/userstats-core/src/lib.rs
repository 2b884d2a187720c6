//! Shared building blocks for userstats: the error type, the record and
//! frequency-table model, run configuration, semi-structured field decoding
//! and number formatting.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{Result, StatsError};
