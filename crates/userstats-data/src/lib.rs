//! Data layer for userstats.
//!
//! Discovers and reads the parquet user files, deduplicates users across
//! files, derives the normalised fields and accumulates the frequency and
//! cross tables for a single streaming pass.

pub mod aggregator;
pub mod analysis;
pub mod dedup;
pub mod normalizer;
pub mod reader;

#[cfg(test)]
mod fixtures;

pub use userstats_core as core;
