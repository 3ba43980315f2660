//! Core types, config, and errors for Parley.

pub mod config;
pub mod error;
pub mod types;
