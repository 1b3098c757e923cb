//! Animencode - batch anime encoding tool
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod job;
pub mod pipeline;
