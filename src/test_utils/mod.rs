//! Shared test utilities for paperflow.

pub mod fixtures;
pub mod logging;
