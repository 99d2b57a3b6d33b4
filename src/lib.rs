//! paperflow - versioned stage skills and the paper stage workflow
//!
//! Two kinds of validated, versioned state share one SQLite file: the
//! admin-authored stage-skill catalog with its audit ledger, and per-user
//! paper sessions moving through thirteen writing stages.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod security;
pub mod storage;
pub mod test_utils;
pub mod workflow;

pub use error::{PfError, Result};
