//! Planguard - plan validation and repair engine
//!
//! Library half of the `planguard` binary: configuration, logging setup and
//! the offline plan check. The engine itself lives in the `planguard-*` crates.

pub mod check;
pub mod config;
pub mod logging;

pub use check::{check_plan, CheckReport};
pub use config::PlanguardConfig;
