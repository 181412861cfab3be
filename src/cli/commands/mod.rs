//! CLI command implementations
//!
//! Each module contains the command definitions and execution logic
//! for a specific category of operations.

pub mod configure;
pub mod deploy;
pub mod diagnose;
pub mod identity;
pub mod list;
pub mod shell;
pub mod status;
