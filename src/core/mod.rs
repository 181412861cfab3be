//! Core shared definitions

pub mod constants;
