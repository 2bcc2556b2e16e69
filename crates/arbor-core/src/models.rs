//! Domain models for ARBOR.
//!
//! These are the core types shared across all crates.

pub mod account;
pub mod context;
pub mod grant;
