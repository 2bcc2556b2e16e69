//! ARBOR Core — domain models, repository traits, and error taxonomy
//! for the multi-tenant account-hierarchy engine.
//!
//! This crate has no I/O dependencies. Storage and collaborator
//! implementations live in `arbor-db`; the resolution and aggregation
//! logic lives in `arbor-engine`.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{ArborError, ArborResult};
