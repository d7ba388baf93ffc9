//! simulado-core — exam data model, batch planner, and scorer.
//!
//! This crate defines the fundamental types, collaborator traits, and
//! scoring logic the simulado session engine builds on.

pub mod error;
pub mod model;
pub mod planner;
pub mod scorer;
pub mod session;
pub mod traits;
