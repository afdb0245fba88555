//! Domain records and validation findings.
//!
//! # Responsibility
//! - Define the entity contracts the context and repositories operate on.
//! - Define the validation map written by pre-action handlers.
//!
//! # Invariants
//! - Every persisted record has a store-assigned `i64` identity.
//! - Validation maps are transient and owned by their target.

pub mod entity;
pub mod student;
pub mod validation;
