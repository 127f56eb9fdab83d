//! Domain types
//!
//! - Newtypes for validated remote paths, session identifiers and publish modes
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
