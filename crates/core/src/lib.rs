//! Core business logic for showcase.
//!
//! Services here own every multi-step mutation: each one runs in a single
//! database transaction and pushes live events only after it has committed.

pub mod services;

pub use services::*;
