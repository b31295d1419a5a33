//! Common utilities and shared types for showcase.
//!
//! This crate provides foundational components used across all showcase crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: Monotonic ULID identifiers via [`IdGenerator`]
//! - **Clock**: Injectable time source via [`Clock`]
//! - **Storage**: Blob store used for avatar and media URLs
//!
//! # Example
//!
//! ```no_run
//! use showcase_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use clock::{Clock, ClockService, ManualClock, SystemClock};
pub use config::{Config, ConnectionPolicy};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{BlobStore, BlobStoreService, LocalStorage};
