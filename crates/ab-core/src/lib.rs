//! ad-board/crates/ab-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the Ad Board.

pub mod error;
pub mod forms;
pub mod jobs;
pub mod lifecycle;
pub mod listing;
pub mod models;
pub mod notifications;
pub mod services;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
