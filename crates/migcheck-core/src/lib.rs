//! # migcheck-core
//!
//! Core value types shared by the migcheck crates:
//!
//! - [`MigcheckError`] - the single error type threaded through every
//!   fallible API.
//! - [`warnings`] - severity levels and the canonical catalog of migration
//!   safety warnings.
//! - [`locks`] - the PostgreSQL lock-mode vocabulary and its severity
//!   classification.
//!
//! The types here are deliberately plain values: warnings compare
//! structurally so that checks can return catalog constants and downstream
//! aggregation can deduplicate by equality.

pub mod error;
pub mod locks;
pub mod warnings;

pub use error::MigcheckError;
pub use locks::{LockMode, LockRecord};
pub use warnings::{Level, Warning};
