//! # OTP Gate Common
//!
//! Shared types, error taxonomy, and constants used across OTP Gate components.
//!
//! ## Modules
//! - `types` - Core data structures (ChallengeRecord, wire envelopes, etc.)
//! - `error` - Ledger and request validation errors
//! - `constants` - Defaults and wire error codes

pub mod constants;
pub mod error;
pub mod types;

pub use error::{LedgerError, ValidationError};
pub use types::*;
