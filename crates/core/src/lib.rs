//! `gatehouse-core` — shared domain primitives.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, the email value object, and the gate error taxonomy.

pub mod email;
pub mod error;
pub mod id;

pub use email::Email;
pub use error::{GateError, GateResult};
pub use id::ProviderUserId;
