//! `gatehouse-auth` — the access-control decision engine (pure, no IO).
//!
//! This crate is intentionally decoupled from HTTP and storage. Callers fetch
//! allow-list rows and configuration however they like, then ask this crate
//! for a decision. Everything here is deterministic and panic-free.

pub mod decision;
pub mod gate;
pub mod principal;
pub mod request;

pub use decision::{AccessDecision, AllowlistEntry, AllowlistRow, DenialReason, evaluate_allowlist};
pub use gate::{GlobalConfig, gate_decision, login_permitted};
pub use principal::Principal;
pub use request::{PrivilegedAction, PrivilegedFields};
