//! `gatehouse-backend` — clients for the hosted backend-as-a-service.
//!
//! The hosted service is two REST surfaces behind one base URL: an identity
//! provider (token resolution, admin user mutations, password grants) and a
//! relational store queried row-by-row. Both are modeled as object-safe
//! async traits so the API server and the client gate can run against the
//! hosted implementation or the in-memory one interchangeably.

pub mod error;
pub mod hosted;
pub mod identity;
pub mod memory;
pub mod store;

pub use error::BackendError;
pub use hosted::{HostedAuthClient, HostedConfig, HostedGateStore, HostedRestStore};
pub use identity::{IdentityProvider, ProviderUser, TokenGrant};
pub use memory::MemoryBackend;
pub use store::AllowlistStore;
