//! HTTP API: the three privileged admin handlers and their shared gate.

pub mod app;
pub mod authz;
pub mod context;
pub mod errors;
