//! Client-side session handling: local persistence, the login gate, and the
//! offline shell cache.

pub mod gate;
pub mod session;
pub mod shell_cache;
pub mod store;

pub use gate::{GateState, SessionGate};
pub use session::Session;
pub use shell_cache::{CachedAsset, FetchStrategy, ShellCache, ShellFetcher, strategy_for};
pub use store::SessionStore;
