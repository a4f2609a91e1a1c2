//! Call orchestration: session state machine, signal relay, and the
//! registries and timers they share.

pub mod active;
pub mod history;
pub mod locks;
pub mod manager;
pub mod outbox;
pub mod relay;
pub mod timeout;

pub use active::{ActiveCallRegistry, InMemoryActiveCalls};
pub use manager::CallSessionManager;
pub use relay::SignalRelay;
