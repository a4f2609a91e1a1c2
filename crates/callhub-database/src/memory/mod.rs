//! In-process implementations of the collaborator traits.
//!
//! Used by the `memory` provider and by tests. Nothing survives a restart.

pub mod call;
pub mod directory;
pub mod history;

pub use call::MemoryCallStore;
pub use directory::MemoryDirectory;
pub use history::MemoryHistorySink;
