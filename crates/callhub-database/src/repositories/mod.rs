//! PostgreSQL implementations of the collaborator traits.

pub mod call;
pub mod directory;
pub mod message;

pub use call::CallRepository;
pub use directory::DirectoryRepository;
pub use message::MessageRepository;
