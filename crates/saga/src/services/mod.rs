//! External collaborator traits and in-memory fakes.

pub mod directory;

pub use directory::{ExternalDirectory, InMemoryDirectory};
