//! Cross-platform agent directory.
//!
//! Maps a chain identity to its presence and reputation on every platform it
//! has registered with, and answers filter-based discovery queries with a
//! linear scan.

mod directory;
mod error;

pub use directory::{
    AgentDirectory, AgentRegistration, DiscoveryFilters, DiscoveryResult, PresenceRegistration,
};
pub use error::DirectoryError;
