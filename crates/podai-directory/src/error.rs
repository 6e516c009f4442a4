use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("agent {identity} has no presence on platform {platform}")]
    PresenceNotFound { identity: String, platform: String },
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
}
