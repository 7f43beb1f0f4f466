use thiserror::Error;

use crate::domain::utils::id::{NodeId, ResourceId, UserId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON document: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to build internal domain model: {0}")]
    ConversionError(String),

    /// No complete placement exists for the request. This is a normal negative answer, not a fault.
    #[error("Cluster request cannot be satisfied with the currently available resources")]
    Unsatisfiable,

    #[error("Invalid cluster request: {0}")]
    InvalidRequest(String),

    #[error("Node registry is unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("User {0} does not exist")]
    UserNotFound(UserId),

    #[error("User {0} is not allowed to perform this operation")]
    Forbidden(UserId),

    #[error("Invalid node registration: {0}")]
    InvalidRegistration(String),

    #[error("Probing node {node} failed: {reason}")]
    ProbeFailed { node: NodeId, reason: String },

    #[error("Node {0} is not available")]
    NodeUnavailable(NodeId),

    #[error("Resource {resource} does not exist on node {node}")]
    ResourceNotFound { node: NodeId, resource: ResourceId },

    #[error("Resource {resource} on node {node} is already occupied")]
    AlreadyOccupied { node: NodeId, resource: ResourceId },
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::RegistryUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
