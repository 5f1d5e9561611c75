//! Management services with validation and ownership checks.
//!
//! Every operation takes the calling user's id and refuses records owned by
//! someone else.

pub mod channel;
pub mod message;
pub mod routing;
pub mod topic;

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::domain::DomainError;
use crate::repository::StoreError;

pub use channel::{ChannelInput, ChannelService};
pub use message::{MessageDetail, MessagePage, MessageService};
pub use routing::{RoutingChanges, RoutingInput, RoutingService};
pub use topic::{generate_unique_key, random_webhook_key, TopicChanges, TopicInput, TopicService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            StoreError::Conflict { .. } => ServiceError::Conflict(err.to_string()),
            other => ServiceError::Store(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<CredentialError> for ServiceError {
    fn from(err: CredentialError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fail with `Forbidden` unless `owner` is the caller
fn ensure_owner(owner: i64, user_id: i64, what: &str) -> ServiceResult<()> {
    if owner != user_id {
        return Err(ServiceError::Forbidden(format!("No access to this {}", what)));
    }
    Ok(())
}

fn require_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}
