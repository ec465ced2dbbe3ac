use thiserror::Error;

use crate::lifecycle::LifecycleError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("unknown service `{0}`")]
    UnknownService(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
