use super::scope::UnitOfWorkState;
use crate::BoxError;

/// Error type for unit-of-work operations.
#[derive(Debug, thiserror::Error)]
pub enum UnitOfWorkError {
    #[error("unit of work failed to begin: {0}")]
    BeginFailed(#[source] BoxError),
    #[error("unit of work failed to commit: {0}")]
    CommitFailed(#[source] BoxError),
    #[error("unit of work cannot {action} from state {from:?}")]
    InvalidTransition {
        from: UnitOfWorkState,
        action: &'static str,
    },
}
