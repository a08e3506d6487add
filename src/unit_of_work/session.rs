//! A unit of work that saves a session on commit.

use std::error::Error;

use tracing::{info, warn};

use super::scope::UnitOfWork;
use crate::BoxError;

/// Accumulates changes during handling and persists them on demand.
pub trait Session: Send {
    fn save_changes(&mut self) -> Result<(), BoxError>;
}

/// Commits by calling [`Session::save_changes`]; rolls back by logging the
/// reason and dropping the session's pending changes.
///
/// ```ignore
/// units.register(|| SessionUnitOfWork::new(OrderSession::open()));
/// ```
pub struct SessionUnitOfWork<S: Session> {
    session: S,
}

impl<S: Session> SessionUnitOfWork<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

impl<S: Session> UnitOfWork for SessionUnitOfWork<S> {
    fn begin(&mut self) -> Result<(), BoxError> {
        info!("UoW begin");
        Ok(())
    }

    fn end(&mut self, error: Option<&(dyn Error + 'static)>) -> Result<(), BoxError> {
        match error {
            None => {
                info!("UoW commit");
                self.session.save_changes()
            }
            Some(reason) => {
                warn!(reason = %reason, "UoW rollback");
                Ok(())
            }
        }
    }
}
