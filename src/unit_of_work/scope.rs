//! Begin/End bracketing of handler execution.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::error::UnitOfWorkError;
use crate::BoxError;

/// A begin/end bracket around the handlers for one message.
///
/// `end(None)` commits; `end(Some(err))` must not commit.
pub trait UnitOfWork: Send {
    fn begin(&mut self) -> Result<(), BoxError>;

    fn end(&mut self, error: Option<&(dyn Error + 'static)>) -> Result<(), BoxError>;
}

/// Lifecycle of a unit of work. `Committed` and `RolledBack` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOfWorkState {
    NotStarted,
    Begun,
    Committed,
    RolledBack,
}

/// A unit of work plus its enforced state machine.
pub struct TrackedUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    state: UnitOfWorkState,
}

impl TrackedUnitOfWork {
    pub fn new(inner: Box<dyn UnitOfWork>) -> Self {
        Self {
            inner,
            state: UnitOfWorkState::NotStarted,
        }
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    pub fn begin(&mut self) -> Result<(), UnitOfWorkError> {
        if self.state != UnitOfWorkState::NotStarted {
            return Err(UnitOfWorkError::InvalidTransition {
                from: self.state,
                action: "begin",
            });
        }
        self.inner.begin().map_err(UnitOfWorkError::BeginFailed)?;
        self.state = UnitOfWorkState::Begun;
        Ok(())
    }

    /// Commit outstanding work.
    pub fn commit(&mut self) -> Result<(), UnitOfWorkError> {
        self.expect_begun("commit")?;
        match self.inner.end(None) {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                Ok(())
            }
            Err(err) => {
                // Nothing was committed; the message will be retried.
                self.state = UnitOfWorkState::RolledBack;
                Err(UnitOfWorkError::CommitFailed(err))
            }
        }
    }

    /// Roll back; the reason is logged and passed to the unit of work.
    pub fn rollback(&mut self, reason: &(dyn Error + 'static)) -> Result<(), UnitOfWorkError> {
        self.expect_begun("roll back")?;
        warn!(reason = %reason, "Rolling back unit of work");
        self.state = UnitOfWorkState::RolledBack;
        if let Err(err) = self.inner.end(Some(reason)) {
            // Rollback has no compensating action to fail; just report.
            error!(error = %err, "Unit of work failed while rolling back");
        }
        Ok(())
    }

    fn expect_begun(&self, action: &'static str) -> Result<(), UnitOfWorkError> {
        if self.state == UnitOfWorkState::Begun {
            Ok(())
        } else {
            Err(UnitOfWorkError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn UnitOfWork> + Send + Sync>;

/// Registered unit-of-work factories. Each message gets fresh instances.
#[derive(Clone, Default)]
pub struct UnitsOfWork {
    factories: Vec<Factory>,
}

impl fmt::Debug for UnitsOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitsOfWork")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl UnitsOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; called once per message.
    pub fn register<F, U>(&mut self, factory: F)
    where
        F: Fn() -> U + Send + Sync + 'static,
        U: UnitOfWork + 'static,
    {
        self.factories
            .push(Arc::new(move || Box::new(factory()) as Box<dyn UnitOfWork>));
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Create the instances for one message.
    pub fn scope(&self) -> UnitOfWorkScope {
        UnitOfWorkScope {
            units: self
                .factories
                .iter()
                .map(|f| TrackedUnitOfWork::new(f()))
                .collect(),
        }
    }
}

/// The units of work for a single message.
pub struct UnitOfWorkScope {
    units: Vec<TrackedUnitOfWork>,
}

impl UnitOfWorkScope {
    /// Begin every unit in registration order.
    ///
    /// If one fails, those already begun are rolled back with the begin
    /// error and the error is returned.
    pub fn begin(&mut self) -> Result<(), UnitOfWorkError> {
        debug!(units = self.units.len(), "Beginning units of work");
        for index in 0..self.units.len() {
            if let Err(err) = self.units[index].begin() {
                for begun in self.units[..index].iter_mut().rev() {
                    let _ = begun.rollback(&err);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// End every unit in reverse order: commit on success, roll back on
    /// failure.
    ///
    /// Once a commit fails the message counts as failed, so the units not
    /// yet ended are rolled back with that error. Returns the commit error.
    pub fn end(&mut self, outcome: Option<&(dyn Error + 'static)>) -> Result<(), UnitOfWorkError> {
        let mut commit_error: Option<UnitOfWorkError> = None;
        for unit in self.units.iter_mut().rev() {
            let reason = match (outcome, &commit_error) {
                (Some(reason), _) => Some(reason),
                (None, Some(err)) => Some(err as &(dyn Error + 'static)),
                (None, None) => None,
            };
            let result = match reason {
                None => unit.commit(),
                Some(reason) => unit.rollback(reason),
            };
            if let Err(err) = result {
                error!(error = %err, "Unit of work failed to end");
                commit_error.get_or_insert(err);
            }
        }
        commit_error.map_or(Ok(()), Err)
    }

    pub fn states(&self) -> Vec<UnitOfWorkState> {
        self.units.iter().map(TrackedUnitOfWork::state).collect()
    }
}
