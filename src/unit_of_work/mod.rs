//! Unit of work: brackets the handlers for each message with begin/end.
//!
//! A fresh instance of every registered unit of work is created per message,
//! so state never leaks between messages:
//!
//! ```text
//! NotStarted ──begin──▶ Begun ──end(None)──▶ Committed
//!                              └─end(Some)──▶ RolledBack
//! ```

mod error;
mod scope;
mod session;

pub use error::UnitOfWorkError;
pub use scope::{TrackedUnitOfWork, UnitOfWork, UnitOfWorkScope, UnitOfWorkState, UnitsOfWork};
pub use session::{Session, SessionUnitOfWork};
