//! First-level (immediate, in memory) and second-level (delayed,
//! tracked in the `Bus.Retries` header) escalation for failed messages.
//!
//! ## Escalation
//!
//! ```text
//!  receive ──▶ handlers ──ok──▶ ack
//!                 │
//!               error
//!                 ▼
//!   failures ≤ first_level_max ──yes──▶ re-invoke immediately
//!                 │ no
//!                 ▼
//!   retries+1 ≤ second_level_max ──yes──▶ requeue with Bus.Retries = retries+1, delayed
//!                 │ no
//!                 ▼
//!   copy to failure destination with diagnostics, ack
//! ```
//!
//! Handlers may run more than once for the same message id; deduplication
//! is the handler's responsibility.

mod diagnostics;
mod engine;
mod error;
mod policy;
mod processor;

pub use diagnostics::{annotate_failure, error_chain};
pub use engine::{RetryDecision, RetryEngine};
pub use error::ProcessError;
pub use policy::{DelayPolicy, RetryPolicy};
pub use processor::{MessageProcessor, ProcessOutcome};
