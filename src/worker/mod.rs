//! Background receiver threads.
//!
//! Each [`Receiver`] owns one thread that polls the input queue and hands
//! every message to a shared [`MessageProcessor`](crate::retry::MessageProcessor).
//! Several receivers on the same processor compete for messages.

mod receiver;

pub use receiver::{Receiver, WorkerHandle, WorkerStats};
