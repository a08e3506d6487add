//! The operations the dispatch core needs from a
//! queueing system, and an in-memory implementation of them.
//!
//! ```text
//!   MessageProcessor ──try_receive/ack/requeue──▶ InputQueue
//!   OutboundDelivery ──create_sender/send───────▶ SenderFactory / MessageSender
//! ```

mod error;
mod in_memory;
mod traits;

pub use error::TransportError;
pub use in_memory::{InMemorySender, InMemoryTransport, RequeueRecord};
pub use traits::{InputQueue, MessageSender, SenderFactory};
