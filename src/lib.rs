//! Reliable message dispatch for a service bus endpoint.
//!
//! A received [`TransportMessage`] is classified by [`Conventions`], run
//! through its handlers inside a unit-of-work scope by a [`Pipeline`], and
//! retried by a [`MessageProcessor`]: immediately at first, then deferred
//! through the input queue with a growing `Bus.Retries` header, and finally
//! copied to a failure destination. Messages produced by handlers leave
//! through [`OutboundDelivery`], which retries transient transport faults
//! with linear backoff and caches one sender per destination.

pub mod config;
pub mod conventions;
pub mod message;
pub mod outbound;
pub mod pipeline;
pub mod retry;
pub mod transport;
pub mod unit_of_work;
#[cfg(feature = "bus")]
pub mod worker;

/// Boxed error used at user-supplied seams (predicates, units of work).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::{BusConfig, ConfigError};
pub use conventions::{
    Capability, Classification, ConventionCache, ConventionError, Conventions, Message,
    MessageKind, MessageType,
};
pub use message::{headers, Address, MessageIntent, TransportMessage};
pub use outbound::{DeliveryError, DeliveryPolicy, OutboundDelivery, PermanentFailurePolicy};
pub use pipeline::{HandlerContext, HandlerError, Pipeline};
pub use retry::{DelayPolicy, MessageProcessor, ProcessError, ProcessOutcome, RetryPolicy};
pub use transport::{InMemoryTransport, InputQueue, MessageSender, SenderFactory, TransportError};
pub use unit_of_work::{UnitOfWork, UnitOfWorkError};
#[cfg(feature = "bus")]
pub use worker::{Receiver, WorkerHandle, WorkerStats};
