//! Convention-checked handler dispatch for inbound messages.
//!
//! Register handlers per message type on a `Pipeline`. Each handler receives
//! a `HandlerContext` with access to the inbound message and can send,
//! publish or reply; those outgoing messages are released only when the
//! whole pipeline succeeds.
//!
//! ## Quick Start
//!
//! ```ignore
//! let pipeline = Pipeline::new(Address::new("sales"), Arc::new(Conventions::default()))
//!     .with_unit_of_work(|| SessionUnitOfWork::new(OrderSession::open()))
//!     .handle_typed(|ctx, order: PlaceOrder| {
//!         ctx.publish(&OrderPlaced { id: order.id })
//!     });
//!
//! pipeline.validate()?;
//! let outgoing = pipeline.invoke(&message)?;
//! ```

mod context;
mod error;
mod pipeline;

pub use context::{HandlerContext, OutgoingMessage, Route};
pub use error::HandlerError;
pub use pipeline::Pipeline;
