//! Decide whether a type is a message, command, event,
//! express message or system message.
//!
//! ```ignore
//! let conventions = Conventions::builder()
//!     .with_system_messages("control", Convention::new(|t| t.has_attribute("control")))
//!     .build();
//!
//! conventions.validate(&known_types)?; // reject command+event types at startup
//! let c = conventions.classify(&MessageType::command("PlaceOrder"))?;
//! assert_eq!(c.kind(), MessageKind::Command);
//! ```

mod cache;
mod classifier;
mod descriptor;
mod error;

pub use cache::ConventionCache;
pub use classifier::{Classification, Convention, Conventions, ConventionsBuilder, MessageKind};
pub use descriptor::{Capability, Message, MessageType};
pub use error::{Axis, ConventionError};
