//! Transport envelope types shared by every part of the dispatch core.

mod address;
pub mod headers;
mod transport_message;

pub use address::{Address, AddressError};
pub use transport_message::{MessageIntent, TransportMessage};
