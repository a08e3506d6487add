//! Lazily created, per-destination senders.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::message::Address;
use crate::transport::{SenderFactory, TransportError};

/// Caches one sender per destination.
///
/// Creation happens under the destination's shard lock, so concurrent first
/// sends to the same destination construct exactly one sender and every
/// caller gets that instance. Failed creations leave no entry behind.
pub struct SenderCache<F: SenderFactory> {
    factory: F,
    senders: DashMap<Address, Arc<F::Sender>>,
}

impl<F: SenderFactory> SenderCache<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            senders: DashMap::new(),
        }
    }

    /// Get the sender for `destination`, creating it on first use.
    pub fn get_or_create(&self, destination: &Address) -> Result<Arc<F::Sender>, TransportError> {
        if let Some(sender) = self.senders.get(destination) {
            return Ok(Arc::clone(sender.value()));
        }

        match self.senders.entry(destination.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let sender = Arc::new(self.factory.create_sender(destination)?);
                debug!(destination = %destination, "Created sender");
                entry.insert(Arc::clone(&sender));
                Ok(sender)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}
