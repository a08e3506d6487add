//! In-memory transport for testing and single-process scenarios.
//!
//! Implements both [`InputQueue`] (for the local endpoint) and
//! [`SenderFactory`] (for any destination) over shared in-process queues:
//! - Thread-safe (clone to share across threads)
//! - Delayed requeues become visible only after their delay
//! - Every ack, requeue and sender creation is recorded for inspection

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::TransportError;
use super::traits::{InputQueue, MessageSender, SenderFactory};
use crate::message::{Address, TransportMessage};

struct Pending {
    message: TransportMessage,
    visible_at: Instant,
}

/// A requeue observed by the in-memory transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequeueRecord {
    pub message_id: String,
    pub retries: u32,
    pub delay: Duration,
}

#[derive(Default)]
struct State {
    queues: Mutex<HashMap<Address, VecDeque<Pending>>>,
    in_flight: Mutex<HashMap<String, TransportMessage>>,
    acked: Mutex<Vec<String>>,
    requeues: Mutex<Vec<RequeueRecord>>,
    missing: Mutex<HashSet<Address>>,
    senders_created: AtomicUsize,
}

/// In-memory transport.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use reliable_dispatch::message::{Address, TransportMessage};
/// use reliable_dispatch::transport::{InMemoryTransport, InputQueue};
///
/// let transport = InMemoryTransport::new(Address::new("orders"));
/// transport.enqueue(TransportMessage::new("msg-1", b"{}".to_vec()));
///
/// let message = transport.try_receive(Duration::from_millis(10)).unwrap().unwrap();
/// transport.ack(&message.id).unwrap();
/// assert_eq!(transport.acknowledged(), vec!["msg-1".to_string()]);
/// ```
#[derive(Clone)]
pub struct InMemoryTransport {
    local: Address,
    state: Arc<State>,
}

impl InMemoryTransport {
    /// Create a transport whose input queue is `local`.
    pub fn new(local: Address) -> Self {
        Self {
            local,
            state: Arc::new(State::default()),
        }
    }

    /// A handle on the same queues that receives from a different input queue.
    pub fn endpoint(&self, local: Address) -> Self {
        Self {
            local,
            state: Arc::clone(&self.state),
        }
    }

    /// Place a message directly on the local input queue.
    pub fn enqueue(&self, message: TransportMessage) {
        self.push(&self.local.clone(), message, Duration::ZERO);
    }

    /// Make sender creation for `destination` fail with `NotFound`.
    pub fn remove_queue(&self, destination: &Address) {
        self.state.missing.lock().insert(destination.clone());
        self.state.queues.lock().remove(destination);
    }

    /// Messages currently waiting on a queue (visible or delayed).
    pub fn messages(&self, queue: &Address) -> Vec<TransportMessage> {
        self.state
            .queues
            .lock()
            .get(queue)
            .map(|q| q.iter().map(|p| p.message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, queue: &Address) -> usize {
        self.state.queues.lock().get(queue).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, queue: &Address) -> bool {
        self.len(queue) == 0
    }

    /// Ids of acknowledged messages, in order.
    pub fn acknowledged(&self) -> Vec<String> {
        self.state.acked.lock().clone()
    }

    pub fn requeues(&self) -> Vec<RequeueRecord> {
        self.state.requeues.lock().clone()
    }

    /// Received messages that were neither acknowledged nor requeued.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.lock().len()
    }

    pub fn senders_created(&self) -> usize {
        self.state.senders_created.load(Ordering::SeqCst)
    }

    fn push(&self, queue: &Address, message: TransportMessage, delay: Duration) {
        self.state
            .queues
            .lock()
            .entry(queue.clone())
            .or_default()
            .push_back(Pending {
                message,
                visible_at: Instant::now() + delay,
            });
    }

    fn take_visible(&self) -> Option<TransportMessage> {
        let mut queues = self.state.queues.lock();
        let queue = queues.get_mut(&self.local)?;
        let now = Instant::now();
        let position = queue.iter().position(|p| p.visible_at <= now)?;
        queue.remove(position).map(|p| p.message)
    }
}

impl InputQueue for InMemoryTransport {
    fn address(&self) -> &Address {
        &self.local
    }

    fn try_receive(&self, timeout: Duration) -> Result<Option<TransportMessage>, TransportError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(message) = self.take_visible() {
                self.state
                    .in_flight
                    .lock()
                    .insert(message.id.clone(), message.clone());
                return Ok(Some(message));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn ack(&self, message_id: &str) -> Result<(), TransportError> {
        self.state.in_flight.lock().remove(message_id);
        self.state.acked.lock().push(message_id.to_string());
        Ok(())
    }

    fn requeue(&self, message: TransportMessage, delay: Duration) -> Result<(), TransportError> {
        self.state.in_flight.lock().remove(&message.id);
        self.state.requeues.lock().push(RequeueRecord {
            message_id: message.id.clone(),
            retries: message.retries(),
            delay,
        });
        self.push(&self.local.clone(), message, delay);
        Ok(())
    }
}

/// Sender bound to one in-memory queue.
pub struct InMemorySender {
    destination: Address,
    transport: InMemoryTransport,
}

impl MessageSender for InMemorySender {
    fn send(&self, message: &TransportMessage) -> Result<(), TransportError> {
        if self.transport.state.missing.lock().contains(&self.destination) {
            return Err(TransportError::NotFound(self.destination.clone()));
        }
        self.transport
            .push(&self.destination, message.clone(), Duration::ZERO);
        Ok(())
    }
}

impl SenderFactory for InMemoryTransport {
    type Sender = InMemorySender;

    fn create_sender(&self, destination: &Address) -> Result<InMemorySender, TransportError> {
        if self.state.missing.lock().contains(destination) {
            return Err(TransportError::NotFound(destination.clone()));
        }
        self.state.senders_created.fetch_add(1, Ordering::SeqCst);
        Ok(InMemorySender {
            destination: destination.clone(),
            transport: self.clone(),
        })
    }
}
