use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::outbound::Sleeper;
use crate::retry::{MessageProcessor, ProcessOutcome};
use crate::transport::{InputQueue, SenderFactory};

/// Statistics from a receiver thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    /// Messages whose handlers succeeded.
    pub processed: usize,
    /// Messages requeued for a second-level retry.
    pub deferred: usize,
    /// Messages moved to the failure destination.
    pub failed: usize,
    /// Queue or failure-routing errors.
    pub errors: usize,
    /// Number of poll cycles completed.
    pub polls: usize,
}

impl WorkerStats {
    /// Add another receiver's counters to these.
    pub fn merge(&mut self, other: &WorkerStats) {
        self.processed += other.processed;
        self.deferred += other.deferred;
        self.failed += other.failed;
        self.errors += other.errors;
        self.polls += other.polls;
    }

    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Processed { .. } => self.processed += 1,
            ProcessOutcome::Deferred { .. } => self.deferred += 1,
            ProcessOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Spawns receiver threads.
///
/// ## Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use reliable_dispatch::worker::Receiver;
///
/// let processor = Arc::new(MessageProcessor::new(pipeline, policy, queue, delivery, failures));
/// let handle = Receiver::spawn(processor.clone(), Duration::from_millis(50));
///
/// // ... messages arrive ...
///
/// let stats = handle.stop();
/// println!("processed {} messages", stats.processed);
/// ```
pub struct Receiver;

impl Receiver {
    /// Spawn one receiver thread.
    ///
    /// `poll_interval` bounds how long a receive waits for a message, and so
    /// how quickly the thread notices a stop signal while the queue is idle.
    pub fn spawn<Q, F, S>(
        processor: Arc<MessageProcessor<Q, F, S>>,
        poll_interval: Duration,
    ) -> WorkerHandle
    where
        Q: InputQueue + 'static,
        F: SenderFactory + 'static,
        S: Sleeper + 'static,
    {
        Self::spawn_with_id(processor, poll_interval, "receiver-0")
    }

    /// Spawn one receiver thread with a custom worker id used in logs.
    pub fn spawn_with_id<Q, F, S>(
        processor: Arc<MessageProcessor<Q, F, S>>,
        poll_interval: Duration,
        worker_id: &str,
    ) -> WorkerHandle
    where
        Q: InputQueue + 'static,
        F: SenderFactory + 'static,
        S: Sleeper + 'static,
    {
        let (stop_tx, stop_rx) = channel();
        let worker_id = worker_id.to_string();

        let handle = thread::spawn(move || {
            let mut stats = WorkerStats::default();
            info!(worker = %worker_id, queue = %processor.queue().address(), "Receiver started");

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;

                // A message in hand is always finished, retries included,
                // before the stop signal is checked again.
                match processor.poll(poll_interval) {
                    Ok(Some(outcome)) => stats.record(&outcome),
                    Ok(None) => {}
                    Err(err) => {
                        stats.errors += 1;
                        error!(worker = %worker_id, error = %err, "Receive failed");
                    }
                }
            }

            debug!(worker = %worker_id, ?stats, "Receiver stopped");
            stats
        });

        WorkerHandle {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Spawn `count` receivers competing on the same processor.
    pub fn spawn_many<Q, F, S>(
        processor: Arc<MessageProcessor<Q, F, S>>,
        poll_interval: Duration,
        count: usize,
    ) -> Vec<WorkerHandle>
    where
        Q: InputQueue + 'static,
        F: SenderFactory + 'static,
        S: Sleeper + 'static,
    {
        (0..count)
            .map(|i| {
                Self::spawn_with_id(
                    Arc::clone(&processor),
                    poll_interval,
                    &format!("receiver-{i}"),
                )
            })
            .collect()
    }
}

/// Handle to a receiver thread. Drop or call `stop()` to shut down.
pub struct WorkerHandle {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl WorkerHandle {
    /// Signal the receiver to stop and wait for it to finish.
    pub fn stop(mut self) -> WorkerStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => WorkerStats::default(),
        }
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Stop a group of receivers and sum their statistics.
    pub fn stop_all(handles: Vec<WorkerHandle>) -> WorkerStats {
        for handle in &handles {
            handle.signal_stop();
        }
        handles.into_iter().fold(WorkerStats::default(), |mut total, h| {
            total.merge(&h.stop());
            total
        })
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
