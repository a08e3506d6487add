//! Processing of one received message: handlers, retries, escalation.

use std::time::Duration;

use tracing::{debug, error, warn};

use super::diagnostics::annotate_failure;
use super::engine::{RetryDecision, RetryEngine};
use super::error::ProcessError;
use super::policy::RetryPolicy;
use crate::config::{BusConfig, ConfigError};
use crate::message::{Address, TransportMessage};
use crate::outbound::{OutboundDelivery, Sleeper, ThreadSleeper};
use crate::pipeline::{HandlerError, OutgoingMessage, Pipeline, Route};
use crate::transport::{InputQueue, SenderFactory};

/// Terminal result of processing one delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Handlers succeeded and the message was acknowledged.
    Processed { attempts: u32 },
    /// Requeued for a delayed second-level retry.
    Deferred { retries: u32, delay: Duration },
    /// Parked at the failure destination and acknowledged.
    Failed { retries: u32, attempts: u32 },
}

/// Drives a received message through the pipeline until it succeeds, is
/// deferred, or is parked.
///
/// ## Example
///
/// ```ignore
/// let processor = MessageProcessor::new(pipeline, config.retry_policy(), queue, delivery, config.failure_destination);
/// if let Some(message) = queue.try_receive(Duration::from_millis(100))? {
///     match processor.process(message)? {
///         ProcessOutcome::Processed { .. } => {}
///         ProcessOutcome::Deferred { retries, .. } => println!("retry {retries} scheduled"),
///         ProcessOutcome::Failed { .. } => println!("parked"),
///     }
/// }
/// ```
pub struct MessageProcessor<Q: InputQueue, F: SenderFactory, S: Sleeper = ThreadSleeper> {
    pipeline: Pipeline,
    engine: RetryEngine,
    queue: Q,
    delivery: OutboundDelivery<F, S>,
    failure_destination: Address,
}

impl<Q: InputQueue, F: SenderFactory> MessageProcessor<Q, F, ThreadSleeper> {
    /// Build a processor from configuration.
    ///
    /// Fails before any message is received when the configuration is
    /// invalid or a handled type is both a command and an event.
    pub fn from_config(
        pipeline: Pipeline,
        config: &BusConfig,
        queue: Q,
        factory: F,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        pipeline
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;

        let delivery = OutboundDelivery::new(
            factory,
            config.input_queue.clone(),
            config.delivery_policy(),
        );
        Ok(Self::new(
            pipeline,
            config.retry_policy(),
            queue,
            delivery,
            config.failure_destination.clone(),
        ))
    }
}

impl<Q: InputQueue, F: SenderFactory, S: Sleeper> MessageProcessor<Q, F, S> {
    pub fn new(
        pipeline: Pipeline,
        policy: RetryPolicy,
        queue: Q,
        delivery: OutboundDelivery<F, S>,
        failure_destination: Address,
    ) -> Self {
        Self {
            pipeline,
            engine: RetryEngine::new(policy),
            queue,
            delivery,
            failure_destination,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn engine(&self) -> &RetryEngine {
        &self.engine
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn delivery(&self) -> &OutboundDelivery<F, S> {
        &self.delivery
    }

    /// Receive and process at most one message.
    pub fn poll(&self, timeout: Duration) -> Result<Option<ProcessOutcome>, ProcessError> {
        match self.queue.try_receive(timeout)? {
            Some(message) => self.process(message).map(Some),
            None => Ok(None),
        }
    }

    /// Process a message received from the input queue.
    ///
    /// Handler failures never escape: they are retried in place, deferred
    /// through the input queue, or parked. Errors returned here come from
    /// the queue or the failure destination.
    pub fn process(&self, mut message: TransportMessage) -> Result<ProcessOutcome, ProcessError> {
        self.engine.observe(&mut message);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let err = match self.attempt(&message) {
                Ok(()) => {
                    self.engine.record_success(&message.id);
                    self.queue.ack(&message.id)?;
                    debug!(message_id = %message.id, attempts, "Message processed");
                    return Ok(ProcessOutcome::Processed { attempts });
                }
                Err(err) => err,
            };

            match self.engine.record_failure(&message) {
                RetryDecision::RetryImmediately { failures } => {
                    debug!(
                        message_id = %message.id,
                        failures,
                        max = self.engine.policy().first_level_max_retries,
                        error = %err,
                        "First level retry"
                    );
                }
                RetryDecision::Defer { retries, delay } => {
                    warn!(
                        message_id = %message.id,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "First level retries exhausted, deferring to second level retry"
                    );
                    self.queue.requeue_with_retries(message, retries, delay)?;
                    return Ok(ProcessOutcome::Deferred { retries, delay });
                }
                RetryDecision::Fail { retries } => {
                    self.park(message, &err, attempts)?;
                    return Ok(ProcessOutcome::Failed { retries, attempts });
                }
            }
        }
    }

    fn attempt(&self, message: &TransportMessage) -> Result<(), HandlerError> {
        let outgoing = self.pipeline.invoke(message)?;
        self.dispatch(outgoing)
    }

    fn dispatch(&self, outgoing: Vec<OutgoingMessage>) -> Result<(), HandlerError> {
        for OutgoingMessage { route, message } in outgoing {
            match &route {
                Route::Send(destination) | Route::Reply(destination) => {
                    self.delivery.send(&message, destination)?
                }
                Route::Publish(None) => self.delivery.publish(&message)?,
                Route::Publish(Some(topic)) => self.delivery.publish_to(&message, topic)?,
            }
        }
        Ok(())
    }

    fn park(
        &self,
        message: TransportMessage,
        err: &HandlerError,
        attempts: u32,
    ) -> Result<(), ProcessError> {
        let failed = annotate_failure(&message, err, self.queue.address(), attempts);

        if let Err(source) = self.delivery.send_strict(&failed, &self.failure_destination) {
            error!(
                message_id = %message.id,
                failure_destination = %self.failure_destination,
                error = %source,
                "Could not park failed message, returning it to the input queue"
            );
            let delay = self.engine.policy().delay.delay_for(message.retries().max(1));
            let message_id = message.id.clone();
            self.queue.requeue(message, delay)?;
            return Err(ProcessError::FailureRouting { message_id, source });
        }

        self.queue.ack(&message.id)?;
        error!(
            message_id = %message.id,
            retries = message.retries(),
            attempts,
            failure_destination = %self.failure_destination,
            error = %err,
            "Message exhausted all retries and was moved to the failure destination"
        );
        Ok(())
    }
}
