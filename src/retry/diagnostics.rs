//! Failure diagnostics written onto messages parked at the failure destination.

use std::error::Error;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::message::{headers, Address, TransportMessage};
use crate::pipeline::HandlerError;

/// Copy of `message` annotated with why and where it failed.
///
/// Body, id, correlation id and all existing headers are left unchanged.
pub fn annotate_failure(
    message: &TransportMessage,
    error: &HandlerError,
    failed_queue: &Address,
    first_level_attempts: u32,
) -> TransportMessage {
    let time_of_failure = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    message
        .clone()
        .with_header(headers::EXCEPTION_TYPE, error.kind())
        .with_header(headers::EXCEPTION_MESSAGE, error.to_string())
        .with_header(headers::EXCEPTION_STACK, error_chain(error))
        .with_header(headers::FAILED_QUEUE, failed_queue.to_string())
        .with_header(headers::TIME_OF_FAILURE, time_of_failure.to_string())
        .with_header(
            headers::FIRST_LEVEL_ATTEMPTS,
            first_level_attempts.to_string(),
        )
}

/// The error and its sources, one per line.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut lines = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}
