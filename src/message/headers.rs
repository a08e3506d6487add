//! Well-known header keys.
//!
//! These keys are the only on-wire contract defined by the dispatch core.
//! Everything else in a message's header map belongs to the application or
//! the transport.

/// Number of second-level retries already performed. Absent means zero.
pub const RETRIES: &str = "Bus.Retries";

/// Logical message type names carried by the body, `;`-separated.
pub const ENCLOSED_MESSAGE_TYPES: &str = "Bus.EnclosedMessageTypes";

/// Send / Publish / Reply.
pub const MESSAGE_INTENT: &str = "Bus.MessageIntent";

/// Address replies should be sent to.
pub const REPLY_TO_ADDRESS: &str = "Bus.ReplyToAddress";

/// Time-to-be-received in milliseconds. Absent means the message never expires.
pub const TIME_TO_BE_RECEIVED: &str = "Bus.TimeToBeReceived";

/// Queue the message was taken from when it failed.
pub const FAILED_QUEUE: &str = "Bus.FailedQ";

/// Unix timestamp (milliseconds) of the terminal failure.
pub const TIME_OF_FAILURE: &str = "Bus.TimeOfFailure";

/// Kind of the error that exhausted all retries.
pub const EXCEPTION_TYPE: &str = "Bus.ExceptionInfo.ExceptionType";

/// Display text of the error that exhausted all retries.
pub const EXCEPTION_MESSAGE: &str = "Bus.ExceptionInfo.Message";

/// Source chain of the error, one cause per line.
pub const EXCEPTION_STACK: &str = "Bus.ExceptionInfo.StackTrace";

/// Immediate attempts made during the final delivery.
pub const FIRST_LEVEL_ATTEMPTS: &str = "Bus.ExceptionInfo.FirstLevelAttempts";

/// Parse the retry header value. Missing or malformed values count as zero.
pub fn parse_retries(value: Option<&str>) -> u32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}
