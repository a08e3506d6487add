//! Inbound dispatch integration tests: handler invocation, units of work,
//! first-level and second-level retries, failure routing.

mod escalation;
mod redelivery;
mod unit_of_work;
