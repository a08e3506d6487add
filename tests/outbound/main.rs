//! Outbound delivery integration tests: backoff, exhaustion, permanent
//! failures and the per-destination sender cache.

mod backoff;
