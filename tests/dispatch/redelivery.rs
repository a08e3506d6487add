use std::time::Duration;

use reliable_dispatch::{InMemoryTransport, ProcessOutcome};

use crate::support::*;

#[test]
fn redelivery_without_header_increment_still_advances() {
    init_tracing();
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::always();
    let processor = processor(&transport, pipeline(&flaky), policy(0, 2));

    // The transport hands the same message back with its original header,
    // as if the requeue had been lost.
    let outcome = processor.process(place_order("o-1")).unwrap();
    assert!(matches!(outcome, ProcessOutcome::Deferred { retries: 1, .. }));

    let outcome = processor.process(place_order("o-1")).unwrap();
    assert!(matches!(outcome, ProcessOutcome::Deferred { retries: 2, .. }));

    let outcome = processor.process(place_order("o-1")).unwrap();
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));
    assert_eq!(transport.len(&failures()), 1);
}

#[test]
fn retry_state_is_cleared_after_success() {
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::failing(1);
    let processor = processor(&transport, pipeline(&flaky), immediate_policy(0, 3));
    transport.enqueue(place_order("o-1"));

    let first = processor.poll(Duration::ZERO).unwrap();
    assert!(matches!(first, Some(ProcessOutcome::Deferred { retries: 1, .. })));

    let second = processor.poll(Duration::from_secs(1)).unwrap();
    assert_eq!(second, Some(ProcessOutcome::Processed { attempts: 1 }));
    assert_eq!(processor.engine().tracked(), 0);
}
