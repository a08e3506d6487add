use std::time::Duration;

use reliable_dispatch::headers;
use reliable_dispatch::transport::InputQueue;
use reliable_dispatch::{InMemoryTransport, MessageIntent, ProcessOutcome};

use crate::support::*;

#[test]
fn success_on_first_attempt_publishes_and_acks() {
    init_tracing();
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::failing(0);
    let processor = processor(&transport, pipeline(&flaky), policy(5, 3));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(outcome, Some(ProcessOutcome::Processed { attempts: 1 }));
    let published = transport.messages(&input().sub_scope("events"));
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].message_type(), Some("OrderPlaced"));
    assert_eq!(published[0].message_intent, MessageIntent::Publish);
    assert_eq!(published[0].correlation_id.as_deref(), Some("corr-o-1"));
    assert_eq!(transport.acknowledged(), vec!["o-1".to_string()]);
}

#[test]
fn first_level_retries_run_the_handler_max_plus_one_times() {
    init_tracing();
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::always();
    let processor = processor(&transport, pipeline(&flaky), policy(5, 3));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(
        outcome,
        Some(ProcessOutcome::Deferred {
            retries: 1,
            delay: Duration::from_secs(10)
        })
    );
    assert_eq!(flaky.calls(), 6);

    let requeues = transport.requeues();
    assert_eq!(requeues.len(), 1);
    assert_eq!(requeues[0].retries, 1);
    assert_eq!(requeues[0].delay, Duration::from_secs(10));
    assert!(transport.messages(&failures()).is_empty());
    assert!(transport.messages(&input().sub_scope("events")).is_empty());
}

#[test]
fn transient_failure_within_first_level_never_reaches_second_level() {
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::failing(5);
    let processor = processor(&transport, pipeline(&flaky), policy(5, 3));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(outcome, Some(ProcessOutcome::Processed { attempts: 6 }));
    assert!(transport.requeues().is_empty());
    assert_eq!(processor.engine().tracked(), 0);
}

#[test]
fn retry_header_grows_by_one_per_deferral() {
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::always();
    let processor = processor(&transport, pipeline(&flaky), immediate_policy(0, 3));
    transport.enqueue(place_order("o-1"));

    for expected in 1..=3 {
        let message = transport.try_receive(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(message.retries(), expected - 1);
        let outcome = processor.process(message).unwrap();
        assert!(matches!(outcome, ProcessOutcome::Deferred { retries, .. } if retries == expected));
    }

    let retries: Vec<u32> = transport.requeues().iter().map(|r| r.retries).collect();
    assert_eq!(retries, vec![1, 2, 3]);
}

#[test]
fn exhausted_message_reaches_failure_destination_exactly_once() {
    init_tracing();
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::always();
    let processor = processor(&transport, pipeline(&flaky), policy(5, 3));
    let mut message = place_order("o-1");
    message.set_retries(3);
    transport.enqueue(message);

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(outcome, Some(ProcessOutcome::Failed { retries: 3, attempts: 6 }));
    assert_eq!(flaky.calls(), 6);
    assert!(transport.requeues().is_empty());
    assert_eq!(transport.acknowledged(), vec!["o-1".to_string()]);

    let parked = transport.messages(&failures());
    assert_eq!(parked.len(), 1);
    let parked = &parked[0];
    assert_eq!(parked.id, "o-1");
    assert_eq!(parked.correlation_id.as_deref(), Some("corr-o-1"));
    assert_eq!(parked.body_str(), Some(r#"{"id":"o-1"}"#));
    assert_eq!(parked.retries(), 3);
    assert_eq!(parked.header(headers::FAILED_QUEUE), Some("sales"));
    assert_eq!(parked.header(headers::EXCEPTION_TYPE), Some("Rejected"));
    assert_eq!(parked.header(headers::FIRST_LEVEL_ATTEMPTS), Some("6"));
    assert!(parked
        .header(headers::EXCEPTION_MESSAGE)
        .is_some_and(|m| m.contains("database deadlock")));
    assert!(parked.header(headers::TIME_OF_FAILURE).is_some());
}

#[test]
fn zero_second_level_retries_fails_straight_from_first_level() {
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::always();
    let processor = processor(&transport, pipeline(&flaky), policy(2, 0));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(outcome, Some(ProcessOutcome::Failed { retries: 0, attempts: 3 }));
    assert_eq!(transport.len(&failures()), 1);
}

#[test]
fn unknown_message_type_is_escalated_like_any_failure() {
    let transport = InMemoryTransport::new(input());
    let flaky = Flaky::failing(0);
    let processor = processor(&transport, pipeline(&flaky), policy(0, 0));
    transport.enqueue(
        reliable_dispatch::TransportMessage::new("x-1", Vec::new())
            .with_header(headers::ENCLOSED_MESSAGE_TYPES, "Mystery"),
    );

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert!(matches!(outcome, Some(ProcessOutcome::Failed { .. })));
    let parked = transport.messages(&failures());
    assert_eq!(parked[0].header(headers::EXCEPTION_TYPE), Some("UnknownMessageType"));
    assert_eq!(flaky.calls(), 0);
}
