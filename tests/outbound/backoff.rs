use reliable_dispatch::{Address, DeliveryError, TransportError};

use crate::support::*;

#[test]
fn succeeds_after_transient_failures_with_growing_pauses() {
    init_tracing();
    let transport = ScriptedTransport::new([Step::Busy, Step::Disabled, Step::Busy]);
    let (delivery, sleeper) = delivery(&transport, policy(5));

    delivery.send(&message("m-1"), &Address::new("billing")).unwrap();

    assert_eq!(transport.sends(), 4);
    assert_eq!(sleeper.pauses(), secs(&[10, 20, 30]));
    assert_eq!(transport.delivered().len(), 1);
}

#[test]
fn gives_up_after_max_delivery_count_attempts() {
    init_tracing();
    let transport = ScriptedTransport::new(vec![Step::Busy; 10]);
    let (delivery, sleeper) = delivery(&transport, policy(5));

    let err = delivery
        .send(&message("m-1"), &Address::new("billing"))
        .unwrap_err();

    match err {
        DeliveryError::Exhausted {
            destination,
            attempts,
            last,
        } => {
            assert_eq!(destination, Address::new("billing"));
            assert_eq!(attempts, 5);
            assert!(matches!(last, TransportError::ServerBusy(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.sends(), 5);
    assert_eq!(sleeper.pauses(), secs(&[10, 20, 30, 40]));
    assert!(transport.delivered().is_empty());
}

#[test]
fn single_attempt_policy_never_sleeps() {
    let transport = ScriptedTransport::new([Step::Busy]);
    let (delivery, sleeper) = delivery(&transport, policy(1));

    let err = delivery.send(&message("m-1"), &Address::new("billing"));

    assert!(matches!(err, Err(DeliveryError::Exhausted { attempts: 1, .. })));
    assert!(sleeper.pauses().is_empty());
}

#[test]
fn each_call_starts_a_fresh_attempt_count() {
    let transport = ScriptedTransport::new([Step::Busy, Step::Busy]);
    let (delivery, sleeper) = delivery(&transport, policy(2));

    assert!(delivery.send(&message("m-1"), &Address::new("billing")).is_err());
    delivery.send(&message("m-2"), &Address::new("billing")).unwrap();

    assert_eq!(sleeper.pauses(), secs(&[10]));
    assert_eq!(transport.delivered()[0].1.id, "m-2");
}

#[test]
fn publish_retries_against_the_events_topic() {
    let transport = ScriptedTransport::new([Step::Busy]);
    let (delivery, sleeper) = delivery(&transport, policy(3));

    delivery.publish(&message("e-1")).unwrap();

    let delivered = transport.delivered();
    assert_eq!(delivered[0].0, Address::new("sales.events"));
    assert_eq!(sleeper.pauses(), secs(&[10]));
}

#[test]
fn huge_backoff_unit_saturates_instead_of_overflowing() {
    let transport = ScriptedTransport::new([Step::Busy, Step::Busy]);
    let mut policy = policy(3);
    policy.backoff_unit = std::time::Duration::MAX;
    let (delivery, sleeper) = delivery(&transport, policy);

    delivery.send(&message("m-1"), &Address::new("billing")).unwrap();

    assert_eq!(
        sleeper.pauses(),
        vec![std::time::Duration::MAX, std::time::Duration::MAX]
    );
}
