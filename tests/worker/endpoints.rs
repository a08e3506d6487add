use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reliable_dispatch::{
    headers, Address, BusConfig, Conventions, HandlerError, InMemoryTransport, Message,
    MessageProcessor, MessageType, Pipeline, Receiver, TransportMessage, WorkerHandle,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Bill {
    order: String,
    amount: u64,
}

impl Message for Bill {
    fn message_type() -> MessageType {
        MessageType::command("Bill")
    }
}

#[derive(Serialize, Deserialize)]
struct Billed {
    order: String,
}

impl Message for Billed {
    fn message_type() -> MessageType {
        MessageType::message("Billed")
    }
}

fn config(queue: &str) -> BusConfig {
    BusConfig::from_json_str(&format!(
        r#"{{
            "input_queue": "{queue}",
            "failure_destination": "error",
            "first_level_max_retries": 1,
            "second_level_max_retries": 1,
            "second_level_delay": {{ "kind": "fixed", "delay": 0 }},
            "backoff_unit": 1
        }}"#
    ))
    .unwrap()
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn command_and_reply_round_trip_between_endpoints() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let transport = InMemoryTransport::new(Address::new("sales"));
    let billing_queue = transport.endpoint(Address::new("billing"));
    let sales_queue = transport.endpoint(Address::new("sales"));

    let billing = Pipeline::new(Address::new("billing"), Arc::new(Conventions::default()))
        .handle_typed(|ctx, bill: Bill| {
            assert_eq!(bill.amount, 42);
            ctx.reply(&Billed { order: bill.order })
        });
    let billed = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&billed);
    let sales = Pipeline::new(Address::new("sales"), Arc::new(Conventions::default()))
        .handle_typed(move |_, billed: Billed| {
            assert_eq!(billed.order, "o-1");
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<(), HandlerError>(())
        });

    let billing = Arc::new(
        MessageProcessor::from_config(billing, &config("billing"), billing_queue, transport.clone())
            .unwrap(),
    );
    let sales = Arc::new(
        MessageProcessor::from_config(sales, &config("sales"), sales_queue, transport.clone())
            .unwrap(),
    );
    let handles = vec![
        Receiver::spawn(billing, Duration::from_millis(5)),
        Receiver::spawn(sales, Duration::from_millis(5)),
    ];

    let bill = TransportMessage::json("cmd-1", "Bill", &Bill { order: "o-1".into(), amount: 42 })
        .unwrap()
        .with_reply_to(Address::new("sales"));
    transport.endpoint(Address::new("billing")).enqueue(bill);

    wait_until(|| billed.load(Ordering::SeqCst) == 1);
    let stats = WorkerHandle::stop_all(handles);

    assert_eq!(billed.load(Ordering::SeqCst), 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 0);
    assert!(transport.is_empty(&Address::new("error")));
}

#[test]
fn poison_message_is_parked_by_the_receiver() {
    let transport = InMemoryTransport::new(Address::new("billing"));
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let pipeline = Pipeline::new(Address::new("billing"), Arc::new(Conventions::default()))
        .handle(Bill::message_type(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::Rejected("card declined".into()))
        });
    let processor = Arc::new(
        MessageProcessor::from_config(pipeline, &config("billing"), transport.clone(), transport.clone())
            .unwrap(),
    );
    let handle = Receiver::spawn(processor, Duration::from_millis(5));

    transport.enqueue(
        TransportMessage::new("cmd-9", b"{}".to_vec()).with_header(headers::ENCLOSED_MESSAGE_TYPES, "Bill"),
    );
    wait_until(|| transport.len(&Address::new("error")) == 1);
    let stats = handle.stop();

    // Two immediate attempts per delivery, two deliveries.
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(stats.deferred, 1);
    assert_eq!(stats.failed, 1);
    let parked = transport.messages(&Address::new("error"));
    assert_eq!(parked[0].retries(), 1);
    assert_eq!(parked[0].header(headers::FAILED_QUEUE), Some("billing"));
}
