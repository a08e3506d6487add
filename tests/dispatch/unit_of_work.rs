use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reliable_dispatch::unit_of_work::{Session, SessionUnitOfWork};
use reliable_dispatch::{headers, BoxError, InMemoryTransport, ProcessOutcome, UnitOfWork};

use crate::support::*;

/// Records begin/commit/rollback calls into a shared journal.
struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    fail_begin: bool,
    fail_commit: bool,
}

impl UnitOfWork for Journal {
    fn begin(&mut self) -> Result<(), BoxError> {
        if self.fail_begin {
            self.entries.lock().push("begin-failed".into());
            return Err("database unreachable".into());
        }
        self.entries.lock().push("begin".into());
        Ok(())
    }

    fn end(&mut self, error: Option<&(dyn Error + 'static)>) -> Result<(), BoxError> {
        match error {
            None if self.fail_commit => {
                self.entries.lock().push("commit-failed".into());
                Err("constraint violation".into())
            }
            None => {
                self.entries.lock().push("commit".into());
                Ok(())
            }
            Some(reason) => {
                self.entries.lock().push(format!("rollback: {reason}"));
                Ok(())
            }
        }
    }
}

fn journal(fail_begin: bool, fail_commit: bool) -> (Arc<Mutex<Vec<String>>>, impl Fn() -> Journal + Send + Sync + 'static) {
    let entries = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&entries);
    (entries, move || Journal {
        entries: Arc::clone(&shared),
        fail_begin,
        fail_commit,
    })
}

#[test]
fn successful_handling_commits_once() {
    let transport = InMemoryTransport::new(input());
    let (entries, factory) = journal(false, false);
    let flaky = Flaky::failing(0);
    let processor = processor(&transport, pipeline(&flaky).with_unit_of_work(factory), policy(5, 3));
    transport.enqueue(place_order("o-1"));

    processor.poll(Duration::ZERO).unwrap();

    assert_eq!(*entries.lock(), vec!["begin", "commit"]);
}

#[test]
fn handler_failure_rolls_back_every_attempt() {
    let transport = InMemoryTransport::new(input());
    let (entries, factory) = journal(false, false);
    let flaky = Flaky::failing(1);
    let processor = processor(&transport, pipeline(&flaky).with_unit_of_work(factory), policy(5, 3));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(outcome, Some(ProcessOutcome::Processed { attempts: 2 }));
    let entries = entries.lock();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0], "begin");
    assert!(entries[1].starts_with("rollback: "));
    assert!(entries[1].contains("database deadlock"));
    assert_eq!(entries[2..], ["begin".to_string(), "commit".to_string()]);
}

#[test]
fn begin_failure_is_escalated_like_a_handler_failure() {
    init_tracing();
    let transport = InMemoryTransport::new(input());
    let (entries, factory) = journal(true, false);
    let flaky = Flaky::failing(0);
    let processor = processor(&transport, pipeline(&flaky).with_unit_of_work(factory), policy(2, 0));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert_eq!(outcome, Some(ProcessOutcome::Failed { retries: 0, attempts: 3 }));
    assert_eq!(flaky.calls(), 0);
    assert_eq!(entries.lock().len(), 3);
    let parked = transport.messages(&failures());
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].header(headers::EXCEPTION_TYPE), Some("UnitOfWork"));
}

#[test]
fn commit_failure_discards_outgoing_messages() {
    let transport = InMemoryTransport::new(input());
    let (_, factory) = journal(false, true);
    let flaky = Flaky::failing(0);
    let processor = processor(&transport, pipeline(&flaky).with_unit_of_work(factory), policy(0, 1));
    transport.enqueue(place_order("o-1"));

    let outcome = processor.poll(Duration::ZERO).unwrap();

    assert!(matches!(outcome, Some(ProcessOutcome::Deferred { retries: 1, .. })));
    assert!(transport.messages(&input().sub_scope("events")).is_empty());
}

struct CountingSession {
    saved: Arc<Mutex<u32>>,
}

impl Session for CountingSession {
    fn save_changes(&mut self) -> Result<(), BoxError> {
        *self.saved.lock() += 1;
        Ok(())
    }
}

#[test]
fn session_is_saved_only_for_successful_attempts() {
    let transport = InMemoryTransport::new(input());
    let saved = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&saved);
    let flaky = Flaky::failing(2);
    let pipeline = pipeline(&flaky).with_unit_of_work(move || {
        SessionUnitOfWork::new(CountingSession {
            saved: Arc::clone(&counter),
        })
    });
    let processor = processor(&transport, pipeline, policy(5, 3));
    transport.enqueue(place_order("o-1"));

    processor.poll(Duration::ZERO).unwrap();

    assert_eq!(flaky.calls(), 3);
    assert_eq!(*saved.lock(), 1);
}
