use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use reliable_dispatch::conventions::Convention;
use reliable_dispatch::{ConventionCache, Conventions, MessageType};

#[test]
fn concurrent_first_classification_agrees() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evaluations);
    let conventions = Arc::new(
        Conventions::builder()
            .defining_commands_as(Convention::new(move |t| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                t.name().ends_with("Command")
            }))
            .build(),
    );
    let barrier = Arc::new(Barrier::new(16));

    let results: Vec<bool> = (0..16)
        .map(|_| {
            let conventions = Arc::clone(&conventions);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                conventions
                    .is_command(&MessageType::new("ShipCommand"))
                    .unwrap()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert!(results.iter().all(|r| *r));
    // Racing threads may each evaluate once; later calls never do.
    let after_race = evaluations.load(Ordering::SeqCst);
    assert!((1..=16).contains(&after_race));
    assert!(conventions.is_command(&MessageType::new("ShipCommand")).unwrap());
    assert_eq!(evaluations.load(Ordering::SeqCst), after_race);
}

#[test]
fn cache_first_insert_wins_across_threads() {
    let cache = Arc::new(ConventionCache::<String>::new());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [true, false]
        .into_iter()
        .map(|answer| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .apply_convention::<str, std::convert::Infallible, _>("Order", |_| Ok(answer))
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results[0], results[1]);
    assert_eq!(cache.get("Order"), Some(results[0]));
}
