//! Property tests for classification.

use proptest::prelude::*;
use reliable_dispatch::conventions::Convention;
use reliable_dispatch::{Capability, ConventionError, Conventions, MessageKind, MessageType};

/// Generate a message type with an arbitrary capability set.
fn arb_message_type() -> impl Strategy<Value = MessageType> {
    (
        "[A-Z][a-zA-Z]{2,12}",
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(name, message, command, event, express)| {
            let mut t = MessageType::new(name);
            if message {
                t = t.with_capability(Capability::Message);
            }
            if command {
                t = t.with_capability(Capability::Command);
            }
            if event {
                t = t.with_capability(Capability::Event);
            }
            if express {
                t = t.express();
            }
            t
        })
}

/// Name-suffix conventions, the way unobtrusive endpoints define them.
fn by_name() -> Conventions {
    Conventions::builder()
        .defining_commands_as(Convention::new(|t| t.name().contains("Command")))
        .defining_events_as(Convention::new(|t| t.name().ends_with("Event")))
        .build()
}

proptest! {
    #[test]
    fn classification_is_stable(t in arb_message_type()) {
        let conventions = Conventions::default();
        let first = conventions.classify(&t);
        let second = conventions.classify(&t);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "classification changed between calls"),
        }
    }

    #[test]
    fn never_both_command_and_event(t in arb_message_type()) {
        let conventions = Conventions::default();
        match conventions.classify(&t) {
            Ok(c) => prop_assert!(!(c.is_command && c.is_event)),
            Err(ConventionError::Ambiguous { types }) => {
                prop_assert!(t.has(Capability::Command) && t.has(Capability::Event));
                prop_assert_eq!(types, vec![t.name().to_string()]);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn commands_and_events_are_messages(t in arb_message_type()) {
        let conventions = Conventions::default();
        if let Ok(c) = conventions.classify(&t) {
            if c.is_command || c.is_event {
                prop_assert!(c.is_message);
            }
            prop_assert_eq!(c.is_express, t.is_express_flagged());
        }
    }

    #[test]
    fn first_answer_wins_for_a_name(name in "[A-Z][a-z]{2,8}(Command|Event)?") {
        let conventions = by_name();
        let before = conventions.is_command(&MessageType::new(name.clone())).unwrap();
        // Same name, different structure: the cached answer is keyed by name.
        let after = conventions
            .is_command(&MessageType::event(name.clone()).with_attribute("changed"))
            .unwrap();
        prop_assert_eq!(before, after);
        prop_assert_eq!(before, name.ends_with("Command"));
    }
}

#[test]
fn validate_lists_every_ambiguous_type() {
    let conventions = by_name();
    let types = [
        MessageType::new("ShipCommand"),
        MessageType::new("ShipCommandEvent"),
        MessageType::new("Shipped"),
    ];

    let err = conventions.validate(&types).unwrap_err();

    match err {
        ConventionError::Ambiguous { types } => assert_eq!(types, vec!["ShipCommandEvent"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn kinds_follow_precedence() {
    let conventions = Conventions::default();
    let kind = |t: MessageType| conventions.classify(&t).unwrap().kind();

    assert_eq!(kind(MessageType::command("Ship")), MessageKind::Command);
    assert_eq!(kind(MessageType::event("Shipped")), MessageKind::Event);
    assert_eq!(kind(MessageType::message("Note")), MessageKind::Message);
    assert_eq!(kind(MessageType::new("Plain")), MessageKind::Unclassified);
    assert_eq!(kind(MessageType::marker(Capability::Command)), MessageKind::Unclassified);
}
