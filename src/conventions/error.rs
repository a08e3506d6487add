use std::fmt;

use crate::BoxError;

/// The classification axis a convention answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Message,
    Command,
    Event,
    Express,
    System,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Message => "Message",
            Axis::Command => "Command",
            Axis::Event => "Event",
            Axis::Express => "Express",
            Axis::System => "System message",
        };
        f.write_str(name)
    }
}

/// Error type for convention evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ConventionError {
    /// A convention predicate failed. Nothing was cached for the type.
    #[error("failed to evaluate {axis} convention for {type_name}: {source}")]
    Predicate {
        axis: Axis,
        type_name: String,
        #[source]
        source: BoxError,
    },
    /// Types that satisfy both the command and the event convention.
    #[error("types qualify as both command and event: {}", .types.join(", "))]
    Ambiguous { types: Vec<String> },
}
