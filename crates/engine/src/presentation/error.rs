use thiserror::Error;

/// Recoverable faults raised while orchestrating presentation work.
///
/// None of these abort a sequence outright: each is logged where it happens and
/// the affected phase degrades to a no-op, is ignored, or is released.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PresentationError {
    #[error("{role} '{name}' is not present in the active scene")]
    MissingCollaborator { role: &'static str, name: String },
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfiguration { field: &'static str, message: String },
    #[error("transition through '{gate}' ignored: another transition is in flight")]
    ConcurrencyViolation { gate: String },
    #[error("load of '{destination}' did not complete within {waited_seconds:.2}s")]
    LoadTimedOut {
        destination: String,
        waited_seconds: f32,
    },
}

impl PresentationError {
    pub fn missing(role: &'static str, name: impl Into<String>) -> Self {
        Self::MissingCollaborator {
            role,
            name: name.into(),
        }
    }
}
