//! Error taxonomy of the reconciliation core

use thiserror::Error;

/// Failure of a reconcile, wait or relationship operation
///
/// Everything except [`ResourceError::Provider`] is non-recoverable: the
/// calling step aborts and an operator has to intervene. A wait that runs
/// out of attempts is not an error at all.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Identifier resolves to nothing
    #[error("{kind} '{identifier}' not found")]
    NotFound { kind: String, identifier: String },

    /// Name resolves to more than one resource
    #[error("multiple {kind}s match name '{name}' ({count} matches)")]
    Ambiguous {
        kind: String,
        name: String,
        count: usize,
    },

    /// Adopted resource fails relationship verification
    #[error("{0}")]
    Conflict(String),

    /// Provider reported a terminal error status
    #[error("{kind} {id} is in error state '{status}'")]
    Errored {
        kind: String,
        id: String,
        status: String,
    },

    /// Transport or API failure from the provider
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl ResourceError {
    pub fn not_found(kind: &str, identifier: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            identifier: identifier.to_string(),
        }
    }

    /// Relationship mismatch between two external resources
    pub fn not_connected(kind: &str, id: &str, related_kind: &str, related_id: &str) -> Self {
        Self::Conflict(format!(
            "Expected external resources {} {} and {} {} to be connected",
            kind, id, related_kind, related_id
        ))
    }

    /// Whether retrying the same call later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}
