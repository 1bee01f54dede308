/// Error enum for assignment runs, grouped by how the run reacts.
///
/// Categories:
/// - Config: malformed predicate or bad parameter, aborts the affected
///   team only; other teams keep their committed progress
/// - Conflict: a lead claim or capacity read lost a race, retried against
///   freshly-read state within the same bundle
/// - Lock: another run holds the pool lock
/// - Store/Io: persistence collaborator failure, halts the run
#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    // Config -- abort the affected team only
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed predicate for team {team}: {detail}")]
    MalformedPredicate { team: u32, detail: String },

    // Conflict -- retry locally against fresh state
    #[error("Assignment conflict: lead {lead_id} was claimed concurrently")]
    Conflict { lead_id: u32 },

    // Lock
    #[error("Pool lock held: {0}")]
    LockHeld(String),

    // Store / IO -- halt the run
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssignError {
    /// Returns true if the error is transient and the operation should be
    /// retried against freshly-read state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssignError::Conflict { .. })
    }

    /// Returns true if the error is a configuration problem that aborts
    /// only the team being processed.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AssignError::Config(_) | AssignError::MalformedPredicate { .. }
        )
    }
}

/// Bridge: allows `?` to convert `AssignError` to `String` in code that
/// uses `Result<T, String>` (CLI handlers, pool IO).
impl From<AssignError> for String {
    fn from(err: AssignError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        assert!(AssignError::Conflict { lead_id: 7 }.is_retryable());
        assert!(!AssignError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_config_category() {
        assert!(AssignError::Config("bundle_size must be >= 1".into()).is_config());
        assert!(AssignError::MalformedPredicate {
            team: 1,
            detail: "unknown field".into()
        }
        .is_config());
        assert!(!AssignError::Store("gone".into()).is_config());
    }

    #[test]
    fn test_string_bridge() {
        let s: String = AssignError::Conflict { lead_id: 3 }.into();
        assert!(s.contains("lead 3"));
    }
}
