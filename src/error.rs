use std::fmt::Debug;

/// Errors reported by environments, agents, and solvers.
///
/// States and actions are opaque to this crate, so offending values are
/// captured as their `Debug` rendering at the point of failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum MdpError {
    #[error("action {action} is not legal in state {state}")]
    IllegalAction { state: String, action: String },

    #[error("state {state} is not in the declared state space")]
    UnknownState { state: String },

    #[error("sweep did not converge: delta {delta} still above threshold {threshold} after {sweeps} sweeps")]
    NonConvergence {
        sweeps: usize,
        delta: f64,
        threshold: f64,
    },

    #[error("non-terminal state {state} has no legal actions")]
    NoLegalActions { state: String },

    #[error("environment declares no states")]
    EmptyStateSpace,

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl MdpError {
    pub fn illegal_action(state: &impl Debug, action: &impl Debug) -> Self {
        Self::IllegalAction {
            state: format!("{state:?}"),
            action: format!("{action:?}"),
        }
    }

    pub fn unknown_state(state: &impl Debug) -> Self {
        Self::UnknownState {
            state: format!("{state:?}"),
        }
    }

    pub fn no_legal_actions(state: &impl Debug) -> Self {
        Self::NoLegalActions {
            state: format!("{state:?}"),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Convenience alias for results using the crate's error type
pub type Result<T> = std::result::Result<T, MdpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_action_display() {
        let err = MdpError::illegal_action(&(0, 1), &"Up");
        assert_eq!(err.to_string(), "action \"Up\" is not legal in state (0, 1)");
    }

    #[test]
    fn non_convergence_display() {
        let err = MdpError::NonConvergence {
            sweeps: 100,
            delta: 0.5,
            threshold: 0.001,
        };
        assert_eq!(
            err.to_string(),
            "sweep did not converge: delta 0.5 still above threshold 0.001 after 100 sweeps"
        );
    }

    #[test]
    fn unknown_state_display() {
        let err = MdpError::unknown_state(&(9, 9));
        assert_eq!(err.to_string(), "state (9, 9) is not in the declared state space");
    }
}
