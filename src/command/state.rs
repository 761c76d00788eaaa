//! Outcome state of a pipeline step.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enumerated outcome of one pipeline step.
///
/// Once a context reaches [`DeploymentState::HasError`] no further command
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Nothing has run yet.
    #[default]
    Unknown,
    /// A command is executing.
    Running,
    /// The last command succeeded.
    Success,
    /// The last command completed without achieving its goal.
    Unsuccessful,
    /// A command hit an internal failure. Always terminal.
    HasError,
    /// The pipeline finished. Always terminal.
    Done,
}

impl DeploymentState {
    /// Returns true for the error state.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::HasError)
    }

    /// Returns true for states that end the pipeline regardless of the
    /// transition table.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::HasError | Self::Done)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Running => "running",
            Self::Success => "success",
            Self::Unsuccessful => "unsuccessful",
            Self::HasError => "error",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(DeploymentState::HasError.is_terminal());
        assert!(DeploymentState::Done.is_terminal());
        assert!(!DeploymentState::Success.is_terminal());
        assert!(DeploymentState::HasError.is_error());
        assert_eq!(DeploymentState::default(), DeploymentState::Unknown);
        assert_eq!(DeploymentState::Unsuccessful.to_string(), "unsuccessful");
    }
}
