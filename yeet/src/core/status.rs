//! Coarse classification of CloudFormation stack statuses.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStatus {
    InProgress,
    Ok,
    Err,
}

impl StackStatus {
    /// Classify a native status string such as `UPDATE_ROLLBACK_COMPLETE`.
    ///
    /// Anything still moving (`*_IN_PROGRESS`, including cleanup and rollback
    /// phases) is in progress. Rollbacks, deletions and failures are terminal
    /// errors. Other `*_COMPLETE` states are terminal success. Unknown strings
    /// are treated as in progress so the deadline decides.
    pub fn classify(native: &str) -> Self {
        if native.ends_with("_IN_PROGRESS") {
            return Self::InProgress;
        }
        if native.ends_with("_FAILED") || native.contains("ROLLBACK") || native.starts_with("DELETE_")
        {
            return Self::Err;
        }
        if native.ends_with("_COMPLETE") {
            return Self::Ok;
        }
        Self::InProgress
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Ok => "ok",
            Self::Err => "err",
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
