//! Typed failures raised while resolving configuration and driving a deployment.
//!
//! Orchestration code works in `anyhow::Result`; these variants travel inside
//! the `anyhow::Error` chain so callers can `downcast_ref` to classify them.

use std::time::Duration;

use thiserror::Error;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum YeetError {
    /// Malformed YAML or template source.
    #[error("parse {origin}: {message}")]
    Parse { origin: String, message: String },

    /// Two values could not be combined (e.g. a non-list `_include`).
    #[error("merge `{key}`: {message}")]
    Merge { key: String, message: String },

    /// An `_include` entry could not be read, fetched or parsed.
    #[error("include {locator}")]
    Include {
        locator: String,
        #[source]
        source: Source,
    },

    /// The orchestration service rejected the deployment document.
    #[error("submit stack {stack}")]
    Submission {
        stack: String,
        #[source]
        source: Source,
    },

    /// Fetching the stack snapshot or its events failed mid-loop.
    #[error("poll stack {stack}")]
    Poll {
        stack: String,
        #[source]
        source: Source,
    },

    /// The stack was still in progress when the deadline passed.
    #[error("stack {stack} operation wait timed out, took longer than {}", format_wait(.waited))]
    Timeout { stack: String, waited: Duration },
}

impl YeetError {
    pub fn parse(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn merge(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Merge {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn include(locator: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Include {
            locator: locator.into(),
            source: source.into(),
        }
    }

    pub fn submission(stack: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Submission {
            stack: stack.into(),
            source: source.into(),
        }
    }

    pub fn poll(stack: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Poll {
            stack: stack.into(),
            source: source.into(),
        }
    }
}

fn format_wait(waited: &Duration) -> String {
    let secs = waited.as_secs();
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
