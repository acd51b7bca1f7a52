//! Structured error events.
//!
//! None of these abort a run. They are embedded in the manifest and handed to
//! the error reporter; only the CLI turns them into prose.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::ProjectId;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryError {
    /// Project files of different languages in one directory.
    #[error("{dir}: overlapping project files {}", files.join(", "))]
    Overlapping { dir: String, files: Vec<String> },

    /// The walk of a subtree did not finish before the deadline.
    #[error("{subtree}: walk timed out after {timeout_secs}s")]
    TimedOut { subtree: String, timeout_secs: u64 },

    #[error("{path}: {message}")]
    Walk { path: String, message: String },
}

/// A descriptor that could not be parsed; its project is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{project}: malformed descriptor {descriptor}: {message}")]
pub struct MalformedDescriptorError {
    pub project: ProjectId,
    pub descriptor: String,
    pub message: String,
}

/// Hard constraints on one node that no single version satisfies.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{package}: conflicting constraints {}", constraints.join(", "))]
pub struct ConflictError {
    pub package: String,
    pub constraints: Vec<String>,
    pub projects: Vec<ProjectId>,
}

/// The version lookup could not answer for a package.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{package}: version lookup unavailable: {reason}")]
pub struct LookupUnavailable {
    pub package: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorEvent {
    #[error(transparent)]
    Discovery(DiscoveryError),

    #[error(transparent)]
    MalformedDescriptor(MalformedDescriptorError),

    #[error(transparent)]
    Conflict(ConflictError),

    #[error(transparent)]
    LookupUnavailable(LookupUnavailable),

    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

impl ErrorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ErrorEvent::Discovery(_) => "discovery",
            ErrorEvent::MalformedDescriptor(_) => "malformed-descriptor",
            ErrorEvent::Conflict(_) => "conflict",
            ErrorEvent::LookupUnavailable(_) => "lookup-unavailable",
            ErrorEvent::Io { .. } => "io",
        }
    }
}

impl From<DiscoveryError> for ErrorEvent {
    fn from(e: DiscoveryError) -> Self {
        ErrorEvent::Discovery(e)
    }
}

impl From<MalformedDescriptorError> for ErrorEvent {
    fn from(e: MalformedDescriptorError) -> Self {
        ErrorEvent::MalformedDescriptor(e)
    }
}

impl From<ConflictError> for ErrorEvent {
    fn from(e: ConflictError) -> Self {
        ErrorEvent::Conflict(e)
    }
}

impl From<LookupUnavailable> for ErrorEvent {
    fn from(e: LookupUnavailable) -> Self {
        ErrorEvent::LookupUnavailable(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_message_lists_files() {
        let e = DiscoveryError::Overlapping {
            dir: "src/mixed".into(),
            files: vec!["a.csproj".into(), "b.fsproj".into()],
        };
        assert_eq!(e.to_string(), "src/mixed: overlapping project files a.csproj, b.fsproj");
    }

    #[test]
    fn event_display_is_transparent() {
        let ev: ErrorEvent = LookupUnavailable {
            package: "Steeltoe.Common".into(),
            reason: "catalog offline".into(),
        }
        .into();
        assert_eq!(ev.kind(), "lookup-unavailable");
        assert_eq!(
            ev.to_string(),
            "Steeltoe.Common: version lookup unavailable: catalog offline"
        );
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let ev: ErrorEvent = DiscoveryError::TimedOut {
            subtree: "deep".into(),
            timeout_secs: 2,
        }
        .into();
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(
            json,
            r#"{"discovery":{"timed-out":{"subtree":"deep","timeout_secs":2}}}"#
        );
        let back: ErrorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
