//! Pipeline error taxonomy and the user-visible notices they degrade into.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REASON_SOURCE_UNAVAILABLE: &str = "dashboard_source_unavailable";
pub const REASON_EMPTY_SOURCE: &str = "dashboard_empty_source";
pub const REASON_SCHEMA_INCOMPLETE: &str = "dashboard_schema_incomplete";
pub const REASON_INVALID_FILTER: &str = "dashboard_invalid_filter";
pub const REASON_EMPTY_RESULT: &str = "dashboard_empty_result";

/// Stage failures. None of these terminate the process; each is converted
/// into a [`DashboardNotice`] plus a safe empty value at the stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("event source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("event source returned zero records")]
    EmptySource,
    #[error(
        "fetched {fetched} records but none carry a usable 'timestamp' field; records cannot be processed"
    )]
    SchemaIncomplete { fetched: usize },
    #[error("invalid filter selection: {0}")]
    InvalidFilterSelection(String),
}

impl PipelineError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => REASON_SOURCE_UNAVAILABLE,
            Self::EmptySource => REASON_EMPTY_SOURCE,
            Self::SchemaIncomplete { .. } => REASON_SCHEMA_INCOMPLETE,
            Self::InvalidFilterSelection(_) => REASON_INVALID_FILTER,
        }
    }

    pub fn severity(&self) -> NoticeSeverity {
        match self {
            Self::EmptySource => NoticeSeverity::Info,
            Self::SourceUnavailable(_)
            | Self::SchemaIncomplete { .. }
            | Self::InvalidFilterSelection(_) => NoticeSeverity::Warning,
        }
    }

    pub fn to_notice(&self) -> DashboardNotice {
        DashboardNotice {
            severity: self.severity(),
            reason_code: self.reason_code().to_string(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    Info,
    Warning,
}

impl NoticeSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

/// Message surfaced to the presentation sink in place of a stage result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardNotice {
    pub severity: NoticeSeverity,
    pub reason_code: String,
    pub message: String,
}

impl DashboardNotice {
    /// Valid empty filtered set; informational only.
    pub fn empty_result() -> Self {
        Self {
            severity: NoticeSeverity::Info,
            reason_code: REASON_EMPTY_RESULT.to_string(),
            message: "no records match the selected filters".to_string(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == NoticeSeverity::Warning
    }
}

impl From<&PipelineError> for DashboardNotice {
    fn from(error: &PipelineError) -> Self {
        error.to_notice()
    }
}
