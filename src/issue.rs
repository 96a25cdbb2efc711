//! Issue types for the diagnostic scanners
//!
//! An `Issue` is one detected problem: where it was found, how bad it is,
//! and which remediation kind could address it. Issues are created fresh by
//! every scan and discarded at the end of the cycle that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Diagnostic dimension that produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    /// Critical-module completeness of the entry artifact
    Structure,
    /// Restricted-term usage in the target files
    Terminology,
    /// Credential exposure and error-handling heuristics
    Security,
    /// Required declarations in the dependency manifest
    Integration,
    /// Size smells and dependency load
    Performance,
}

impl IssueCategory {
    pub fn label(&self) -> &'static str {
        match self {
            IssueCategory::Structure => "Structure",
            IssueCategory::Terminology => "Terminology",
            IssueCategory::Security => "Security",
            IssueCategory::Integration => "Integration",
            IssueCategory::Performance => "Performance",
        }
    }

    /// All categories in scan order
    pub fn all() -> [IssueCategory; 5] {
        [
            IssueCategory::Structure,
            IssueCategory::Terminology,
            IssueCategory::Security,
            IssueCategory::Integration,
            IssueCategory::Performance,
        ]
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Low => "·",
            Severity::Medium => "○",
            Severity::High => "●",
            Severity::Critical => "■",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remediation kind an issue suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationKind {
    /// Scaffold a missing module and wire it into the entry artifact
    ModuleScaffold,
    /// Replace a restricted term across the terminology targets
    TerminologySubstitution,
    /// Merge a fragment into the dependency manifest
    ConfigPatch,
    /// Nothing to apply automatically; surfaced for manual review
    NoOp,
}

impl RemediationKind {
    pub fn label(&self) -> &'static str {
        match self {
            RemediationKind::ModuleScaffold => "Scaffold",
            RemediationKind::TerminologySubstitution => "Substitute",
            RemediationKind::ConfigPatch => "Patch",
            RemediationKind::NoOp => "Review",
        }
    }
}

/// A single detected problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    /// Remediation kind the synthesizer should consider first
    pub remediation: RemediationKind,
    /// File the issue was observed in, if any
    pub file: Option<PathBuf>,
    /// Term or module name the issue is about, if any
    pub subject: Option<String>,
    /// Occurrence count for repeated findings (term hits etc.)
    #[serde(default)]
    pub occurrences: usize,
    pub detected_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(
        category: IssueCategory,
        severity: Severity,
        description: String,
        remediation: RemediationKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            severity,
            description,
            remediation,
            file: None,
            subject: None,
            occurrences: 0,
            detected_at: Utc::now(),
        }
    }

    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_occurrences(mut self, count: usize) -> Self {
        self.occurrences = count;
        self
    }

    /// One-line context string for logs and fault records
    pub fn context(&self) -> String {
        let file = self
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let subject = self.subject.as_deref().unwrap_or("-");
        format!("{} [{}] {} ({})", self.category, self.severity, subject, file)
    }
}
