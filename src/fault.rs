//! Contained-failure records
//!
//! The engine prefers local containment: a scanner that cannot read, a write
//! that fails, or a validation pass that errors is logged, recorded as a
//! `Fault` on the cycle report, and the run continues. Only an error that
//! escapes the top-level loop aborts the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tier of the pipeline a contained failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// A sub-scanner failed; its result is treated as empty
    Scan,
    /// An improvement could not be applied; it is marked not-applied
    Remediation,
    /// The advisory re-scan failed; validation is recorded as skipped
    Validation,
}

impl FaultKind {
    pub fn label(&self) -> &'static str {
        match self {
            FaultKind::Scan => "scan",
            FaultKind::Remediation => "remediation",
            FaultKind::Validation => "validation",
        }
    }
}

/// A contained failure with enough context to act on without re-running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    /// Category, file, and term/module context, preformatted
    pub context: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Fault {
    pub fn new(kind: FaultKind, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_carries_context() {
        let fault = Fault::new(FaultKind::Remediation, "Structure [HIGH] metrics_exporter", "write failed");
        assert_eq!(fault.kind.label(), "remediation");
        assert!(fault.context.contains("metrics_exporter"));
    }
}
