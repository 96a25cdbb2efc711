//! Restricted-term scanner
//!
//! Matches each configured term case-insensitively on word boundaries
//! against the fixed terminology targets. Every (file, term) pair with hits
//! becomes one MEDIUM issue carrying the occurrence count; the compliance
//! score treats each (present file, term) pair as one check.

use crate::config::EngineConfig;
use crate::issue::{Issue, IssueCategory, RemediationKind, Severity};
use crate::snapshot::WorkspaceSnapshot;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Scanner;

/// Terminology compliance stats for one scan
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TermCompliance {
    /// Target files present in the snapshot
    pub files_checked: usize,
    pub terms_checked: usize,
    /// files_checked x terms_checked
    pub checks: usize,
    /// Total occurrences across all (file, term) pairs
    pub violations: usize,
    /// ((checks - violations) / checks) * 100; defined as 100 when checks = 0
    pub score: f64,
}

impl Default for TermCompliance {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl TermCompliance {
    fn new(files_checked: usize, terms_checked: usize, violations: usize) -> Self {
        let checks = files_checked * terms_checked;
        let score = if checks == 0 {
            100.0
        } else {
            ((checks as f64 - violations as f64) / checks as f64) * 100.0
        };
        Self {
            files_checked,
            terms_checked,
            checks,
            violations,
            score,
        }
    }
}

/// Case-insensitive whole-word pattern for one restricted term
pub fn term_pattern(term: &str) -> Option<Regex> {
    let source = format!(r"(?i)\b{}\b", regex::escape(term));
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(err) => {
            eprintln!("  Warning: skipping unmatchable term '{}': {}", term, err);
            None
        }
    }
}

pub struct TerminologyScanner {
    targets: Vec<PathBuf>,
    /// (term, replacement, compiled pattern) in deterministic config order
    terms: Vec<(String, String, Regex)>,
}

impl TerminologyScanner {
    pub fn from_config(config: &EngineConfig) -> Self {
        let terms = config
            .terminology
            .iter()
            .filter_map(|(term, replacement)| {
                term_pattern(term).map(|re| (term.clone(), replacement.clone(), re))
            })
            .collect();

        Self {
            targets: config.project.terminology_targets.clone(),
            terms,
        }
    }

    /// Single pass over the targets: issues plus compliance stats
    pub fn tally(&self, snapshot: &WorkspaceSnapshot) -> (Vec<Issue>, TermCompliance) {
        let mut issues = Vec::new();
        let mut files_checked = 0usize;
        let mut violations = 0usize;

        for target in &self.targets {
            let Some(content) = snapshot.content(target) else {
                continue;
            };
            files_checked += 1;

            for (term, replacement, re) in &self.terms {
                let count = re.find_iter(content).count();
                if count == 0 {
                    continue;
                }
                violations += count;
                issues.push(
                    Issue::new(
                        IssueCategory::Terminology,
                        Severity::Medium,
                        format!(
                            "Restricted term '{}' appears {} time(s) in {}; replace with '{}'",
                            term,
                            count,
                            target.display(),
                            replacement
                        ),
                        RemediationKind::TerminologySubstitution,
                    )
                    .with_file(target.clone())
                    .with_subject(term.clone())
                    .with_occurrences(count),
                );
            }
        }

        let compliance = TermCompliance::new(files_checked, self.terms.len(), violations);
        (issues, compliance)
    }

    pub fn compliance(&self, snapshot: &WorkspaceSnapshot) -> TermCompliance {
        self.tally(snapshot).1
    }
}

impl Scanner for TerminologyScanner {
    fn category(&self) -> IssueCategory {
        IssueCategory::Terminology
    }

    fn scan(&self, snapshot: &WorkspaceSnapshot) -> Result<Vec<Issue>> {
        Ok(self.tally(snapshot).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn snapshot_with_readme(text: &str) -> (tempfile::TempDir, WorkspaceSnapshot) {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), text).unwrap();
        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        (dir, snapshot)
    }

    #[test]
    fn test_three_hits_count_three_violations() {
        // Scenario: one scanned file, "quantum" three times, nothing else
        let (_dir, snapshot) =
            snapshot_with_readme("quantum leap, Quantum state, QUANTUM supremacy");
        let config = EngineConfig::default();
        let scanner = TerminologyScanner::from_config(&config);

        let (issues, compliance) = scanner.tally(&snapshot);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].occurrences, 3);
        assert_eq!(issues[0].severity, Severity::Medium);

        assert_eq!(compliance.files_checked, 1);
        assert_eq!(compliance.violations, 3);
        assert_eq!(compliance.checks, 14);
        let expected = ((14.0 - 3.0) / 14.0) * 100.0;
        assert!((compliance.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_word_boundaries_prevent_partial_matches() {
        let (_dir, snapshot) = snapshot_with_readme("quantums and quantumfoo stay untouched");
        let config = EngineConfig::default();
        let (issues, compliance) = TerminologyScanner::from_config(&config).tally(&snapshot);
        assert!(issues.is_empty());
        assert_eq!(compliance.violations, 0);
        assert!((compliance.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_targets_present_scores_hundred() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("unrelated.txt"), "quantum").unwrap();
        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();

        let scanner = TerminologyScanner::from_config(&EngineConfig::default());
        let compliance = scanner.compliance(&snapshot);
        assert_eq!(compliance.checks, 0);
        assert!((compliance.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_multi_word_terms_match() {
        let (_dir, snapshot) = snapshot_with_readme("true mind union of operator and system");
        let config = EngineConfig::default();
        let (issues, _) = TerminologyScanner::from_config(&config).tally(&snapshot);
        assert!(issues
            .iter()
            .any(|i| i.subject.as_deref() == Some("mind union")));
    }
}
