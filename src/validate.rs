//! Post-apply validation
//!
//! Advisory checks over the mutated tree: scaffolded artifacts exist and
//! are wired, the manifest still parses, and the change batch introduced no
//! new critical findings. Failures never abort a run on their own; strict
//! mode decides what to do with them.

use crate::apply::{ApplyReport, ApplyStatus};
use crate::config::EngineConfig;
use crate::fault::{Fault, FaultKind};
use crate::issue::Severity;
use crate::scan::security::SecurityScanner;
use crate::scan::structure::name_variants;
use crate::scan::Scanner;
use crate::snapshot::WorkspaceSnapshot;
use crate::synthesize::{Improvement, RemediationPayload};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

impl CheckStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pass => "✓",
            Self::Fail => "✗",
            Self::Skipped => "○",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl ValidationCheck {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }

    fn skipped(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationOutcome {
    pub checks: Vec<ValidationCheck>,
    #[serde(skip)]
    pub faults: Vec<Fault>,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    pub fn failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count()
    }
}

/// Validate the tree after a change batch. `baseline_critical` is the
/// critical-issue count from the scan that produced the batch; a higher
/// count afterwards means the batch made things worse.
pub fn validate(
    root: &Path,
    config: &EngineConfig,
    improvements: &[Improvement],
    apply_report: &ApplyReport,
    baseline_critical: usize,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    let applied_scaffolds: Vec<&str> = apply_report
        .outcomes
        .iter()
        .filter(|o| o.status == ApplyStatus::Applied)
        .filter_map(|o| {
            improvements.iter().find(|i| i.id == o.improvement_id).and_then(
                |i| match &i.payload {
                    RemediationPayload::ModuleScaffold { module } => Some(module.as_str()),
                    _ => None,
                },
            )
        })
        .collect();

    // Scaffolded artifacts exist on disk
    if applied_scaffolds.is_empty() {
        outcome
            .checks
            .push(ValidationCheck::skipped("artifacts", "no scaffolds in batch"));
    } else {
        let missing: Vec<&str> = applied_scaffolds
            .iter()
            .copied()
            .filter(|m| !root.join(format!("{}.js", m.replace(['-', ' '], "_"))).exists())
            .collect();
        if missing.is_empty() {
            outcome.checks.push(ValidationCheck::pass(
                "artifacts",
                format!("{} scaffold(s) present", applied_scaffolds.len()),
            ));
        } else {
            outcome.checks.push(ValidationCheck::fail(
                "artifacts",
                format!("missing: {}", missing.join(", ")),
            ));
        }
    }

    // Entry references every scaffolded module
    if applied_scaffolds.is_empty() {
        outcome
            .checks
            .push(ValidationCheck::skipped("wiring", "no scaffolds in batch"));
    } else {
        match fs::read_to_string(root.join(&config.project.entry)) {
            Ok(entry) => {
                let haystack = entry.to_lowercase();
                let unwired: Vec<&str> = applied_scaffolds
                    .iter()
                    .copied()
                    .filter(|m| !name_variants(m).iter().any(|v| haystack.contains(v)))
                    .collect();
                if unwired.is_empty() {
                    outcome
                        .checks
                        .push(ValidationCheck::pass("wiring", "entry references all scaffolds"));
                } else {
                    outcome.checks.push(ValidationCheck::fail(
                        "wiring",
                        format!("not wired: {}", unwired.join(", ")),
                    ));
                }
            }
            Err(_) => {
                outcome.checks.push(ValidationCheck::fail(
                    "wiring",
                    format!("entry {} unreadable", config.project.entry.display()),
                ));
            }
        }
    }

    // Manifest still parses
    match fs::read_to_string(root.join(&config.project.manifest)) {
        Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(_) => outcome
                .checks
                .push(ValidationCheck::pass("manifest", "parses as JSON")),
            Err(e) => outcome
                .checks
                .push(ValidationCheck::fail("manifest", format!("parse error: {e}"))),
        },
        Err(_) => outcome
            .checks
            .push(ValidationCheck::skipped("manifest", "no manifest present")),
    }

    // No new critical findings
    match WorkspaceSnapshot::capture(root) {
        Ok(snapshot) => {
            match SecurityScanner::from_config(config).scan(&snapshot) {
                Ok(issues) => {
                    let critical = issues
                        .iter()
                        .filter(|i| i.severity == Severity::Critical)
                        .count();
                    if critical <= baseline_critical {
                        outcome.checks.push(ValidationCheck::pass(
                            "regression",
                            format!("{critical} critical finding(s), baseline {baseline_critical}"),
                        ));
                    } else {
                        outcome.checks.push(ValidationCheck::fail(
                            "regression",
                            format!("{critical} critical finding(s), up from {baseline_critical}"),
                        ));
                    }
                }
                Err(e) => {
                    outcome.faults.push(Fault::new(
                        FaultKind::Validation,
                        "regression".to_string(),
                        format!("{e:#}"),
                    ));
                    outcome
                        .checks
                        .push(ValidationCheck::fail("regression", format!("{e:#}")));
                }
            }
        }
        Err(e) => {
            outcome.faults.push(Fault::new(
                FaultKind::Validation,
                "snapshot".to_string(),
                format!("{e:#}"),
            ));
            outcome
                .checks
                .push(ValidationCheck::fail("regression", "could not recapture tree"));
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::Applier;
    use crate::issue::{Issue, IssueCategory, RemediationKind};
    use uuid::Uuid;

    fn scaffold_improvement(module: &str) -> Improvement {
        Improvement {
            id: Uuid::new_v4(),
            issue: Issue::new(
                IssueCategory::Structure,
                Severity::High,
                format!("Critical module '{module}' is not implemented"),
                RemediationKind::ModuleScaffold,
            )
            .with_subject(module.to_string()),
            payload: RemediationPayload::ModuleScaffold {
                module: module.to_string(),
            },
            confidence: 0.92,
            specialist: "architect",
            specialist_weight: 1.0,
        }
    }

    #[test]
    fn test_validation_passes_after_real_apply() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.js"),
            "'use strict';\nprocess.env.PORT;\ntry { run(); } catch (e) {}\n",
        )
        .unwrap();
        let config = EngineConfig::default();
        let improvements = vec![scaffold_improvement("metrics_exporter")];
        let report = Applier::new(dir.path(), &config, false).apply_all(&improvements);

        let outcome = validate(dir.path(), &config, &improvements, &report, 0);
        assert!(outcome.passed(), "checks: {:?}", outcome.checks);
    }

    #[test]
    fn test_missing_artifact_fails_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "'use strict';\n").unwrap();
        let config = EngineConfig::default();
        let improvements = vec![scaffold_improvement("metrics_exporter")];
        let report = Applier::new(dir.path(), &config, false).apply_all(&improvements);

        fs::remove_file(dir.path().join("metrics_exporter.js")).unwrap();
        let outcome = validate(dir.path(), &config, &improvements, &report, 0);
        assert!(!outcome.passed());
        assert!(outcome
            .checks
            .iter()
            .any(|c| c.name == "artifacts" && c.status == CheckStatus::Fail));
    }

    #[test]
    fn test_empty_batch_skips_scaffold_checks() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "process.env.X; try{}catch(e){}\n").unwrap();
        let config = EngineConfig::default();
        let report = ApplyReport::default();

        let outcome = validate(dir.path(), &config, &[], &report, 0);
        assert!(outcome.passed());
        assert!(outcome
            .checks
            .iter()
            .any(|c| c.name == "artifacts" && c.status == CheckStatus::Skipped));
        assert!(outcome
            .checks
            .iter()
            .any(|c| c.name == "wiring" && c.status == CheckStatus::Skipped));
    }

    #[test]
    fn test_unparsable_manifest_fails_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "process.env.X; try{}catch(e){}\n").unwrap();
        fs::write(dir.path().join("package.json"), "{broken").unwrap();
        let config = EngineConfig::default();

        let outcome = validate(dir.path(), &config, &[], &ApplyReport::default(), 0);
        assert!(!outcome.passed());
        assert!(outcome
            .checks
            .iter()
            .any(|c| c.name == "manifest" && c.status == CheckStatus::Fail));
    }
}
