//! Manifest declaration checks
//!
//! Reads the project manifest and verifies every required external
//! declaration is present in either the runtime or development dependency
//! table. A missing declaration is HIGH because the integration surface it
//! represents cannot work at all without it.

use crate::config::EngineConfig;
use crate::issue::{Issue, IssueCategory, RemediationKind, Severity};
use crate::snapshot::WorkspaceSnapshot;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

use super::Scanner;

pub struct IntegrationScanner {
    manifest: PathBuf,
    required: Vec<String>,
}

impl IntegrationScanner {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            manifest: config.project.manifest.clone(),
            required: config.governance.required_declarations.clone(),
        }
    }

    fn missing_declaration_issue(&self, declaration: &str) -> Issue {
        Issue::new(
            IssueCategory::Integration,
            Severity::High,
            format!(
                "Required declaration '{}' missing from {}",
                declaration,
                self.manifest.display()
            ),
            RemediationKind::ConfigPatch,
        )
        .with_file(self.manifest.clone())
        .with_subject(declaration.to_string())
    }
}

/// True when `name` appears as a key in the manifest's runtime or
/// development dependency tables.
pub fn declares_dependency(manifest: &Value, name: &str) -> bool {
    ["dependencies", "devDependencies"].iter().any(|table| {
        manifest
            .get(table)
            .and_then(Value::as_object)
            .is_some_and(|deps| deps.contains_key(name))
    })
}

impl Scanner for IntegrationScanner {
    fn category(&self) -> IssueCategory {
        IssueCategory::Integration
    }

    fn scan(&self, snapshot: &WorkspaceSnapshot) -> Result<Vec<Issue>> {
        let Some(raw) = snapshot.content(&self.manifest) else {
            // No manifest at all: every required declaration is absent.
            return Ok(self
                .required
                .iter()
                .map(|d| self.missing_declaration_issue(d))
                .collect());
        };

        let manifest: Value = serde_json::from_str(raw)
            .with_context(|| format!("unparsable manifest {}", self.manifest.display()))?;

        Ok(self
            .required
            .iter()
            .filter(|d| !declares_dependency(&manifest, d))
            .map(|d| self.missing_declaration_issue(d))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scan_dir(dir: &tempfile::TempDir) -> Result<Vec<Issue>> {
        let config = EngineConfig::default();
        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        IntegrationScanner::from_config(&config).scan(&snapshot)
    }

    #[test]
    fn test_missing_manifest_yields_one_issue_per_declaration() {
        let dir = tempfile::TempDir::new().unwrap();
        let issues = scan_dir(&dir).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::High));
        assert!(issues
            .iter()
            .any(|i| i.subject.as_deref() == Some("@modelcontextprotocol/sdk")));
        assert!(issues.iter().any(|i| i.subject.as_deref() == Some("zod")));
    }

    #[test]
    fn test_dev_dependency_satisfies_declaration() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"zod": "^3.0.0"}, "devDependencies": {"@modelcontextprotocol/sdk": "^1.0.0"}}"#,
        )
        .unwrap();
        let issues = scan_dir(&dir).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_unparsable_manifest_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), "{not json").unwrap();
        assert!(scan_dir(&dir).is_err());
    }

    #[test]
    fn test_partial_manifest_reports_only_the_gap() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"zod": "^3.22.0"}}"#,
        )
        .unwrap();
        let issues = scan_dir(&dir).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject.as_deref(), Some("@modelcontextprotocol/sdk"));
        assert_eq!(issues[0].remediation, RemediationKind::ConfigPatch);
    }
}
