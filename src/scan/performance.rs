//! Size heuristics
//!
//! Flags artifacts whose size suggests they have grown past the point of
//! easy review. Advisory only; nothing here blocks a cycle.

use crate::config::EngineConfig;
use crate::issue::{Issue, IssueCategory, RemediationKind, Severity};
use crate::snapshot::WorkspaceSnapshot;
use anyhow::Result;
use serde_json::Value;
use std::path::Path;

use super::Scanner;

pub struct PerformanceScanner {
    max_file_bytes: u64,
}

impl PerformanceScanner {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_file_bytes: config.governance.max_file_kb * 1024,
        }
    }
}

impl Scanner for PerformanceScanner {
    fn category(&self) -> IssueCategory {
        IssueCategory::Performance
    }

    fn scan(&self, snapshot: &WorkspaceSnapshot) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        for file in snapshot.files() {
            if file.size_bytes > self.max_file_bytes {
                issues.push(
                    Issue::new(
                        IssueCategory::Performance,
                        Severity::Low,
                        format!(
                            "Oversized artifact {} ({} KB, limit {} KB); consider splitting",
                            file.rel_path.display(),
                            file.size_bytes / 1024,
                            self.max_file_bytes / 1024
                        ),
                        RemediationKind::NoOp,
                    )
                    .with_file(file.rel_path.clone()),
                );
            }
        }
        Ok(issues)
    }
}

/// Total declared dependency count across the manifest's runtime and
/// development tables. Informational; 0 when the manifest is absent or
/// unparsable.
pub fn dependency_count(snapshot: &WorkspaceSnapshot, manifest: &Path) -> usize {
    let Some(raw) = snapshot.content(manifest) else {
        return 0;
    };
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return 0;
    };
    ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|table| parsed.get(table).and_then(Value::as_object))
        .map(|deps| deps.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_oversized_file_is_low_advisory() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.governance.max_file_kb = 1;
        fs::write(dir.path().join("big.js"), "x".repeat(2048)).unwrap();
        fs::write(dir.path().join("small.js"), "ok").unwrap();

        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        let issues = PerformanceScanner::from_config(&config)
            .scan(&snapshot)
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Low);
        assert_eq!(issues[0].remediation, RemediationKind::NoOp);
        assert_eq!(issues[0].file.as_deref(), Some(Path::new("big.js")));
    }

    #[test]
    fn test_dependency_count_spans_both_tables() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"a": "1", "b": "2"}, "devDependencies": {"c": "3"}}"#,
        )
        .unwrap();
        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        assert_eq!(dependency_count(&snapshot, &PathBuf::from("package.json")), 3);
    }

    #[test]
    fn test_dependency_count_zero_without_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "x").unwrap();
        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        assert_eq!(dependency_count(&snapshot, &PathBuf::from("package.json")), 0);
    }
}
