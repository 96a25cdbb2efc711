//! Credential-exposure and error-handling heuristics
//!
//! Three probes: hardcoded-secret shapes anywhere in the tree (CRITICAL),
//! absence of environment-variable usage (LOW advisory), and absence of
//! structured error handling in the entry artifact (MEDIUM). All heuristic
//! pattern matches; none of this parses code.

use crate::config::EngineConfig;
use crate::issue::{Issue, IssueCategory, RemediationKind, Severity};
use crate::snapshot::WorkspaceSnapshot;
use anyhow::Result;
use regex::Regex;
use std::path::PathBuf;

use super::Scanner;

/// key/password/token assigned to a quoted literal
const SECRET_PATTERN: &str =
    r#"(?i)\b(api[_-]?key|secret|password|token)\b["']?\s*[:=]\s*["'][^"']{4,}["']"#;

/// Idioms that count as reading configuration from the environment
const ENV_MARKERS: [&str; 4] = ["process.env", "std::env", "os.environ", "getenv"];

pub struct SecurityScanner {
    entry: PathBuf,
    secret_re: Regex,
    try_re: Regex,
    catch_re: Regex,
}

impl SecurityScanner {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            entry: config.project.entry.clone(),
            secret_re: Regex::new(SECRET_PATTERN).unwrap(),
            try_re: Regex::new(r"\btry\b").unwrap(),
            catch_re: Regex::new(r"\bcatch\b").unwrap(),
        }
    }

    fn has_structured_error_handling(&self, content: &str) -> bool {
        (self.try_re.is_match(content) && self.catch_re.is_match(content))
            || content.contains(".catch(")
    }
}

impl Scanner for SecurityScanner {
    fn category(&self) -> IssueCategory {
        IssueCategory::Security
    }

    fn scan(&self, snapshot: &WorkspaceSnapshot) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        // Hardcoded credentials, aggregated per file
        for file in snapshot.files() {
            let mut count = 0usize;
            let mut first_key: Option<String> = None;
            for captures in self.secret_re.captures_iter(&file.content) {
                count += 1;
                if first_key.is_none() {
                    first_key = captures.get(1).map(|m| m.as_str().to_lowercase());
                }
            }
            if count > 0 {
                issues.push(
                    Issue::new(
                        IssueCategory::Security,
                        Severity::Critical,
                        format!(
                            "Hardcoded credential literal in {} ({} match(es)); move to environment configuration",
                            file.rel_path.display(),
                            count
                        ),
                        RemediationKind::NoOp,
                    )
                    .with_file(file.rel_path.clone())
                    .with_subject(first_key.unwrap_or_else(|| "credential".to_string()))
                    .with_occurrences(count),
                );
            }
        }

        // Environment usage anywhere in the tree
        let uses_env = snapshot
            .files()
            .iter()
            .any(|f| ENV_MARKERS.iter().any(|m| f.content.contains(m)));
        if !uses_env {
            issues.push(
                Issue::new(
                    IssueCategory::Security,
                    Severity::Low,
                    "No environment-variable usage detected; configuration may be baked in".to_string(),
                    RemediationKind::NoOp,
                )
                .with_subject("environment"),
            );
        }

        // Structured error handling in the entry artifact
        if let Some(entry_content) = snapshot.content(&self.entry) {
            if !self.has_structured_error_handling(entry_content) {
                issues.push(
                    Issue::new(
                        IssueCategory::Security,
                        Severity::Medium,
                        format!(
                            "Entry artifact {} has no structured error handling",
                            self.entry.display()
                        ),
                        RemediationKind::NoOp,
                    )
                    .with_file(self.entry.clone())
                    .with_subject("error-handling"),
                );
            }
        }

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scan_dir(dir: &tempfile::TempDir) -> Vec<Issue> {
        let config = EngineConfig::default();
        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        SecurityScanner::from_config(&config).scan(&snapshot).unwrap()
    }

    #[test]
    fn test_hardcoded_secret_is_critical() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.js"),
            "const API_KEY = \"sk-abcdef123456\";\ntry { run(); } catch (e) {}\nprocess.env.PORT;",
        )
        .unwrap();

        let issues = scan_dir(&dir);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].subject.as_deref(), Some("api_key"));
        assert_eq!(issues[0].occurrences, 1);
    }

    #[test]
    fn test_clean_tree_flags_env_and_error_handling() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "const port = 8080;").unwrap();

        let issues = scan_dir(&dir);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Low && i.subject.as_deref() == Some("environment")));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Medium
                && i.subject.as_deref() == Some("error-handling")));
    }

    #[test]
    fn test_promise_catch_counts_as_error_handling() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.js"),
            "process.env.PORT; run().catch((e) => log(e));",
        )
        .unwrap();

        let issues = scan_dir(&dir);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_secret_in_json_manifest_is_detected() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "process.env.X; try{}catch(e){}").unwrap();
        fs::write(
            dir.path().join("config.json"),
            "{\"password\": \"hunter2-long\"}",
        )
        .unwrap();

        let issues = scan_dir(&dir);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].file.as_deref(), Some(std::path::Path::new("config.json")));
    }
}
