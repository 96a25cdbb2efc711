//! Report shapes and persistence
//!
//! Two artifact shapes leave the engine: a pure-diagnostic report from an
//! audit, and the aggregate report of an evolution run. Both land as
//! timestamped JSON under `.steward/reports/`, with a one-line JSONL record
//! appended to `.steward/history.jsonl` so quality can be tracked across
//! runs. The store directory is kept out of version control automatically.

use crate::apply::write_atomic;
use crate::evolution::EvolutionReport;
use crate::fault::Fault;
use crate::issue::{Issue, IssueCategory, Severity};
use crate::scan::terminology::TermCompliance;
use crate::state::SystemState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

const STORE_DIR: &str = ".steward";
const REPORTS_SUBDIR: &str = "reports";
const HISTORY_FILE: &str = "history.jsonl";
const STORE_LOCK_TIMEOUT_SECS: u64 = 5;
const STORE_LOCK_RETRY_MS: u64 = 50;

/// Overall classification of a scanned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Healthy,
    Attention,
    Warning,
    Critical,
}

impl OverallStatus {
    /// Any critical finding dominates; more than two highs is a warning;
    /// a single high or a pile of mediums still deserves attention.
    pub fn classify(state: &SystemState) -> Self {
        if state.critical_count > 0 {
            OverallStatus::Critical
        } else if state.high_count > 2 {
            OverallStatus::Warning
        } else if state.high_count > 0 || state.medium_count > 3 {
            OverallStatus::Attention
        } else {
            OverallStatus::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "HEALTHY",
            OverallStatus::Attention => "ATTENTION",
            OverallStatus::Warning => "WARNING",
            OverallStatus::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    Immediate,
    ShortTerm,
    Advisory,
}

impl RecommendationTier {
    fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical | Severity::High => RecommendationTier::Immediate,
            Severity::Medium => RecommendationTier::ShortTerm,
            Severity::Low => RecommendationTier::Advisory,
        }
    }
}

/// One actionable line in the diagnostic report.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub tier: RecommendationTier,
    pub severity: Severity,
    pub category: IssueCategory,
    pub action: &'static str,
    pub description: String,
    pub file: Option<PathBuf>,
    pub subject: Option<String>,
}

impl Recommendation {
    fn from_issue(issue: &Issue) -> Self {
        Self {
            tier: RecommendationTier::for_severity(issue.severity),
            severity: issue.severity,
            category: issue.category,
            action: issue.remediation.label(),
            description: issue.description.clone(),
            file: issue.file.clone(),
            subject: issue.subject.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: IssueCategory,
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// The pure-diagnostic artifact produced by an audit.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,
    pub root: PathBuf,
    pub quality_score: u8,
    pub status: OverallStatus,
    pub total_issues: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub categories: Vec<CategoryReport>,
    pub compliance: TermCompliance,
    pub dependency_count: usize,
    pub recommendations: Vec<Recommendation>,
    pub faults: Vec<Fault>,
}

impl DiagnosticReport {
    pub fn build(
        root: &Path,
        state: &SystemState,
        compliance: TermCompliance,
        dependency_count: usize,
        faults: Vec<Fault>,
    ) -> Self {
        let categories = IssueCategory::all()
            .iter()
            .map(|&category| {
                let of = |severity: Severity| {
                    state
                        .issues
                        .iter()
                        .filter(|i| i.category == category && i.severity == severity)
                        .count()
                };
                CategoryReport {
                    category,
                    total: state.issues.iter().filter(|i| i.category == category).count(),
                    critical: of(Severity::Critical),
                    high: of(Severity::High),
                    medium: of(Severity::Medium),
                    low: of(Severity::Low),
                }
            })
            .collect();

        // severity first, then discovery order within each band
        let mut ordered: Vec<&Issue> = state.issues.iter().collect();
        ordered.sort_by_key(|i| std::cmp::Reverse(i.severity));
        let recommendations = ordered.iter().map(|i| Recommendation::from_issue(i)).collect();

        Self {
            generated_at: Utc::now(),
            root: root.to_path_buf(),
            quality_score: state.quality_score,
            status: OverallStatus::classify(state),
            total_issues: state.total_issues(),
            critical_count: state.critical_count,
            high_count: state.high_count,
            medium_count: state.medium_count,
            low_count: state.low_count,
            categories,
            compliance,
            dependency_count,
            recommendations,
            faults,
        }
    }
}

/// One line per completed run, appended to `.steward/history.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub run_id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: String,
    pub status: OverallStatus,
    pub quality_score: u8,
    pub total_issues: usize,
    pub applied: usize,
    pub cycles: usize,
}

struct StoreLock {
    file: std::fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Filesystem home for persisted reports and run history.
pub struct ReportStore {
    store_dir: PathBuf,
}

impl ReportStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            store_dir: project_root.join(STORE_DIR),
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        let reports = self.store_dir.join(REPORTS_SUBDIR);
        if !reports.exists() {
            fs::create_dir_all(&reports)?;
        }
        self.ensure_store_ignored()?;
        Ok(())
    }

    fn ensure_store_ignored(&self) -> Result<()> {
        let Some(repo_root) = self.store_dir.parent() else {
            return Ok(());
        };

        let gitignore_path = repo_root.join(".gitignore");
        if gitignore_path.exists() {
            append_ignore_entry(&gitignore_path, ".steward/")?;
            return Ok(());
        }

        let git_dir = repo_root.join(".git");
        if git_dir.is_dir() {
            let info_exclude_path = git_dir.join("info").join("exclude");
            if let Some(parent) = info_exclude_path.parent() {
                if fs::create_dir_all(parent).is_ok() {
                    if append_ignore_entry(&info_exclude_path, ".steward/").is_ok() {
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }

    fn lock(&self, exclusive: bool) -> Result<StoreLock> {
        if exclusive {
            self.ensure_dir()?;
        } else if !self.store_dir.exists() {
            return Err(anyhow::anyhow!("report store missing"));
        }

        let lock_path = self.store_dir.join(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        loop {
            let result = if exclusive {
                FileExt::try_lock_exclusive(&file)
            } else {
                FileExt::try_lock_shared(&file)
            };
            match result {
                Ok(()) => break,
                Err(err) => {
                    if err.kind() != ErrorKind::WouldBlock {
                        return Err(err.into());
                    }
                    if start.elapsed() >= Duration::from_secs(STORE_LOCK_TIMEOUT_SECS) {
                        return Err(anyhow::anyhow!(
                            "Timed out waiting for report store lock ({}s)",
                            STORE_LOCK_TIMEOUT_SECS
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(STORE_LOCK_RETRY_MS));
                }
            }
        }

        Ok(StoreLock { file })
    }

    fn report_path(&self, prefix: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        self.store_dir
            .join(REPORTS_SUBDIR)
            .join(format!("{prefix}_{stamp}.json"))
    }

    pub fn save_diagnostic(&self, report: &DiagnosticReport) -> Result<PathBuf> {
        let _lock = self.lock(true)?;
        let path = self.report_path("audit");
        let content = serde_json::to_string_pretty(report)?;
        write_atomic(&path, &content)?;
        Ok(path)
    }

    pub fn save_evolution(&self, report: &EvolutionReport) -> Result<PathBuf> {
        let _lock = self.lock(true)?;
        let path = self.report_path("evolution");
        let content = serde_json::to_string_pretty(report)?;
        write_atomic(&path, &content)?;
        Ok(path)
    }

    pub fn append_history(&self, record: &HistoryRecord) -> Result<()> {
        let _lock = self.lock(true)?;
        let path = self.store_dir.join(HISTORY_FILE);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let row = serde_json::to_string(record)?;
        use std::io::Write;
        writeln!(file, "{}", row)?;
        Ok(())
    }

    /// Load up to `limit` latest history records (newest last).
    pub fn load_recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let path = self.store_dir.join(HISTORY_FILE);
        if !path.exists() || limit == 0 {
            return Ok(Vec::new());
        }
        let _lock = self.lock(false)?;
        let content = fs::read_to_string(&path)?;
        let mut records: Vec<HistoryRecord> = content
            .lines()
            .filter_map(|line| serde_json::from_str::<HistoryRecord>(line).ok())
            .collect();
        if records.len() > limit {
            let split = records.len() - limit;
            records.drain(0..split);
        }
        Ok(records)
    }
}

fn append_ignore_entry(path: &Path, entry: &str) -> Result<()> {
    let content = fs::read_to_string(path).unwrap_or_default();
    let already_present = content.lines().any(|line| {
        let trimmed = line.trim();
        trimmed == entry || trimmed == ".steward"
    });
    if already_present {
        return Ok(());
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    use std::io::Write;
    if !content.trim().is_empty() && !content.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "# Steward reports")?;
    writeln!(file, "{}", entry)?;
    Ok(())
}

pub fn print_diagnostic(report: &DiagnosticReport) {
    println!("Project: {}", report.root.display());
    println!("Quality score: {}/100", report.quality_score);
    println!("Status: {}", report.status.as_str());
    println!(
        "Issues: {} ({} critical, {} high, {} medium, {} low)",
        report.total_issues,
        report.critical_count,
        report.high_count,
        report.medium_count,
        report.low_count
    );
    println!("Terminology compliance: {:.1}%", report.compliance.score);
    println!("Dependencies declared: {}", report.dependency_count);

    let flagged: Vec<&CategoryReport> =
        report.categories.iter().filter(|c| c.total > 0).collect();
    if !flagged.is_empty() {
        println!();
        println!("Categories:");
        for c in flagged {
            println!("  {:<12} {} issue(s)", c.category.label(), c.total);
        }
    }

    if !report.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &report.recommendations {
            println!(
                "  {} [{}] {} ({})",
                rec.severity.icon(),
                rec.severity.as_str(),
                rec.description,
                rec.action
            );
        }
    }

    if !report.faults.is_empty() {
        println!();
        println!("Faults:");
        for fault in &report.faults {
            println!("  {} {}: {}", fault.kind.label(), fault.context, fault.message);
        }
    }
}

pub fn print_evolution(report: &EvolutionReport) {
    println!("Project: {}", report.root.display());
    if report.dry_run {
        println!("Mode: dry-run (no files written)");
    }
    println!("Cycles run: {}", report.cycles_run);
    println!("Quality: {} -> {}", report.initial_quality, report.final_quality);
    println!("Status: {}", report.status.as_str());
    println!(
        "Improvements: {} planned, {} applied, {} skipped, {} failed",
        report.total_planned, report.total_applied, report.total_skipped, report.total_failed
    );
    println!("Final threshold: {:.2}", report.final_threshold);
    println!("Terminology compliance: {:.1}%", report.compliance.score);

    println!();
    for cycle in &report.cycles {
        let validation = match &cycle.validation {
            Some(v) if v.passed() => "ok",
            Some(_) => "failed",
            None => "-",
        };
        println!(
            "  cycle {}: quality {}, {} issue(s), applied {}/{}, validation {}{}",
            cycle.cycle,
            cycle.quality_score,
            cycle.issues_found,
            cycle.applied,
            cycle.planned,
            validation,
            if cycle.reverted { " (reverted)" } else { "" }
        );
    }
}

/// Print the quality trend from recent history, oldest first.
pub fn print_history_trend(store: &ReportStore) {
    let Ok(records) = store.load_recent_history(5) else {
        return;
    };
    if records.len() < 2 {
        return;
    }
    let trend: Vec<String> = records
        .iter()
        .map(|r| r.quality_score.to_string())
        .collect();
    println!("Recent quality: {}", trend.join(" -> "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::RemediationKind;

    fn state_with(critical: usize, high: usize, medium: usize, low: usize) -> SystemState {
        let mut issues = Vec::new();
        let mut push = |n: usize, severity: Severity| {
            for _ in 0..n {
                issues.push(Issue::new(
                    IssueCategory::Structure,
                    severity,
                    "x".to_string(),
                    RemediationKind::NoOp,
                ));
            }
        };
        push(critical, Severity::Critical);
        push(high, Severity::High);
        push(medium, Severity::Medium);
        push(low, Severity::Low);
        SystemState::consolidate(issues)
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(
            OverallStatus::classify(&state_with(1, 0, 0, 0)),
            OverallStatus::Critical
        );
        assert_eq!(
            OverallStatus::classify(&state_with(0, 3, 0, 0)),
            OverallStatus::Warning
        );
        assert_eq!(
            OverallStatus::classify(&state_with(0, 1, 0, 0)),
            OverallStatus::Attention
        );
        assert_eq!(
            OverallStatus::classify(&state_with(0, 0, 4, 0)),
            OverallStatus::Attention
        );
        assert_eq!(
            OverallStatus::classify(&state_with(0, 0, 3, 5)),
            OverallStatus::Healthy
        );
        assert_eq!(
            OverallStatus::classify(&state_with(0, 0, 0, 0)),
            OverallStatus::Healthy
        );
        // critical dominates even alongside many highs
        assert_eq!(
            OverallStatus::classify(&state_with(1, 5, 0, 0)),
            OverallStatus::Critical
        );
    }

    #[test]
    fn test_recommendations_sorted_by_severity_then_discovery() {
        let issues = vec![
            Issue::new(
                IssueCategory::Performance,
                Severity::Low,
                "low-1".to_string(),
                RemediationKind::NoOp,
            ),
            Issue::new(
                IssueCategory::Structure,
                Severity::High,
                "high-1".to_string(),
                RemediationKind::ModuleScaffold,
            ),
            Issue::new(
                IssueCategory::Security,
                Severity::Critical,
                "critical-1".to_string(),
                RemediationKind::NoOp,
            ),
            Issue::new(
                IssueCategory::Structure,
                Severity::High,
                "high-2".to_string(),
                RemediationKind::ModuleScaffold,
            ),
        ];
        let state = SystemState::consolidate(issues);
        let report = DiagnosticReport::build(
            Path::new("/tmp/demo"),
            &state,
            TermCompliance::default(),
            0,
            Vec::new(),
        );
        let order: Vec<&str> = report
            .recommendations
            .iter()
            .map(|r| r.description.as_str())
            .collect();
        assert_eq!(order, ["critical-1", "high-1", "high-2", "low-1"]);
        assert_eq!(report.recommendations[0].tier, RecommendationTier::Immediate);
        assert_eq!(report.recommendations[3].tier, RecommendationTier::Advisory);
    }

    #[test]
    fn test_store_persists_reports_and_history() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "node_modules/\n").unwrap();
        let store = ReportStore::new(dir.path());

        let state = state_with(0, 1, 0, 0);
        let report = DiagnosticReport::build(
            dir.path(),
            &state,
            TermCompliance::default(),
            2,
            Vec::new(),
        );
        let path = store.save_diagnostic(&report).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join(".steward").join("reports")));

        // the persisted artifact is well-formed JSON with the scored fields
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["quality_score"], 95);
        assert_eq!(saved["status"], "ATTENTION");

        for score in [60u8, 80] {
            store
                .append_history(&HistoryRecord {
                    run_id: Uuid::new_v4(),
                    at: Utc::now(),
                    kind: "audit".to_string(),
                    status: OverallStatus::Attention,
                    quality_score: score,
                    total_issues: 1,
                    applied: 0,
                    cycles: 0,
                })
                .unwrap();
        }
        let records = store.load_recent_history(5).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quality_score, 60);
        assert_eq!(records[1].quality_score, 80);

        let gitignore = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(".steward/"));
    }

    #[test]
    fn test_history_load_respects_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ReportStore::new(dir.path());
        for i in 0..8 {
            store
                .append_history(&HistoryRecord {
                    run_id: Uuid::new_v4(),
                    at: Utc::now(),
                    kind: "evolve".to_string(),
                    status: OverallStatus::Healthy,
                    quality_score: i * 10,
                    total_issues: 0,
                    applied: 0,
                    cycles: 1,
                })
                .unwrap();
        }
        let records = store.load_recent_history(3).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].quality_score, 50);
        assert_eq!(records[2].quality_score, 70);
    }
}
