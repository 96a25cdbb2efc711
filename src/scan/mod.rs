//! Diagnostic scanners
//!
//! Five independent sub-scanners each map a workspace snapshot to a list of
//! issues. Every scanner is a pure read over the snapshot, so the five fan
//! out concurrently and join before consolidation. A scanner that fails is
//! contained: it contributes an empty result and a fault record, and the
//! cycle continues with degraded coverage.

pub mod integration;
pub mod performance;
pub mod security;
pub mod structure;
pub mod terminology;

use crate::config::EngineConfig;
use crate::fault::{Fault, FaultKind};
use crate::issue::{Issue, IssueCategory};
use crate::snapshot::WorkspaceSnapshot;
use anyhow::Result;
use std::sync::Arc;

pub use terminology::TermCompliance;

/// One diagnostic dimension
pub trait Scanner: Send + Sync {
    fn category(&self) -> IssueCategory;

    /// Pure read over the snapshot; must not touch the live filesystem
    fn scan(&self, snapshot: &WorkspaceSnapshot) -> Result<Vec<Issue>>;
}

/// Aggregated output of one full scan
#[derive(Debug)]
pub struct ScanOutcome {
    /// Merged in fixed scanner order; index order is discovery order
    pub issues: Vec<Issue>,
    pub compliance: TermCompliance,
    pub faults: Vec<Fault>,
}

/// Run all five sub-scanners over one snapshot.
///
/// The scanners fan out on blocking tasks; `join_all` is the fan-in barrier,
/// so consolidation never sees a partial scan. Results merge in the fixed
/// category order regardless of completion timing, which keeps issue
/// discovery order deterministic. The terminology scanner runs one tally
/// pass that yields both its issues and the compliance stats, so the
/// target files are read once per scan.
pub async fn scan_all(snapshot: Arc<WorkspaceSnapshot>, config: &EngineConfig) -> ScanOutcome {
    let term_scanner = terminology::TerminologyScanner::from_config(config);
    let term_snap = Arc::clone(&snapshot);
    let term_handle = tokio::task::spawn_blocking(move || term_scanner.tally(&term_snap));

    let others: Vec<Arc<dyn Scanner>> = vec![
        Arc::new(structure::StructureScanner::from_config(config)),
        Arc::new(security::SecurityScanner::from_config(config)),
        Arc::new(integration::IntegrationScanner::from_config(config)),
        Arc::new(performance::PerformanceScanner::from_config(config)),
    ];
    let handles: Vec<_> = others
        .into_iter()
        .map(|scanner| {
            let snap = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || (scanner.category(), scanner.scan(&snap)))
        })
        .collect();

    let joined = futures::future::join_all(handles).await;
    let mut faults = Vec::new();
    let (mut term_issues, compliance) = match term_handle.await {
        Ok(tally) => tally,
        Err(err) => {
            eprintln!("  Warning: Terminology scan aborted: {}", err);
            faults.push(Fault::new(
                FaultKind::Scan,
                IssueCategory::Terminology.label(),
                err.to_string(),
            ));
            (Vec::new(), TermCompliance::default())
        }
    };

    let mut batches: Vec<(IssueCategory, Vec<Issue>)> = Vec::new();
    for outcome in joined {
        match outcome {
            Ok((category, Ok(batch))) => batches.push((category, batch)),
            Ok((category, Err(err))) => {
                eprintln!("  Warning: {} scan failed: {}", category, err);
                faults.push(Fault::new(FaultKind::Scan, category.label(), err.to_string()));
            }
            Err(err) => {
                eprintln!("  Warning: scan task aborted: {}", err);
                faults.push(Fault::new(FaultKind::Scan, "scan task", err.to_string()));
            }
        }
    }

    let mut issues = Vec::new();
    for category in IssueCategory::all() {
        if category == IssueCategory::Terminology {
            issues.append(&mut term_issues);
        } else if let Some((_, batch)) = batches.iter_mut().find(|(c, _)| *c == category) {
            issues.append(batch);
        }
    }

    ScanOutcome {
        issues,
        compliance,
        faults,
    }
}
