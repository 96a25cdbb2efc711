//! One-shot diagnostic audit
//!
//! Scans the tree, consolidates, and builds the diagnostic report. Reads
//! only; the other entry point owns mutation.

use crate::config::EngineConfig;
use crate::report::DiagnosticReport;
use crate::scan::performance::dependency_count;
use crate::scan::scan_all;
use crate::snapshot::WorkspaceSnapshot;
use crate::state::SystemState;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Run a diagnostic audit against `root`. One of the engine's two entry
/// points.
pub async fn run_audit(root: &Path, config: EngineConfig) -> Result<DiagnosticReport> {
    let snapshot = Arc::new(WorkspaceSnapshot::capture(root)?);
    let outcome = scan_all(snapshot.clone(), &config).await;
    let state = SystemState::consolidate(outcome.issues);
    let deps = dependency_count(&snapshot, &config.project.manifest);
    Ok(DiagnosticReport::build(
        root,
        &state,
        outcome.compliance,
        deps,
        outcome.faults,
    ))
}
