//! The multi-cycle improvement loop
//!
//! One controller instance drives scan, synthesis, application, validation
//! and parameter evolution strictly in sequence. The confidence threshold
//! is the only state that survives a cycle; it moves by a fixed homeostatic
//! rule and never leaves its bounds. Cycles always run to completion; a
//! failure inside a stage is contained and recorded, and only an error
//! escaping the loop itself aborts the run.

use crate::apply::Applier;
use crate::config::EngineConfig;
use crate::fault::{Fault, FaultKind};
use crate::report::OverallStatus;
use crate::scan::performance::dependency_count;
use crate::scan::terminology::TermCompliance;
use crate::scan::{scan_all, ScanOutcome};
use crate::snapshot::WorkspaceSnapshot;
use crate::state::SystemState;
use crate::synthesize::{SeededConfidence, Synthesizer};
use crate::validate::{validate, ValidationOutcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MIN_THRESHOLD: f64 = 0.70;
pub const MAX_THRESHOLD: f64 = 0.95;
/// Subtracted when fewer than half the planned improvements land
pub const LOOSEN_STEP: f64 = 0.05;
/// Added when more than 80% of the planned improvements land
pub const TIGHTEN_STEP: f64 = 0.02;
const LOW_SUCCESS: f64 = 0.5;
const HIGH_SUCCESS: f64 = 0.8;

/// Where the controller is inside a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Scanning,
    Synthesizing,
    Applying,
    Validating,
    Evolving,
    Done,
}

impl EnginePhase {
    pub fn status_text(&self) -> &'static str {
        match self {
            EnginePhase::Idle => "idle",
            EnginePhase::Scanning => "scanning project tree",
            EnginePhase::Synthesizing => "synthesizing improvements",
            EnginePhase::Applying => "applying improvements",
            EnginePhase::Validating => "validating changes",
            EnginePhase::Evolving => "evolving parameters",
            EnginePhase::Done => "done",
        }
    }
}

/// The only state that crosses cycle boundaries. The controller is its
/// single writer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EvolutionParameters {
    threshold: f64,
    pub cycle_index: usize,
    pub max_cycles: usize,
}

impl EvolutionParameters {
    pub fn new(start: f64, max_cycles: usize) -> Self {
        Self {
            threshold: start.clamp(MIN_THRESHOLD, MAX_THRESHOLD),
            cycle_index: 0,
            max_cycles,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The homeostatic rule. An empty plan leaves the threshold alone; a
    /// poor batch loosens acceptance, a strong one tightens it. Exact
    /// comparisons, no smoothing.
    pub fn evolve(&mut self, success_rate: Option<f64>) {
        let Some(rate) = success_rate else { return };
        if rate < LOW_SUCCESS {
            self.threshold = (self.threshold - LOOSEN_STEP).max(MIN_THRESHOLD);
        } else if rate > HIGH_SUCCESS {
            self.threshold = (self.threshold + TIGHTEN_STEP).min(MAX_THRESHOLD);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvolutionOptions {
    pub cycles: usize,
    pub dry_run: bool,
    pub strict: bool,
    pub seed: Option<u64>,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            cycles: 3,
            dry_run: false,
            strict: false,
            seed: None,
        }
    }
}

/// Snapshot of one completed cycle, appended in order and never edited.
#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub cycle: usize,
    pub quality_score: u8,
    pub issues_found: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub compliance: TermCompliance,
    pub considered: usize,
    pub discarded: usize,
    pub planned: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub validation: Option<ValidationOutcome>,
    pub reverted: bool,
    pub threshold_before: f64,
    pub threshold_after: f64,
    pub faults: Vec<Fault>,
}

/// Aggregate of all cycle reports plus the closing state of the tree.
#[derive(Debug, Serialize)]
pub struct EvolutionReport {
    pub generated_at: DateTime<Utc>,
    pub root: PathBuf,
    pub dry_run: bool,
    pub strict: bool,
    pub cycles_requested: usize,
    pub cycles_run: usize,
    pub initial_quality: u8,
    pub final_quality: u8,
    pub status: OverallStatus,
    pub final_threshold: f64,
    pub total_planned: usize,
    pub total_applied: usize,
    pub total_skipped: usize,
    pub total_failed: usize,
    pub compliance: TermCompliance,
    pub dependency_count: usize,
    pub final_state: SystemState,
    pub cycles: Vec<CycleReport>,
}

pub struct EvolutionController {
    root: PathBuf,
    config: EngineConfig,
    options: EvolutionOptions,
    parameters: EvolutionParameters,
    phase: EnginePhase,
}

impl EvolutionController {
    pub fn new(root: &Path, config: EngineConfig, options: EvolutionOptions) -> Self {
        let parameters = EvolutionParameters::new(
            config.governance.confidence_threshold,
            config.governance.max_cycles,
        );
        Self {
            root: root.to_path_buf(),
            config,
            options,
            parameters,
            phase: EnginePhase::Idle,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn parameters(&self) -> &EvolutionParameters {
        &self.parameters
    }

    fn enter(&mut self, phase: EnginePhase) {
        self.phase = phase;
        eprintln!("  {}", phase.status_text());
    }

    pub async fn run(&mut self) -> Result<EvolutionReport> {
        let cycle_count = self.options.cycles.clamp(1, self.parameters.max_cycles.max(1));
        let mut synthesizer = Synthesizer::from_config(&self.config);
        if let Some(seed) = self.options.seed {
            synthesizer = synthesizer.with_strategy(Box::new(SeededConfidence::new(seed)));
        }
        let applier = Applier::new(&self.root, &self.config, self.options.dry_run);

        let mut cycles: Vec<CycleReport> = Vec::new();
        let mut initial_quality = 100u8;

        for cycle in 1..=cycle_count {
            eprintln!("cycle {cycle}/{cycle_count}");
            self.parameters.cycle_index = cycle;
            let threshold_before = self.parameters.threshold();
            let mut faults: Vec<Fault> = Vec::new();

            self.enter(EnginePhase::Scanning);
            let snapshot = Arc::new(WorkspaceSnapshot::capture(&self.root)?);
            let ScanOutcome {
                issues,
                compliance,
                faults: scan_faults,
            } = scan_all(snapshot, &self.config).await;
            faults.extend(scan_faults);
            let state = SystemState::consolidate(issues);
            if cycle == 1 {
                initial_quality = state.quality_score;
            }

            self.enter(EnginePhase::Synthesizing);
            let mut synthesis = synthesizer.synthesize(&state.issues, threshold_before);
            faults.append(&mut synthesis.faults);

            self.enter(EnginePhase::Applying);
            let mut apply_report = applier.apply_all(&synthesis.improvements);
            faults.append(&mut apply_report.faults);

            self.enter(EnginePhase::Validating);
            let mut reverted = false;
            let validation = if self.options.dry_run {
                None
            } else {
                let mut outcome = validate(
                    &self.root,
                    &self.config,
                    &synthesis.improvements,
                    &apply_report,
                    state.critical_count,
                );
                faults.append(&mut outcome.faults);
                if self.options.strict && !outcome.passed() {
                    match applier.revert(&apply_report.changes) {
                        Ok(()) => reverted = true,
                        Err(e) => faults.push(Fault::new(
                            FaultKind::Validation,
                            "revert",
                            format!("{e:#}"),
                        )),
                    }
                }
                Some(outcome)
            };

            self.enter(EnginePhase::Evolving);
            self.parameters.evolve(apply_report.success_rate());

            eprintln!(
                "  quality {}, {} issue(s), planned {}, applied {}, threshold {:.2}",
                state.quality_score,
                state.total_issues(),
                apply_report.planned,
                apply_report.applied,
                self.parameters.threshold()
            );

            cycles.push(CycleReport {
                cycle,
                quality_score: state.quality_score,
                issues_found: state.total_issues(),
                critical_count: state.critical_count,
                high_count: state.high_count,
                medium_count: state.medium_count,
                low_count: state.low_count,
                compliance,
                considered: synthesis.considered,
                discarded: synthesis.discarded,
                planned: apply_report.planned,
                applied: apply_report.applied,
                skipped: apply_report.skipped,
                failed: apply_report.failed,
                validation,
                reverted,
                threshold_before,
                threshold_after: self.parameters.threshold(),
                faults,
            });
        }

        self.enter(EnginePhase::Done);

        // Closing scan so the report reflects the tree after the final
        // batch, not the scan that produced it.
        let snapshot = Arc::new(WorkspaceSnapshot::capture(&self.root)?);
        let closing = scan_all(snapshot.clone(), &self.config).await;
        let final_state = SystemState::consolidate(closing.issues);
        let deps = dependency_count(&snapshot, &self.config.project.manifest);

        Ok(EvolutionReport {
            generated_at: Utc::now(),
            root: self.root.clone(),
            dry_run: self.options.dry_run,
            strict: self.options.strict,
            cycles_requested: self.options.cycles,
            cycles_run: cycles.len(),
            initial_quality,
            final_quality: final_state.quality_score,
            status: OverallStatus::classify(&final_state),
            final_threshold: self.parameters.threshold(),
            total_planned: cycles.iter().map(|c| c.planned).sum(),
            total_applied: cycles.iter().map(|c| c.applied).sum(),
            total_skipped: cycles.iter().map(|c| c.skipped).sum(),
            total_failed: cycles.iter().map(|c| c.failed).sum(),
            compliance: closing.compliance,
            dependency_count: deps,
            final_state,
            cycles,
        })
    }
}

/// Run the N-cycle improvement loop against `root`. One of the engine's two
/// entry points.
pub async fn run_evolution(
    root: &Path,
    config: EngineConfig,
    options: EvolutionOptions,
) -> Result<EvolutionReport> {
    let mut controller = EvolutionController::new(root, config, options);
    controller.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_threshold_rule_bands() {
        let mut p = EvolutionParameters::new(0.85, 10);
        p.evolve(None);
        assert!((p.threshold() - 0.85).abs() < 1e-9);

        p.evolve(Some(0.3));
        assert!((p.threshold() - 0.80).abs() < 1e-9);

        let mut q = EvolutionParameters::new(0.85, 10);
        q.evolve(Some(0.81));
        assert!((q.threshold() - 0.87).abs() < 1e-9);

        // band edges are exclusive
        let mut r = EvolutionParameters::new(0.85, 10);
        r.evolve(Some(0.5));
        r.evolve(Some(0.8));
        assert!((r.threshold() - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_never_leaves_bounds() {
        assert!((EvolutionParameters::new(0.2, 10).threshold() - MIN_THRESHOLD).abs() < 1e-9);
        assert!((EvolutionParameters::new(0.99, 10).threshold() - MAX_THRESHOLD).abs() < 1e-9);

        let mut low = EvolutionParameters::new(0.70, 10);
        for _ in 0..20 {
            low.evolve(Some(0.0));
        }
        assert!((low.threshold() - MIN_THRESHOLD).abs() < 1e-9);

        let mut high = EvolutionParameters::new(0.95, 10);
        for _ in 0..20 {
            high.evolve(Some(1.0));
        }
        assert!((high.threshold() - MAX_THRESHOLD).abs() < 1e-9);
    }

    #[test]
    fn test_mid_band_success_never_drifts() {
        let mut p = EvolutionParameters::new(0.85, 10);
        for _ in 0..10 {
            p.evolve(Some(0.7));
        }
        assert_eq!(p.threshold(), 0.85);
    }

    fn healthy_fixture() -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.js"),
            "'use strict';\nprocess.env.PORT;\ntry { run(); } catch (e) {}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "demo", "dependencies": {"@modelcontextprotocol/sdk": "^1.0.0", "zod": "^3.22.0"}}"#,
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_loop_scaffolds_all_missing_modules() {
        let dir = healthy_fixture();
        let mut controller = EvolutionController::new(
            dir.path(),
            EngineConfig::default(),
            EvolutionOptions {
                cycles: 10,
                ..EvolutionOptions::default()
            },
        );
        let report = controller.run().await.unwrap();

        assert_eq!(controller.phase(), EnginePhase::Done);
        assert_eq!(report.cycles_run, 10);

        // first cycle sees all eight missing modules
        assert_eq!(report.cycles[0].issues_found, 8);
        assert_eq!(report.cycles[0].high_count, 8);
        assert_eq!(report.cycles[0].quality_score, 60);
        assert_eq!(report.cycles[0].planned, 3);
        assert_eq!(report.cycles[0].applied, 3);

        // three full batches plus a final pair clear the backlog
        assert_eq!(report.total_applied, 8);
        assert_eq!(report.final_quality, 100);
        assert_eq!(report.status, OverallStatus::Healthy);
        assert!(dir.path().join("terminology_governance.js").exists());
        assert!(dir.path().join("integrity_guard.js").exists());

        // perfect batches tighten three times, empty plans leave it alone
        assert!((report.final_threshold - 0.91).abs() < 1e-9);
        assert_eq!(report.cycles[3].issues_found, 0);
        assert_eq!(report.cycles[3].planned, 0);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let dir = healthy_fixture();
        let report = run_evolution(
            dir.path(),
            EngineConfig::default(),
            EvolutionOptions {
                cycles: 2,
                dry_run: true,
                ..EvolutionOptions::default()
            },
        )
        .await
        .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.cycles[0].applied, 3);
        assert!(report.cycles[0].validation.is_none());
        assert!(!dir.path().join("terminology_governance.js").exists());
        // both cycles see the untouched tree
        assert_eq!(report.cycles[1].issues_found, 8);
    }

    #[tokio::test]
    async fn test_strict_mode_reverts_on_failed_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "'use strict';\n").unwrap();
        fs::write(dir.path().join("package.json"), "{broken").unwrap();

        let report = run_evolution(
            dir.path(),
            EngineConfig::default(),
            EvolutionOptions {
                cycles: 1,
                strict: true,
                ..EvolutionOptions::default()
            },
        )
        .await
        .unwrap();

        let cycle = &report.cycles[0];
        assert!(cycle.reverted);
        assert!(!cycle.validation.as_ref().unwrap().passed());
        // the manifest parse failure surfaced as a contained scan fault too
        assert!(cycle.faults.iter().any(|f| f.kind == FaultKind::Scan));
        assert!(!dir.path().join("terminology_governance.js").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("index.js")).unwrap(),
            "'use strict';\n"
        );
    }
}
