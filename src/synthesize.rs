//! Improvement synthesis
//!
//! Turns the highest-leverage issues from a scan into concrete, bounded
//! remediation payloads. Selection takes the top K HIGH-severity issues in
//! discovery order; each selected issue gets a primary payload plus a
//! deferral alternative, and a pluggable confidence strategy decides which
//! candidate survives. Improvements below the cycle's confidence threshold
//! are discarded, never applied.

use crate::config::EngineConfig;
use crate::fault::{Fault, FaultKind};
use crate::issue::{Issue, IssueCategory, RemediationKind, Severity};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Pinned versions for declarations the engine knows how to patch in.
const DECLARATION_VERSIONS: [(&str, &str); 2] = [
    ("@modelcontextprotocol/sdk", "^1.0.0"),
    ("zod", "^3.22.0"),
];

/// What an improvement will actually do to the tree when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemediationPayload {
    /// Create a module artifact and wire it into the entry.
    ModuleScaffold { module: String },
    /// Replace a restricted term across all terminology target files.
    TerminologySubstitution { term: String, replacement: String },
    /// Merge a JSON fragment into the project manifest.
    ConfigPatch { fragment: serde_json::Value },
    /// Record the finding and defer to a human.
    NoOp,
}

impl RemediationPayload {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModuleScaffold { .. } => "scaffold",
            Self::TerminologySubstitution { .. } => "substitute",
            Self::ConfigPatch { .. } => "patch",
            Self::NoOp => "defer",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Improvement {
    pub id: Uuid,
    pub issue: Issue,
    pub payload: RemediationPayload,
    pub confidence: f64,
    pub specialist: &'static str,
    pub specialist_weight: f64,
}

/// Scores a candidate payload for an issue. Strategies may be stateful
/// (seeded randomness) so scoring takes `&mut self`.
pub trait ConfidenceStrategy: Send {
    fn confidence(&mut self, issue: &Issue, payload: &RemediationPayload) -> f64;
}

/// Deterministic scorer: a base per payload kind, nudged up for severe
/// issues. Mechanical changes score higher than generative ones.
pub struct FeatureConfidence;

impl ConfidenceStrategy for FeatureConfidence {
    fn confidence(&mut self, issue: &Issue, payload: &RemediationPayload) -> f64 {
        let base: f64 = match payload {
            RemediationPayload::ConfigPatch { .. } => 0.93,
            RemediationPayload::ModuleScaffold { .. } => 0.90,
            RemediationPayload::TerminologySubstitution { .. } => 0.87,
            RemediationPayload::NoOp => 0.50,
        };
        let bump = match issue.severity {
            Severity::Critical => 0.04,
            Severity::High => 0.02,
            Severity::Medium | Severity::Low => 0.0,
        };
        (base + bump).min(1.0)
    }
}

/// Seeded scorer for exercising the pipeline under varied confidence.
/// Same seed, same scores.
pub struct SeededConfidence {
    rng: StdRng,
}

impl SeededConfidence {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ConfidenceStrategy for SeededConfidence {
    fn confidence(&mut self, _issue: &Issue, payload: &RemediationPayload) -> f64 {
        match payload {
            RemediationPayload::NoOp => self.rng.gen_range(0.30..0.60),
            _ => self.rng.gen_range(0.72..0.98),
        }
    }
}

/// Specialist group assigned to each category, with its advisory weight.
pub fn specialist_for(category: IssueCategory) -> (&'static str, f64) {
    match category {
        IssueCategory::Structure => ("architect", 1.0),
        IssueCategory::Terminology => ("lexicon", 0.9),
        IssueCategory::Security => ("sentinel", 1.0),
        IssueCategory::Integration => ("liaison", 0.95),
        IssueCategory::Performance => ("profiler", 0.8),
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SynthesisOutcome {
    pub improvements: Vec<Improvement>,
    pub considered: usize,
    pub discarded: usize,
    #[serde(skip)]
    pub faults: Vec<Fault>,
}

pub struct Synthesizer {
    terminology: BTreeMap<String, String>,
    selection_size: usize,
    strategy: Box<dyn ConfidenceStrategy>,
}

impl Synthesizer {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            terminology: config.terminology.clone(),
            selection_size: config.governance.selection_size,
            strategy: Box::new(FeatureConfidence),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn ConfidenceStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Top K HIGH-severity issues in discovery order.
    pub fn select_targets<'a>(&self, issues: &'a [Issue]) -> Vec<&'a Issue> {
        issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .take(self.selection_size)
            .collect()
    }

    /// Build the primary payload for an issue, or None when the issue does
    /// not carry enough context to act.
    fn primary_payload(&self, issue: &Issue) -> Result<Option<RemediationPayload>, String> {
        match issue.remediation {
            RemediationKind::ModuleScaffold => match &issue.subject {
                Some(module) => Ok(Some(RemediationPayload::ModuleScaffold {
                    module: module.clone(),
                })),
                None => Err("scaffold issue without a module subject".to_string()),
            },
            RemediationKind::TerminologySubstitution => {
                let Some(term) = &issue.subject else {
                    return Err("substitution issue without a term subject".to_string());
                };
                match self.terminology.get(term) {
                    Some(replacement) => Ok(Some(RemediationPayload::TerminologySubstitution {
                        term: term.clone(),
                        replacement: replacement.clone(),
                    })),
                    None => Err(format!("no replacement configured for term '{term}'")),
                }
            }
            RemediationKind::ConfigPatch => match &issue.subject {
                Some(declaration) => {
                    let version = DECLARATION_VERSIONS
                        .iter()
                        .find(|(name, _)| name == declaration)
                        .map(|(_, v)| *v)
                        .unwrap_or("*");
                    Ok(Some(RemediationPayload::ConfigPatch {
                        fragment: json!({ "dependencies": { declaration: version } }),
                    }))
                }
                None => Err("patch issue without a declaration subject".to_string()),
            },
            RemediationKind::NoOp => Ok(None),
        }
    }

    /// Synthesize gated improvements for one scan's issues. `threshold` is
    /// the cycle's current confidence floor.
    pub fn synthesize(&mut self, issues: &[Issue], threshold: f64) -> SynthesisOutcome {
        let targets: Vec<Issue> = self.select_targets(issues).into_iter().cloned().collect();
        let mut outcome = SynthesisOutcome::default();

        for issue in targets {
            outcome.considered += 1;
            let primary = match self.primary_payload(&issue) {
                Ok(Some(payload)) => payload,
                Ok(None) => RemediationPayload::NoOp,
                Err(message) => {
                    outcome
                        .faults
                        .push(Fault::new(FaultKind::Remediation, issue.context(), message));
                    outcome.discarded += 1;
                    continue;
                }
            };

            let (specialist, specialist_weight) = specialist_for(issue.category);

            // Candidates are the issue's own remediation plus a full
            // deferral. The specialist weight scales how many candidates
            // get scored; it never changes a score. Highest confidence
            // wins, primary on ties.
            let mut best = primary.clone();
            let mut best_confidence = self.strategy.confidence(&issue, &primary);
            let evaluate_deferral = primary != RemediationPayload::NoOp
                && (specialist_weight * 2.0).round() as usize >= 2;
            if evaluate_deferral {
                let deferral_confidence =
                    self.strategy.confidence(&issue, &RemediationPayload::NoOp);
                if deferral_confidence > best_confidence {
                    best = RemediationPayload::NoOp;
                    best_confidence = deferral_confidence;
                }
            }

            if best_confidence < threshold {
                outcome.discarded += 1;
                continue;
            }
            outcome.improvements.push(Improvement {
                id: Uuid::new_v4(),
                issue,
                payload: best,
                confidence: best_confidence,
                specialist,
                specialist_weight,
            });
        }

        outcome
    }
}
