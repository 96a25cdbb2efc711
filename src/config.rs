//! Engine configuration
//!
//! Per-project settings live in `steward.toml` at the governed project's
//! root. Every field is optional; omitted fields fall back to the defaults
//! below, so an empty or absent file configures the stock governance policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "steward.toml";

/// Top-level configuration for one governed project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    /// Restricted term -> approved replacement. A `BTreeMap` keeps scan and
    /// substitution order deterministic across runs.
    #[serde(default = "default_terminology")]
    pub terminology: BTreeMap<String, String>,
}

/// Which artifacts of the governed tree the engine reads and patches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Designated entry artifact, relative to the project root
    #[serde(default = "default_entry")]
    pub entry: PathBuf,
    /// Dependency manifest, relative to the project root
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    /// Fixed set of files scanned (and rewritten) for restricted terms
    #[serde(default = "default_terminology_targets")]
    pub terminology_targets: Vec<PathBuf>,
}

/// Governance policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Modules the entry artifact is expected to implement
    #[serde(default = "default_critical_modules")]
    pub critical_modules: Vec<String>,
    /// Declarations the manifest is expected to carry
    #[serde(default = "default_required_declarations")]
    pub required_declarations: Vec<String>,
    /// How many top issues each cycle may remediate
    #[serde(default = "default_selection_size")]
    pub selection_size: usize,
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
    /// Starting acceptance threshold; adapts within fixed bounds across cycles
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// When true, a failed advisory validation reverts that cycle's writes
    #[serde(default)]
    pub strict_validation: bool,
    /// Files larger than this are flagged as a performance smell
    #[serde(default = "default_max_file_kb")]
    pub max_file_kb: u64,
}

fn default_entry() -> PathBuf {
    PathBuf::from("index.js")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_terminology_targets() -> Vec<PathBuf> {
    vec![
        PathBuf::from("README.md"),
        PathBuf::from("index.js"),
        PathBuf::from("docs/architecture.md"),
    ]
}

fn default_critical_modules() -> Vec<String> {
    [
        "terminology_governance",
        "collaboration_bridge",
        "metacognitive_monitor",
        "adaptive_improvement",
        "communication_protocol",
        "validation_suite",
        "metrics_exporter",
        "integrity_guard",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_required_declarations() -> Vec<String> {
    vec![
        "@modelcontextprotocol/sdk".to_string(),
        "zod".to_string(),
    ]
}

fn default_selection_size() -> usize {
    3
}

fn default_max_cycles() -> usize {
    10
}

fn default_confidence_threshold() -> f64 {
    0.85
}

fn default_max_file_kb() -> u64 {
    100
}

/// The stock restricted-term map: theory-flavored vocabulary to the
/// market-approved replacement for each term.
fn default_terminology() -> BTreeMap<String, String> {
    [
        ("quantum", "high-performance algorithmic"),
        ("consciousness", "metacognitive awareness"),
        ("symbiotic", "human-ai collaborative"),
        ("transcendence", "advanced capability"),
        ("dimensional", "multi-context"),
        ("evolution", "adaptive improvement"),
        ("sacred", "core integrity"),
        ("non-local", "distributed"),
        ("entanglement", "inter-module coupling"),
        ("superposition", "parallel processing"),
        ("resonance", "data synchronization"),
        ("harmony", "system coherence"),
        ("mind union", "cognitive integration"),
        ("co-evolution", "joint development"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            manifest: default_manifest(),
            terminology_targets: default_terminology_targets(),
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            critical_modules: default_critical_modules(),
            required_declarations: default_required_declarations(),
            selection_size: default_selection_size(),
            max_cycles: default_max_cycles(),
            confidence_threshold: default_confidence_threshold(),
            strict_validation: false,
            max_file_kb: default_max_file_kb(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            governance: GovernanceConfig::default(),
            terminology: default_terminology(),
        }
    }
}

impl EngineConfig {
    /// Load config from `<root>/steward.toml`, or return defaults.
    ///
    /// The file is user-authored, so a parse failure only warns and falls
    /// back to defaults; the file itself is left untouched.
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        if let Ok(content) = fs::read_to_string(&path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(err) => {
                    eprintln!(
                        "  Warning: {} could not be parsed ({}). Using defaults.",
                        CONFIG_FILE, err
                    );
                }
            }
        }
        Self::default()
    }
}
