//! Bounded application of synthesized improvements
//!
//! Improvements are applied sequentially in discovery order. Every mutation
//! re-reads its target from disk at apply time and writes atomically;
//! re-applying a payload that has already landed is a skip, not a failure.
//! Pre-images of every touched file are kept so a strict run can revert the
//! whole batch.

use crate::config::EngineConfig;
use crate::fault::{Fault, FaultKind};
use crate::scan::terminology::term_pattern;
use crate::synthesize::{Improvement, RemediationPayload};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Applied,
    Skipped,
    Failed,
}

impl ApplyStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Applied => "✓",
            Self::Skipped => "·",
            Self::Failed => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// One improvement's fate, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub improvement_id: Uuid,
    pub action: &'static str,
    pub target: String,
    pub status: ApplyStatus,
    pub detail: String,
}

/// Pre-image of a mutated file. `created` files have no pre-image and are
/// removed on revert.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub path: PathBuf,
    pub pre_image: Option<String>,
    pub created: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct ApplyReport {
    pub planned: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<ApplyOutcome>,
    #[serde(skip)]
    pub changes: Vec<AppliedChange>,
    #[serde(skip)]
    pub faults: Vec<Fault>,
}

impl ApplyReport {
    /// applied / planned, the signal the threshold evolves on.
    pub fn success_rate(&self) -> Option<f64> {
        if self.planned == 0 {
            None
        } else {
            Some(self.applied as f64 / self.planned as f64)
        }
    }
}

pub struct Applier {
    root: PathBuf,
    entry: PathBuf,
    manifest: PathBuf,
    targets: Vec<PathBuf>,
    dry_run: bool,
}

impl Applier {
    pub fn new(root: &Path, config: &EngineConfig, dry_run: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            entry: config.project.entry.clone(),
            manifest: config.project.manifest.clone(),
            targets: config.project.terminology_targets.clone(),
            dry_run,
        }
    }

    pub fn apply_all(&self, improvements: &[Improvement]) -> ApplyReport {
        let mut report = ApplyReport {
            planned: improvements.len(),
            ..ApplyReport::default()
        };

        for improvement in improvements {
            let (target, result) = self.apply_one(improvement);
            match result {
                Ok((status, detail, mut changes)) => {
                    match status {
                        ApplyStatus::Applied => report.applied += 1,
                        ApplyStatus::Skipped => report.skipped += 1,
                        ApplyStatus::Failed => report.failed += 1,
                    }
                    report.changes.append(&mut changes);
                    report.outcomes.push(ApplyOutcome {
                        improvement_id: improvement.id,
                        action: improvement.payload.label(),
                        target,
                        status,
                        detail,
                    });
                }
                Err(err) => {
                    report.failed += 1;
                    report.faults.push(Fault::new(
                        FaultKind::Remediation,
                        improvement.issue.context(),
                        format!("{err:#}"),
                    ));
                    report.outcomes.push(ApplyOutcome {
                        improvement_id: improvement.id,
                        action: improvement.payload.label(),
                        target,
                        status: ApplyStatus::Failed,
                        detail: format!("{err:#}"),
                    });
                }
            }
        }

        report
    }

    fn apply_one(
        &self,
        improvement: &Improvement,
    ) -> (String, Result<(ApplyStatus, String, Vec<AppliedChange>)>) {
        match &improvement.payload {
            RemediationPayload::ModuleScaffold { module } => {
                let target = PathBuf::from(format!("{}.js", artifact_stem(module)));
                (
                    target.display().to_string(),
                    self.scaffold(module, &target),
                )
            }
            RemediationPayload::TerminologySubstitution { term, replacement } => {
                (term.clone(), self.substitute(term, replacement))
            }
            RemediationPayload::ConfigPatch { fragment } => (
                self.manifest.display().to_string(),
                self.patch_manifest(fragment),
            ),
            RemediationPayload::NoOp => (
                improvement
                    .issue
                    .file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                Ok((
                    ApplyStatus::Skipped,
                    "deferred for manual review".to_string(),
                    Vec::new(),
                )),
            ),
        }
    }

    /// Create the module artifact and wire a require line into the entry.
    /// Only modules with a registered template are scaffolded; both halves
    /// check before writing, so re-runs converge.
    fn scaffold(
        &self,
        module: &str,
        target: &Path,
    ) -> Result<(ApplyStatus, String, Vec<AppliedChange>)> {
        let Some(template) = scaffold_template(module) else {
            eprintln!("warning: no scaffold template registered for module '{module}'");
            return Ok((
                ApplyStatus::Skipped,
                format!("no template registered for '{module}'"),
                Vec::new(),
            ));
        };
        // The artifact write and the entry wiring each check the disk for
        // themselves: an artifact left behind by an earlier partial apply
        // still gets its require line.
        let abs_target = self.root.join(target);
        let create_artifact = !abs_target.exists();
        let mut changes = Vec::new();
        if create_artifact && !self.dry_run {
            write_atomic(&abs_target, &template)?;
            changes.push(AppliedChange {
                path: abs_target,
                pre_image: None,
                created: true,
            });
        }

        let abs_entry = self.root.join(&self.entry);
        let entry_before = match fs::read_to_string(&abs_entry) {
            Ok(content) => Some(content),
            Err(_) => None,
        };
        let stem = artifact_stem(module);
        let wired = wire_require(entry_before.as_deref().unwrap_or("'use strict';\n"), &stem);
        let wire_needed = wired.is_some();
        if let Some(new_entry) = wired {
            if !self.dry_run {
                write_atomic(&abs_entry, &new_entry)?;
                changes.push(AppliedChange {
                    path: abs_entry,
                    created: entry_before.is_none(),
                    pre_image: entry_before,
                });
            }
        }

        let (status, detail) = match (create_artifact, wire_needed) {
            (true, true) => (
                ApplyStatus::Applied,
                format!("created {}, wired into {}", target.display(), self.entry.display()),
            ),
            (true, false) => (
                ApplyStatus::Applied,
                format!(
                    "created {} ({} already references it)",
                    target.display(),
                    self.entry.display()
                ),
            ),
            (false, true) => (
                ApplyStatus::Applied,
                format!(
                    "{} already exists, wired into {}",
                    target.display(),
                    self.entry.display()
                ),
            ),
            (false, false) => (
                ApplyStatus::Skipped,
                format!(
                    "{} exists and {} already references it",
                    target.display(),
                    self.entry.display()
                ),
            ),
        };
        Ok((status, detail, changes))
    }

    /// Replace every remaining occurrence of `term` across the terminology
    /// target files, keeping the case shape of each match. Absent targets
    /// are not an error.
    fn substitute(
        &self,
        term: &str,
        replacement: &str,
    ) -> Result<(ApplyStatus, String, Vec<AppliedChange>)> {
        let Some(re) = term_pattern(term) else {
            bail!("term '{term}' does not form a valid pattern");
        };

        let mut total = 0usize;
        let mut touched = 0usize;
        let mut changes = Vec::new();
        for target in &self.targets {
            let abs = self.root.join(target);
            let Ok(content) = fs::read_to_string(&abs) else {
                continue;
            };
            let count = re.find_iter(&content).count();
            if count == 0 {
                continue;
            }
            total += count;
            touched += 1;
            if !self.dry_run {
                let rewritten = re
                    .replace_all(&content, |caps: &regex::Captures| {
                        preserve_case(&caps[0], replacement)
                    })
                    .into_owned();
                write_atomic(&abs, &rewritten)?;
                changes.push(AppliedChange {
                    path: abs,
                    pre_image: Some(content),
                    created: false,
                });
            }
        }

        if total == 0 {
            return Ok((
                ApplyStatus::Skipped,
                format!("no occurrences of '{term}' remain"),
                Vec::new(),
            ));
        }

        Ok((
            ApplyStatus::Applied,
            format!("replaced {total} occurrence(s) of '{term}' across {touched} file(s)"),
            changes,
        ))
    }

    /// Deep-merge a JSON fragment into the manifest, creating it when
    /// absent. A fragment already reflected in the manifest is a skip.
    fn patch_manifest(
        &self,
        fragment: &Value,
    ) -> Result<(ApplyStatus, String, Vec<AppliedChange>)> {
        let abs = self.root.join(&self.manifest);
        let (raw, existed) = match fs::read_to_string(&abs) {
            Ok(content) => (content, true),
            Err(_) => ("{}".to_string(), false),
        };
        let mut manifest: Value = serde_json::from_str(&raw)
            .with_context(|| format!("unparsable manifest {}", self.manifest.display()))?;

        let before = manifest.clone();
        deep_merge(&mut manifest, fragment);
        if manifest == before && existed {
            return Ok((
                ApplyStatus::Skipped,
                "manifest already satisfies patch".to_string(),
                Vec::new(),
            ));
        }

        let mut changes = Vec::new();
        if !self.dry_run {
            let mut serialized = serde_json::to_string_pretty(&manifest)?;
            serialized.push('\n');
            write_atomic(&abs, &serialized)?;
            changes.push(AppliedChange {
                path: abs,
                pre_image: existed.then_some(raw),
                created: !existed,
            });
        }

        Ok((
            ApplyStatus::Applied,
            format!("patched {}", self.manifest.display()),
            changes,
        ))
    }

    /// Undo a batch, newest change first. Created files are removed,
    /// modified files get their pre-image back.
    pub fn revert(&self, changes: &[AppliedChange]) -> Result<()> {
        for change in changes.iter().rev() {
            if change.created {
                match fs::remove_file(&change.path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("remove {} during revert", change.path.display())
                        });
                    }
                }
            } else if let Some(pre_image) = &change.pre_image {
                write_atomic(&change.path, pre_image)?;
            }
        }
        Ok(())
    }
}

/// Module artifact stem: hyphens and spaces collapse to underscores.
fn artifact_stem(module: &str) -> String {
    module.replace(['-', ' '], "_")
}

fn pascal_case(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn module_purpose(module: &str) -> Option<&'static str> {
    match artifact_stem(module).as_str() {
        "terminology_governance" => Some("Evaluates project artifacts against the approved terminology map."),
        "collaboration_bridge" => Some("Coordinates human review handoffs for engine output."),
        "metacognitive_monitor" => Some("Tracks decision quality across improvement cycles."),
        "adaptive_improvement" => Some("Plans follow-up work from validation outcomes."),
        "communication_protocol" => Some("Defines the message shapes exchanged between modules."),
        "validation_suite" => Some("Runs post-change verification probes."),
        "metrics_exporter" => Some("Publishes engine health counters."),
        "integrity_guard" => Some("Guards invariants that changes must not break."),
        _ => None,
    }
}

/// Template body for a known module name; None for anything outside the
/// registered set.
pub fn scaffold_template(module: &str) -> Option<String> {
    let purpose = module_purpose(module)?;
    let class = pascal_case(module);
    let stem = artifact_stem(module);
    let body = format!(
        "'use strict';\n\n\
         // {purpose}\n\
         class {class} {{\n\
         \x20 constructor() {{\n\
         \x20   this.ready = false;\n\
         \x20 }}\n\n\
         \x20 async initialize() {{\n\
         \x20   this.ready = true;\n\
         \x20   return this.ready;\n\
         \x20 }}\n\n\
         \x20 healthCheck() {{\n\
         \x20   return {{ module: '{stem}', status: this.ready ? 'ready' : 'initializing' }};\n\
         \x20 }}\n\
         }}\n\n\
         module.exports = new {class}();\n",
    );
    Some(body)
}

/// New entry content with a require line for `stem`, or None when the line
/// is already present. The line lands after the last existing require,
/// else after a 'use strict' prologue, else at the top.
fn wire_require(entry: &str, stem: &str) -> Option<String> {
    if entry.contains(&format!("require('./{stem}')")) {
        return None;
    }
    let line = format!("const {stem} = require('./{stem}');");
    let mut lines: Vec<String> = entry.lines().map(str::to_string).collect();
    let at = lines
        .iter()
        .rposition(|l| l.contains("require("))
        .map(|i| i + 1)
        .or_else(|| lines.iter().position(|l| l.contains("use strict")).map(|i| i + 1))
        .unwrap_or(0);
    lines.insert(at, line);
    let mut out = lines.join("\n");
    out.push('\n');
    Some(out)
}

/// Mirror the case shape of the matched text onto the replacement:
/// all-caps stays all-caps, leading capital stays a leading capital.
pub fn preserve_case(matched: &str, replacement: &str) -> String {
    let has_upper = matched.chars().any(|c| c.is_uppercase());
    if has_upper && !matched.chars().any(|c| c.is_lowercase()) {
        replacement.to_uppercase()
    } else if matched.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

fn deep_merge(base: &mut Value, fragment: &Value) {
    match (base, fragment) {
        (Value::Object(base_map), Value::Object(frag_map)) => {
            for (key, value) in frag_map {
                deep_merge(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Write via temp file and rename so readers never see a torn file.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)
        .with_context(|| format!("create parent directory {}", parent.display()))?;
    let tmp = parent.join(format!(".steward-tmp-{}", std::process::id()));
    fs::write(&tmp, content).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename into place at {}", path.display()))?;
    Ok(())
}
