//! Scored snapshot of one scan
//!
//! `SystemState` is recreated from a fresh scan every cycle; it is never
//! carried over or mutated. Consolidation is a pure function of the issue
//! list, so identical scans always produce identical states.

use crate::issue::{Issue, Severity};
use serde::{Deserialize, Serialize};

/// Points deducted per open issue
const ISSUE_PENALTY: u32 = 5;

/// The consolidated result of one full scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemState {
    /// 0-100; every open issue costs five points
    pub quality_score: u8,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    /// Full issue list in discovery order
    pub issues: Vec<Issue>,
}

impl SystemState {
    /// Consolidate a scan's issues into a scored state. Pure; no I/O.
    pub fn consolidate(issues: Vec<Issue>) -> Self {
        let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();

        Self {
            quality_score: quality_score(issues.len()),
            critical_count: count(Severity::Critical),
            high_count: count(Severity::High),
            medium_count: count(Severity::Medium),
            low_count: count(Severity::Low),
            issues,
        }
    }

    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }
}

/// qualityScore = max(0, 100 - issues * 5)
pub fn quality_score(total_issues: usize) -> u8 {
    let penalty = (total_issues as u32).saturating_mul(ISSUE_PENALTY);
    100u32.saturating_sub(penalty) as u8
}
