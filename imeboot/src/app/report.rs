//! Per-stage bootstrap outcome.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A bootstrap stage, in the order the immediate path runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Diagnostics,
    CrashReporting,
    Autosave,
    CacheSweep,
    StorageGate,
    LocaleData,
    Preferences,
    Dictionary,
    Theme,
    UnlockListener,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Diagnostics,
        Stage::CrashReporting,
        Stage::Autosave,
        Stage::CacheSweep,
        Stage::StorageGate,
        Stage::LocaleData,
        Stage::Preferences,
        Stage::Dictionary,
        Stage::Theme,
        Stage::UnlockListener,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Diagnostics => "diagnostics",
            Stage::CrashReporting => "crash_reporting",
            Stage::Autosave => "autosave",
            Stage::CacheSweep => "cache_sweep",
            Stage::StorageGate => "storage_gate",
            Stage::LocaleData => "locale_data",
            Stage::Preferences => "preferences",
            Stage::Dictionary => "dictionary",
            Stage::Theme => "theme",
            Stage::UnlockListener => "unlock_listener",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tri-state outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "cause", rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    NotRun,
    Succeeded,
    Failed(String),
}

impl StageStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, StageStatus::Succeeded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }
}

/// Which initialization path the storage gate selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPath {
    /// Storage was unlocked at start; everything ran in the first pass.
    Immediate,
    /// Storage was locked; the unlock listener completes the sequence.
    Deferred,
}

/// Outcome of the bootstrap passes run so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootReport {
    path: Option<BootPath>,
    stages: BTreeMap<Stage, StageStatus>,
    order: Vec<Stage>,
    aborted_at: Option<Stage>,
    deferred_passes: u32,
}

impl BootReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path selected by the storage gate, once evaluated.
    pub fn path(&self) -> Option<BootPath> {
        self.path
    }

    pub(crate) fn set_path(&mut self, path: BootPath) {
        self.path = Some(path);
    }

    /// Status of a stage; `NotRun` if it never started.
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.stages.get(&stage).cloned().unwrap_or_default()
    }

    /// Stages in the order they finished (successfully or not).
    pub fn completed_order(&self) -> &[Stage] {
        &self.order
    }

    /// The stage whose failure aborted a pass, if any.
    pub fn aborted_at(&self) -> Option<Stage> {
        self.aborted_at
    }

    /// Number of deferred passes started by the unlock listener.
    pub fn deferred_passes(&self) -> u32 {
        self.deferred_passes
    }

    /// Whether preferences and the storage-dependent managers are up.
    pub fn is_fully_initialized(&self) -> bool {
        [Stage::Preferences, Stage::Dictionary, Stage::Theme]
            .iter()
            .all(|stage| self.status(*stage).is_succeeded())
    }

    pub(crate) fn record_success(&mut self, stage: Stage) {
        self.stages.insert(stage, StageStatus::Succeeded);
        self.order.push(stage);
    }

    pub(crate) fn record_failure(&mut self, stage: Stage, cause: impl ToString) {
        self.stages
            .insert(stage, StageStatus::Failed(cause.to_string()));
        self.order.push(stage);
    }

    pub(crate) fn record_abort(&mut self, stage: Stage) {
        self.aborted_at = Some(stage);
    }

    pub(crate) fn record_deferred_pass(&mut self) {
        self.deferred_passes += 1;
    }

    /// The most recently finished stage that failed.
    pub fn last_failure(&self) -> Option<Stage> {
        self.order
            .iter()
            .rev()
            .copied()
            .find(|stage| self.status(*stage).is_failed())
    }
}

impl fmt::Display for BootReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path {
            Some(BootPath::Immediate) => writeln!(f, "path: immediate")?,
            Some(BootPath::Deferred) => writeln!(f, "path: deferred")?,
            None => writeln!(f, "path: undecided")?,
        }
        for stage in Stage::ALL {
            match self.status(stage) {
                StageStatus::NotRun => writeln!(f, "  {:<16} not run", stage)?,
                StageStatus::Succeeded => writeln!(f, "  {:<16} ok", stage)?,
                StageStatus::Failed(cause) => writeln!(f, "  {:<16} FAILED: {}", stage, cause)?,
            }
        }
        if let Some(stage) = self.aborted_at {
            writeln!(f, "aborted at: {}", stage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecorded_stage_is_not_run() {
        let report = BootReport::new();
        assert_eq!(report.status(Stage::Theme), StageStatus::NotRun);
        assert!(report.path().is_none());
        assert!(!report.is_fully_initialized());
    }

    #[test]
    fn test_order_follows_recording() {
        let mut report = BootReport::new();
        report.record_success(Stage::Preferences);
        report.record_success(Stage::Dictionary);
        report.record_failure(Stage::Theme, "no themes");

        assert_eq!(
            report.completed_order(),
            &[Stage::Preferences, Stage::Dictionary, Stage::Theme]
        );
        assert_eq!(report.last_failure(), Some(Stage::Theme));
        assert!(!report.is_fully_initialized());
    }

    #[test]
    fn test_display_lists_failures() {
        let mut report = BootReport::new();
        report.set_path(BootPath::Deferred);
        report.record_failure(Stage::LocaleData, "status 7");
        report.record_abort(Stage::Preferences);

        let text = report.to_string();
        assert!(text.contains("path: deferred"));
        assert!(text.contains("FAILED: status 7"));
        assert!(text.contains("aborted at: preferences"));
    }

    #[test]
    fn test_serializes_stage_names() {
        let mut report = BootReport::new();
        report.set_path(BootPath::Immediate);
        report.record_success(Stage::CacheSweep);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"immediate\""));
        assert!(json.contains("\"cache_sweep\""));
    }
}
