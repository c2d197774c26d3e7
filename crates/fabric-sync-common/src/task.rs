//! Synchronization step outcomes.

use std::fmt;

use crate::error::SyncError;

/// The ordered steps of a synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    DeleteOutdatedFlatMappings,
    CreateMissing,
    DeleteOrphans,
    RepairUplinksets,
    RepairConnections,
}

impl SyncStep {
    /// All steps, in execution order.
    pub const ALL: [SyncStep; 5] = [
        SyncStep::DeleteOutdatedFlatMappings,
        SyncStep::CreateMissing,
        SyncStep::DeleteOrphans,
        SyncStep::RepairUplinksets,
        SyncStep::RepairConnections,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStep::DeleteOutdatedFlatMappings => "delete_outdated_flat_mappings",
            SyncStep::CreateMissing => "create_missing",
            SyncStep::DeleteOrphans => "delete_orphans",
            SyncStep::RepairUplinksets => "repair_uplinksets",
            SyncStep::RepairConnections => "repair_connections",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Every item reconciled
    Success,
    /// Some items failed and were left for the next pass
    Partial,
    /// The step could not run or no item succeeded
    Failed,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }
}

/// Item counters and the aborting error, if any, of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: SyncStep,
    /// Items reconciled (including no-ops).
    pub processed: usize,
    /// Items that failed.
    pub failed: usize,
    /// Error that stopped the step before it finished.
    pub aborted: Option<String>,
}

impl StepReport {
    pub fn new(step: SyncStep) -> Self {
        Self {
            step,
            processed: 0,
            failed: 0,
            aborted: None,
        }
    }

    pub fn record_ok(&mut self) {
        self.processed += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Records an item outcome.
    pub fn record<T>(&mut self, result: &Result<T, SyncError>) {
        match result {
            Ok(_) => self.record_ok(),
            Err(_) => self.record_failure(),
        }
    }

    /// Marks the step as stopped by `err`.
    pub fn abort(&mut self, err: &SyncError) {
        self.aborted = Some(err.to_string());
    }

    pub fn status(&self) -> StepStatus {
        if self.aborted.is_some() {
            StepStatus::Failed
        } else if self.failed == 0 {
            StepStatus::Success
        } else if self.processed > 0 {
            StepStatus::Partial
        } else {
            StepStatus::Failed
        }
    }
}

/// Outcome of a full synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub steps: Vec<StepReport>,
}

impl SyncReport {
    pub fn push(&mut self, report: StepReport) {
        self.steps.push(report);
    }

    pub fn step(&self, step: SyncStep) -> Option<&StepReport> {
        self.steps.iter().find(|r| r.step == step)
    }

    /// Returns true if every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|r| r.status().is_success())
    }

    pub fn total_failed(&self) -> usize {
        self.steps.iter().map(|r| r.failed).sum()
    }
}
