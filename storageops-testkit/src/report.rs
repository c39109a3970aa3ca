//! Suite results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Name,
    Create,
    ResolveId,
    Snapshot,
    Tags,
    Enumerate,
    Inspect,
    AttachCycle,
    DevicePath,
    Teardown,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 10] = [
        Stage::Name,
        Stage::Create,
        Stage::ResolveId,
        Stage::Snapshot,
        Stage::Tags,
        Stage::Enumerate,
        Stage::Inspect,
        Stage::AttachCycle,
        Stage::DevicePath,
        Stage::Teardown,
    ];

    /// Stage name as a stable string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Name => "name",
            Stage::Create => "create",
            Stage::ResolveId => "resolve_id",
            Stage::Snapshot => "snapshot",
            Stage::Tags => "tags",
            Stage::Enumerate => "enumerate",
            Stage::Inspect => "inspect",
            Stage::AttachCycle => "attach_cycle",
            Stage::DevicePath => "device_path",
            Stage::Teardown => "teardown",
        }
    }

    /// Whether a driver may skip this stage by returning the capability sentinel.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Stage::Snapshot | Stage::Tags | Stage::Enumerate | Stage::Inspect
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Ran and every check held.
    Passed,
    /// The driver reported the capability as unsupported.
    Skipped,
    /// An operation errored or a check failed.
    Failed,
    /// Not reached because an earlier stage failed.
    NotRun,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Passed => "passed",
            StageStatus::Skipped => "skipped",
            StageStatus::Failed => "failed",
            StageStatus::NotRun => "not_run",
        }
    }
}

/// A single failure within a (driver, fixture) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Stage the failure occurred in.
    pub stage: Stage,
    /// Driver operation or check that failed.
    pub operation: String,
    /// Error or assertion message.
    pub message: String,
    /// Stable error type when the driver returned an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.operation, self.message)
    }
}

/// Status of one stage within a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
}

/// Result of running one fixture against one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairReport {
    /// Driver name.
    pub driver: String,
    /// Fixture name.
    pub fixture: String,
    /// Identifier of the disk created for this run, once resolved.
    pub device_id: Option<String>,
    /// Per-stage status, in execution order.
    pub stages: Vec<StageOutcome>,
    /// Every failure recorded, teardown included.
    pub failures: Vec<Failure>,
}

impl PairReport {
    /// Create a report with every stage not yet run.
    pub fn new(driver: impl Into<String>, fixture: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            fixture: fixture.into(),
            device_id: None,
            stages: Stage::ALL
                .iter()
                .map(|&stage| StageOutcome {
                    stage,
                    status: StageStatus::NotRun,
                })
                .collect(),
            failures: Vec::new(),
        }
    }

    /// Whether the run recorded no failures.
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Status of a stage.
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.stages
            .iter()
            .find(|o| o.stage == stage)
            .map(|o| o.status)
            .unwrap_or(StageStatus::NotRun)
    }

    /// Record the status of a stage.
    pub fn set_status(&mut self, stage: Stage, status: StageStatus) {
        if let Some(outcome) = self.stages.iter_mut().find(|o| o.stage == stage) {
            outcome.status = status;
        }
    }

    /// Record a failure and mark its stage failed.
    pub fn fail(&mut self, failure: Failure) {
        self.set_status(failure.stage, StageStatus::Failed);
        self.failures.push(failure);
    }

    /// Stages skipped because the driver lacks the capability.
    pub fn skipped(&self) -> Vec<Stage> {
        self.stages_with(StageStatus::Skipped)
    }

    /// Stages with the given status.
    pub fn stages_with(&self, status: StageStatus) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|o| o.status == status)
            .map(|o| o.stage)
            .collect()
    }

    /// First failure, if any.
    pub fn first_failure(&self) -> Option<&Failure> {
        self.failures.first()
    }
}

/// Counts across a suite run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub pairs: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped_stages: usize,
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run(s): {} passed, {} failed, {} stage(s) skipped",
            self.pairs, self.passed, self.failed, self.skipped_stages
        )
    }
}

/// Aggregated results of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub pairs: Vec<PairReport>,
}

impl SuiteReport {
    /// Whether every pair passed.
    pub fn passed(&self) -> bool {
        self.pairs.iter().all(PairReport::passed)
    }

    /// Pairs with at least one failure.
    pub fn failed_pairs(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|p| !p.passed())
    }

    /// Find the report for a (driver, fixture) pair.
    pub fn pair(&self, driver: &str, fixture: &str) -> Option<&PairReport> {
        self.pairs
            .iter()
            .find(|p| p.driver == driver && p.fixture == fixture)
    }

    /// Counts across all pairs.
    pub fn summary(&self) -> SuiteSummary {
        let passed = self.pairs.iter().filter(|p| p.passed()).count();
        SuiteSummary {
            pairs: self.pairs.len(),
            passed,
            failed: self.pairs.len() - passed,
            skipped_stages: self.pairs.iter().map(|p| p.skipped().len()).sum(),
        }
    }

    /// Panic with every failure if any pair failed.
    ///
    /// Call this from a `#[test]` so failures surface through the test harness.
    pub fn assert_passed(&self) {
        if self.passed() {
            return;
        }
        let mut msg = format!("conformance suite failed: {}\n", self.summary());
        for pair in self.failed_pairs() {
            msg.push_str(&format!("driver {} / fixture {}:\n", pair.driver, pair.fixture));
            for failure in &pair.failures {
                msg.push_str(&format!("  {}\n", failure));
            }
        }
        panic!("{}", msg);
    }
}
