//! Lifecycle runner.
//!
//! Drives one driver through one fixture at a time:
//!
//! ```text
//! name -> create -> resolve id -> snapshot? -> tags? -> enumerate? -> inspect?
//!      -> attach cycle -> device path -> teardown
//! ```
//!
//! Optional stages are skipped when the driver returns the capability
//! sentinel. Any other error or failed check ends the run for that pair, but
//! teardown still runs for any disk that was identified, and the suite moves
//! on to the next pair.

use std::collections::BTreeMap;
use std::thread;

use log::{debug, info, warn};
use storageops_core::{DeviceObject, OpsError, OpsResult, SetIdentifier, StorageOps, TagSet};

use crate::assertions::{self, AssertResult};
use crate::config::SuiteConfig;
use crate::fixture::{Fixture, FixtureCatalog};
use crate::report::{Failure, PairReport, Stage, StageStatus, SuiteReport};

/// A single label no driver can already carry.
pub fn random_labels() -> TagSet {
    let random = uuid::Uuid::new_v4().simple().to_string();
    let mut labels = TagSet::new();
    labels.insert(format!("key{}", random), format!("val{}", random));
    labels
}

/// State of one (driver, fixture) run.
struct PairRun<'a, O: StorageOps + ?Sized> {
    driver: &'a O,
    config: &'a SuiteConfig,
    report: PairReport,
    /// Path returned by the most recent successful attach.
    attached_path: Option<String>,
    /// Set before attach, cleared after a successful detach.
    may_be_attached: bool,
}

impl<'a, O: StorageOps + ?Sized> PairRun<'a, O> {
    fn new(driver: &'a O, fixture: &str, config: &'a SuiteConfig) -> Self {
        Self {
            driver,
            config,
            report: PairReport::new(driver.name(), fixture),
            attached_path: None,
            may_be_attached: false,
        }
    }

    /// Map a required operation's error to a failure.
    fn call<T>(&self, stage: Stage, operation: &str, result: OpsResult<T>) -> Result<T, Failure> {
        result.map_err(|e| {
            let message = if e.is_not_supported() {
                format!("required operation returned the capability sentinel: {}", e)
            } else {
                e.to_string()
            };
            Failure {
                stage,
                operation: operation.to_string(),
                message,
                error_type: Some(e.error_type().to_string()),
            }
        })
    }

    /// Like [`call`](Self::call), but in an optional stage the capability
    /// sentinel yields `None`.
    fn optional<T>(
        &self,
        stage: Stage,
        operation: &str,
        result: OpsResult<T>,
    ) -> Result<Option<T>, Failure> {
        match result {
            Err(OpsError::NotSupported) if stage.is_optional() => {
                info!(
                    "Driver {} does not support {}, skipping {} stage",
                    self.report.driver, operation, stage
                );
                Ok(None)
            }
            other => self.call(stage, operation, other).map(Some),
        }
    }

    fn check(&self, stage: Stage, operation: &str, result: AssertResult) -> Result<(), Failure> {
        result.map_err(|e| Failure {
            stage,
            operation: operation.to_string(),
            message: e.to_string(),
            error_type: None,
        })
    }

    /// Run a stage and record its outcome. Returns whether the run continues.
    fn step(&mut self, stage: Stage, f: impl FnOnce(&mut Self) -> Result<StageStatus, Failure>) -> bool {
        debug!(
            "Driver {} fixture {}: {} stage",
            self.report.driver, self.report.fixture, stage
        );
        match f(self) {
            Ok(status) => {
                self.report.set_status(stage, status);
                true
            }
            Err(failure) => {
                warn!(
                    "Driver {} fixture {} failed: {}",
                    self.report.driver, self.report.fixture, failure
                );
                self.report.fail(failure);
                false
            }
        }
    }

    /// Name check, create and id resolution. Returns the device id to tear down.
    fn provision(&mut self, template: &O::Template) -> Option<String> {
        if !self.step(Stage::Name, |run| {
            run.check(
                Stage::Name,
                "name",
                assertions::not_empty("driver name", run.driver.name()),
            )?;
            Ok(StageStatus::Passed)
        }) {
            return None;
        }

        let mut disk = None;
        if !self.step(Stage::Create, |run| {
            disk = Some(run.call(Stage::Create, "create", run.driver.create(template, None))?);
            Ok(StageStatus::Passed)
        }) {
            return None;
        }
        let disk = disk?;

        let mut device_id = None;
        let resolved = self.step(Stage::ResolveId, |run| {
            let id = run.call(
                Stage::ResolveId,
                "device_id",
                run.driver.device_id(DeviceObject::Disk(&disk)),
            )?;
            run.check(Stage::ResolveId, "device_id", assertions::not_empty("disk ID", &id))?;
            device_id = Some(id);
            Ok(StageStatus::Passed)
        });

        if !resolved {
            self.report.fail(Failure {
                stage: Stage::Teardown,
                operation: "delete".to_string(),
                message: "disk was created but never identified; it cannot be torn down".to_string(),
                error_type: None,
            });
            return None;
        }

        if let Some(id) = &device_id {
            info!("Created disk {} with driver {}", id, self.report.driver);
            self.report.device_id = Some(id.clone());
        }
        device_id
    }

    /// Every stage between identification and teardown, stopping at the first failure.
    fn exercise(&mut self, id: &str) {
        let stages: [(Stage, fn(&mut Self, &str) -> Result<StageStatus, Failure>); 6] = [
            (Stage::Snapshot, Self::snapshot),
            (Stage::Tags, Self::tags),
            (Stage::Enumerate, Self::enumerate),
            (Stage::Inspect, Self::inspect),
            (Stage::AttachCycle, Self::attach_cycle),
            (Stage::DevicePath, Self::device_path),
        ];
        for (stage, f) in stages {
            if !self.step(stage, |run| f(run, id)) {
                break;
            }
        }
    }

    fn snapshot(&mut self, id: &str) -> Result<StageStatus, Failure> {
        let stage = Stage::Snapshot;
        let Some(snap) = self.optional(stage, "snapshot", self.driver.snapshot(id, true))? else {
            return Ok(StageStatus::Skipped);
        };

        let snap_id = self.call(
            stage,
            "device_id",
            self.driver.device_id(DeviceObject::Snapshot(&snap)),
        )?;
        self.check(stage, "device_id", assertions::not_empty("snapshot ID", &snap_id))?;

        self.call(stage, "snapshot_delete", self.driver.snapshot_delete(&snap_id))?;
        Ok(StageStatus::Passed)
    }

    fn tags(&mut self, id: &str) -> Result<StageStatus, Failure> {
        let stage = Stage::Tags;
        let labels = &self.config.labels;

        if self
            .optional(stage, "apply_tags", self.driver.apply_tags(id, labels))?
            .is_none()
        {
            return Ok(StageStatus::Skipped);
        }

        let tags = self.call(stage, "tags", self.driver.tags(id))?;
        self.check(
            stage,
            "tags",
            assertions::exact_len("labels after apply", labels.len(), tags.len()),
        )?;
        self.check(stage, "tags", assertions::tags_equal(labels, &tags))?;

        self.call(stage, "remove_tags", self.driver.remove_tags(id, labels))?;
        let tags = self.call(stage, "tags", self.driver.tags(id))?;
        self.check(
            stage,
            "tags",
            assertions::exact_len("labels after remove", 0, tags.len()),
        )?;

        // Reapply: must not error, and leaves labels in place for enumeration.
        self.call(stage, "apply_tags", self.driver.apply_tags(id, labels))?;
        Ok(StageStatus::Passed)
    }

    fn enumerate(&mut self, id: &str) -> Result<StageStatus, Failure> {
        let stage = Stage::Enumerate;
        let ids = [id.to_string()];
        let filter = if self.report.status(Stage::Tags) == StageStatus::Passed {
            self.config.labels.clone()
        } else {
            TagSet::new()
        };

        let Some(found) = self.optional(
            stage,
            "enumerate",
            self.driver.enumerate(&ids, &filter, &SetIdentifier::None),
        )?
        else {
            return Ok(StageStatus::Skipped);
        };
        self.check(
            stage,
            "enumerate",
            assertions::exact_len("enumerate with applied labels", 1, found.object_count()),
        )?;

        let invalid = random_labels();
        let found = self.call(
            stage,
            "enumerate",
            self.driver.enumerate(&ids, &invalid, &SetIdentifier::None),
        )?;
        self.check(
            stage,
            "enumerate",
            assertions::no_matches("enumerate with random labels", found.object_count()),
        )?;
        Ok(StageStatus::Passed)
    }

    fn inspect(&mut self, id: &str) -> Result<StageStatus, Failure> {
        let stage = Stage::Inspect;
        let Some(disks) = self.optional(stage, "inspect", self.driver.inspect(&[id.to_string()]))? else {
            return Ok(StageStatus::Skipped);
        };
        self.check(
            stage,
            "inspect",
            assertions::exact_len("inspect results", 1, disks.len()),
        )?;
        Ok(StageStatus::Passed)
    }

    fn attach_once(&mut self, id: &str) -> Result<(), Failure> {
        let stage = Stage::AttachCycle;
        self.may_be_attached = true;
        let path = self.call(stage, "attach", self.driver.attach(id))?;
        self.check(stage, "attach", assertions::not_empty("device path from attach", &path))?;

        let mappings = self.call(stage, "device_mappings", self.driver.device_mappings())?;
        self.check(
            stage,
            "device_mappings",
            assertions::collection_not_empty("device mappings", mappings.len()),
        )?;
        debug!("Disk {} attached at {}", id, path);
        self.attached_path = Some(path);
        Ok(())
    }

    fn attach_cycle(&mut self, id: &str) -> Result<StageStatus, Failure> {
        self.attach_once(id)?;

        let instance = self.driver.instance_id();
        self.call(
            Stage::AttachCycle,
            "detach_from",
            self.driver.detach_from(id, &instance),
        )?;
        self.may_be_attached = false;
        self.attached_path = None;

        self.attach_once(id)?;
        Ok(StageStatus::Passed)
    }

    fn device_path(&mut self, id: &str) -> Result<StageStatus, Failure> {
        let stage = Stage::DevicePath;
        let path = self.call(stage, "device_path", self.driver.device_path(id))?;
        self.check(stage, "device_path", assertions::not_empty("device path", &path))?;
        if let Some(attached) = &self.attached_path {
            self.check(
                stage,
                "device_path",
                assertions::same_path("device path after reattach", attached, &path),
            )?;
        }
        Ok(StageStatus::Passed)
    }

    /// Detach (if the disk may be attached), wait, then delete.
    ///
    /// Both calls are attempted regardless of each other's outcome.
    fn teardown(&mut self, id: &str) {
        let stage = Stage::Teardown;
        let mut failures = Vec::new();

        // Detaching a disk that is not attached fails on real backends
        // (volume_detached), which would mask the delete result.
        if self.may_be_attached {
            match self.call(stage, "detach", self.driver.detach(id)) {
                Ok(()) => self.may_be_attached = false,
                Err(f) => failures.push(f),
            }
            let delay = self.config.settle_delay();
            if !delay.is_zero() {
                debug!("Waiting {:?} for detach of {} to settle", delay, id);
                thread::sleep(delay);
            }
        } else {
            debug!("Disk {} is not attached, skipping detach", id);
        }

        if let Err(f) = self.call(stage, "delete", self.driver.delete(id)) {
            failures.push(f);
        }

        if failures.is_empty() {
            self.report.set_status(stage, StageStatus::Passed);
            info!("Tore down disk {} with driver {}", id, self.report.driver);
        } else {
            for failure in failures {
                warn!("Teardown of {} failed: {}", id, failure);
                self.report.fail(failure);
            }
        }
    }
}

/// Run the full lifecycle of one fixture against one driver.
pub fn run_pair<O: StorageOps + ?Sized>(
    driver: &O,
    fixture: &Fixture<O::Template>,
    config: &SuiteConfig,
) -> PairReport {
    let mut run = PairRun::new(driver, &fixture.name, config);

    if let Some(id) = run.provision(&fixture.template) {
        run.exercise(&id);
        run.teardown(&id);
    }

    if run.report.passed() {
        info!("PASS driver {} fixture {}", run.report.driver, run.report.fixture);
    } else {
        warn!(
            "FAIL driver {} fixture {} ({} failure(s))",
            run.report.driver,
            run.report.fixture,
            run.report.failures.len()
        );
    }
    run.report
}

/// A driver with its fixtures, erased to a common type so drivers with
/// different handle types can share a suite.
pub trait ConformanceTarget {
    /// Name of the driver under test.
    fn driver_name(&self) -> String;

    /// Names of the fixtures that will be run.
    fn fixture_names(&self) -> Vec<String>;

    /// Run every fixture, in order.
    fn run(&self, config: &SuiteConfig) -> Vec<PairReport>;
}

struct Registered<'a, O: StorageOps + ?Sized> {
    driver: &'a O,
    fixtures: &'a [Fixture<O::Template>],
}

impl<O: StorageOps + ?Sized> ConformanceTarget for Registered<'_, O> {
    fn driver_name(&self) -> String {
        self.driver.name().to_string()
    }

    fn fixture_names(&self) -> Vec<String> {
        self.fixtures.iter().map(|f| f.name.clone()).collect()
    }

    fn run(&self, config: &SuiteConfig) -> Vec<PairReport> {
        if self.fixtures.is_empty() {
            warn!("No fixtures registered for driver {}", self.driver.name());
        }
        self.fixtures
            .iter()
            .map(|fixture| run_pair(self.driver, fixture, config))
            .collect()
    }
}

/// A set of drivers and fixtures run sequentially.
pub struct Suite<'a> {
    config: SuiteConfig,
    targets: Vec<Box<dyn ConformanceTarget + 'a>>,
}

impl<'a> Suite<'a> {
    /// Create an empty suite.
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            targets: Vec::new(),
        }
    }

    /// The suite configuration.
    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Register a driver with the catalog fixtures listed under its name.
    pub fn register<O: StorageOps + ?Sized>(
        &mut self,
        driver: &'a O,
        catalog: &'a FixtureCatalog<O::Template>,
    ) -> &mut Self {
        self.register_fixtures(driver, catalog.fixtures_for(driver.name()))
    }

    /// Register a driver with an explicit fixture list.
    pub fn register_fixtures<O: StorageOps + ?Sized>(
        &mut self,
        driver: &'a O,
        fixtures: &'a [Fixture<O::Template>],
    ) -> &mut Self {
        self.register_target(Box::new(Registered { driver, fixtures }))
    }

    /// Register a pre-built target.
    pub fn register_target(&mut self, target: Box<dyn ConformanceTarget + 'a>) -> &mut Self {
        self.targets.push(target);
        self
    }

    /// Number of registered drivers.
    pub fn driver_count(&self) -> usize {
        self.targets.len()
    }

    /// Run every fixture of every driver. A failing pair does not stop the suite.
    pub fn run(&self) -> SuiteReport {
        let mut report = SuiteReport::default();
        for target in &self.targets {
            info!(
                "Running {} fixture(s) against driver {}",
                target.fixture_names().len(),
                target.driver_name()
            );
            report.pairs.extend(target.run(&self.config));
        }
        let summary = report.summary();
        info!("Conformance suite finished: {}", summary);
        report
    }
}

/// Run every driver against the fixtures listed under its name.
///
/// Drivers are visited in map order; fixtures are looked up by
/// [`StorageOps::name`], not by map key.
pub fn run_suite<O: StorageOps>(
    drivers: &BTreeMap<String, O>,
    catalog: &FixtureCatalog<O::Template>,
    config: &SuiteConfig,
) -> SuiteReport {
    let mut suite = Suite::new(config.clone());
    for driver in drivers.values() {
        suite.register(driver, catalog);
    }
    suite.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDriver;

    #[test]
    fn sentinel_skips_only_optional_stages() {
        let driver = MemoryDriver::new("mock");
        let config = SuiteConfig::default();
        let run = PairRun::new(&driver, "small", &config);

        let skipped = run.optional::<()>(Stage::Inspect, "inspect", Err(OpsError::NotSupported));
        assert_eq!(skipped, Ok(None));

        let failure = run
            .optional::<()>(Stage::AttachCycle, "attach", Err(OpsError::NotSupported))
            .unwrap_err();
        assert_eq!(failure.stage, Stage::AttachCycle);
        assert_eq!(failure.error_type.as_deref(), Some("not_supported"));
        assert!(failure.message.contains("capability sentinel"));
    }

    #[test]
    fn random_labels_are_unique_and_hyphen_free() {
        let a = random_labels();
        let b = random_labels();
        assert_eq!(a.len(), 1);
        assert_ne!(a, b);

        let (key, value) = a.iter().next().unwrap();
        assert!(key.starts_with("key"));
        assert!(value.starts_with("val"));
        assert!(!key.contains('-'));
        assert_eq!(key.len(), "key".len() + 32);
    }
}
