//! Storage Ops Test Kit - Driver conformance suite.
//!
//! This crate runs storage drivers through the full disk lifecycle and checks
//! that each one honors the [`StorageOps`](storageops_core::StorageOps)
//! contract, not just its signatures.
//!
//! # Key Types
//!
//! - [`FixtureCatalog`]: Named, driver-specific disk templates
//! - [`Suite`]: Registers drivers with their fixtures and runs every pair
//! - [`SuiteConfig`]: Settle delay and tag labels
//! - [`SuiteReport`]: Per (driver, fixture) stage outcomes and failures
//! - [`MemoryDriver`]: In-memory driver with capability toggles and faults
//!
//! # Stages
//!
//! | Stage | Required | Checks |
//! |-------|----------|--------|
//! | name | yes | driver name not empty |
//! | create / resolve id | yes | disk created, id not empty |
//! | snapshot | no | snapshot id not empty, delete succeeds |
//! | tags | no | exact round trip, removal, idempotent reapply |
//! | enumerate | no | one match for applied labels, none for random labels |
//! | inspect | no | one result per id |
//! | attach cycle | yes | path and mappings not empty, before and after detach |
//! | device path | yes | matches the last attach |
//! | teardown | yes | detach, settle, delete |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use storageops_testkit::{FixtureCatalog, MemoryDriver, MemoryTemplate, Suite, SuiteConfig};
//!
//! let driver = MemoryDriver::new("mock");
//! let catalog = FixtureCatalog::new().with("mock", "small", MemoryTemplate::new(10));
//!
//! let mut suite = Suite::new(SuiteConfig::default().with_settle_delay(Duration::ZERO));
//! suite.register(&driver, &catalog);
//! suite.run().assert_passed();
//! ```

pub mod assertions;
mod config;
mod fixture;
mod integration;
mod memory;
mod report;
mod runner;

pub use config::{default_labels, ConfigError, SuiteConfig, DEFAULT_SETTLE_DELAY_MS};
pub use fixture::{Fixture, FixtureCatalog};
pub use memory::{
    Capabilities, Fault, MemoryDisk, MemoryDriver, MemorySnapshot, MemoryTemplate,
    DEFAULT_INSTANCE_ID,
};
pub use report::{
    Failure, PairReport, Stage, StageOutcome, StageStatus, SuiteReport, SuiteSummary,
};
pub use runner::{random_labels, run_pair, run_suite, ConformanceTarget, Suite};

/// Re-export storageops_core for convenience in tests.
pub use storageops_core;
