//! Run command.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Serialize;
use storageops_testkit::{
    Capabilities, Fault, FixtureCatalog, MemoryDriver, MemoryTemplate, PairReport, Suite,
    SuiteConfig, SuiteReport, SuiteSummary,
};
use tabled::Tabled;

use super::{CliError, Result};
use crate::output::Output;

/// Optional capabilities of the in-memory driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Capability {
    Snapshots,
    Tags,
    Enumerate,
    Inspect,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Fixture catalog (TOML or YAML)
    #[clap(long)]
    pub fixtures: PathBuf,

    /// Suite configuration (TOML or YAML)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Name the driver reports; selects its fixtures from the catalog
    #[clap(long, default_value = "memory")]
    pub driver_name: String,

    /// Disable an optional capability (repeatable)
    #[clap(long = "disable", value_enum)]
    pub disabled: Vec<Capability>,

    /// Inject a driver fault, e.g. `lowercase-tags` (repeatable)
    #[clap(long = "fault", value_parser = parse_fault)]
    pub faults: Vec<Fault>,

    /// Override the wait between detach and delete
    #[clap(long)]
    pub settle_delay_ms: Option<u64>,
}

fn parse_fault(s: &str) -> std::result::Result<Fault, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown fault {:?}", s))
}

/// Capabilities left after disabling the given ones.
pub fn capabilities(disabled: &[Capability]) -> Capabilities {
    let mut caps = Capabilities::all();
    for capability in disabled {
        match capability {
            Capability::Snapshots => caps.snapshots = false,
            Capability::Tags => caps.tags = false,
            Capability::Enumerate => caps.enumerate = false,
            Capability::Inspect => caps.inspect = false,
        }
    }
    caps
}

/// JSON output for the run command.
#[derive(Serialize)]
struct RunOutput<'a> {
    summary: SuiteSummary,
    pairs: &'a [PairReport],
}

/// Table row for run output.
#[derive(Tabled)]
struct PairTableRow {
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Fixture")]
    fixture: String,
    #[tabled(rename = "Disk")]
    device_id: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Skipped")]
    skipped: String,
    #[tabled(rename = "Failure")]
    failure: String,
}

impl From<&PairReport> for PairTableRow {
    fn from(pair: &PairReport) -> Self {
        Self {
            driver: pair.driver.clone(),
            fixture: pair.fixture.clone(),
            device_id: pair.device_id.clone().unwrap_or_default(),
            result: if pair.passed() { "pass" } else { "FAIL" }.to_string(),
            skipped: pair
                .skipped()
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(","),
            failure: pair
                .first_failure()
                .map(|f| f.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Load inputs and run the suite, without printing anything.
pub fn execute(args: &RunArgs) -> Result<SuiteReport> {
    if args.driver_name.is_empty() {
        return Err(CliError::InvalidArg("driver name must not be empty".to_string()));
    }

    let mut config = SuiteConfig::load_or_default(args.config.as_deref())?;
    if let Some(ms) = args.settle_delay_ms {
        config = config.with_settle_delay(Duration::from_millis(ms));
    }

    let catalog = FixtureCatalog::<MemoryTemplate>::load(&args.fixtures)?;
    if catalog.fixtures_for(&args.driver_name).is_empty() {
        return Err(CliError::InvalidArg(format!(
            "no fixtures for driver {} in {}",
            args.driver_name,
            args.fixtures.display()
        )));
    }

    let mut driver = MemoryDriver::new(&args.driver_name).with_capabilities(capabilities(&args.disabled));
    for fault in &args.faults {
        log::debug!("Injecting fault {:?}", fault);
        driver = driver.with_fault(*fault);
    }

    let mut suite = Suite::new(config);
    suite.register(&driver, &catalog);
    Ok(suite.run())
}

/// Run the run command.
pub fn run(output: &Output, args: &RunArgs) -> Result<()> {
    let report = execute(args)?;
    let summary = report.summary();

    if output.is_json() {
        output.json(&RunOutput {
            summary,
            pairs: &report.pairs,
        });
    } else if output.is_table() {
        let rows: Vec<PairTableRow> = report.pairs.iter().map(PairTableRow::from).collect();
        output.table(&rows);
        output.info(&format!("\nSummary: {}", summary));
    } else {
        for pair in &report.pairs {
            let disk = pair.device_id.as_deref().unwrap_or("-");
            if pair.passed() {
                output.success(&format!("PASS {}/{} ({})", pair.driver, pair.fixture, disk));
                for stage in pair.skipped() {
                    output.println(&format!("  skipped: {}", stage));
                }
            } else {
                output.error(&format!("FAIL {}/{} ({})", pair.driver, pair.fixture, disk));
                for failure in &pair.failures {
                    output.error(&format!("  {}", failure));
                }
            }
        }
        output.info(&format!("Summary: {}", summary));
    }

    if report.passed() {
        Ok(())
    } else {
        Err(CliError::SuiteFailed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use storageops_testkit::Stage;

    fn args(fixtures: PathBuf) -> RunArgs {
        RunArgs {
            fixtures,
            config: None,
            driver_name: "memory".to_string(),
            disabled: Vec::new(),
            faults: Vec::new(),
            settle_delay_ms: Some(0),
        }
    }

    fn write_catalog(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("fixtures.toml");
        fs::write(
            &path,
            r#"
[[drivers.memory]]
name = "small"
template = { size = 10 }

[[drivers.memory]]
name = "typed"
template = { size = 20, volume_type = "gp2" }
"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_parse_fault_accepts_kebab_case() {
        assert_eq!(parse_fault("lowercase-tags").unwrap(), Fault::LowercaseTags);
        assert!(parse_fault("LowercaseTags").is_err());
        assert!(parse_fault("bogus").unwrap_err().contains("bogus"));
    }

    #[test]
    fn test_capabilities_disables_listed() {
        let caps = capabilities(&[Capability::Snapshots, Capability::Inspect]);
        assert!(!caps.snapshots);
        assert!(caps.tags);
        assert!(caps.enumerate);
        assert!(!caps.inspect);
    }

    #[test]
    fn test_execute_conforming_driver() {
        let dir = tempfile::tempdir().unwrap();
        let report = execute(&args(write_catalog(&dir))).unwrap();
        assert!(report.passed());
        assert_eq!(report.pairs.len(), 2);
        assert_eq!(report.pairs[1].device_id.as_deref(), Some("vol-0002"));
    }

    #[test]
    fn test_execute_reports_injected_fault() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(write_catalog(&dir));
        args.faults = vec![Fault::DevicePathMismatch];
        args.disabled = vec![Capability::Tags];

        let report = execute(&args).unwrap();
        assert_eq!(report.summary().failed, 2);
        let pair = report.pair("memory", "small").unwrap();
        assert_eq!(pair.first_failure().unwrap().stage, Stage::DevicePath);
        assert_eq!(pair.skipped(), vec![Stage::Tags]);

        let row = PairTableRow::from(pair);
        assert_eq!(row.result, "FAIL");
        assert_eq!(row.skipped, "tags");
        assert!(row.failure.starts_with("[device_path]"));
    }

    #[test]
    fn test_execute_rejects_unknown_driver() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(write_catalog(&dir));
        args.driver_name = "ebs".to_string();
        assert!(matches!(execute(&args), Err(CliError::InvalidArg(_))));
    }

    #[test]
    fn test_execute_applies_config_labels() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("suite.yaml");
        fs::write(&config, "settle_delay_ms: 5000\nlabels:\n  team: storage\n").unwrap();

        let mut args = args(write_catalog(&dir));
        args.config = Some(config);
        let report = execute(&args).unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_run_returns_suite_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(write_catalog(&dir));
        args.faults = vec![Fault::RemoveTagsNoop];

        let output = Output::new(crate::OutputFormat::Json, true);
        match run(&output, &args) {
            Err(CliError::SuiteFailed(summary)) => assert_eq!(summary.failed, 2),
            other => panic!("expected suite failure, got {:?}", other),
        }
    }
}
