//! Fixtures command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use storageops_testkit::{FixtureCatalog, MemoryTemplate};
use tabled::Tabled;

use super::{CliError, Result};
use crate::output::Output;

#[derive(Debug, Args)]
pub struct FixturesArgs {
    /// Fixture catalog (TOML or YAML)
    #[clap(long)]
    pub fixtures: PathBuf,

    /// Only list fixtures for this driver
    #[clap(long)]
    pub driver_name: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct FixtureEntry {
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Fixture")]
    name: String,
    #[tabled(rename = "Size")]
    size: u64,
    #[tabled(rename = "Type")]
    volume_type: String,
}

fn entries(catalog: &FixtureCatalog<MemoryTemplate>, driver: Option<&str>) -> Vec<FixtureEntry> {
    catalog
        .driver_names()
        .filter(|name| driver.map_or(true, |d| d == *name))
        .flat_map(|name| {
            catalog.fixtures_for(name).iter().map(move |fixture| FixtureEntry {
                driver: name.to_string(),
                name: fixture.name.clone(),
                size: fixture.template.size,
                volume_type: fixture.template.volume_type.clone().unwrap_or_default(),
            })
        })
        .collect()
}

/// Run the fixtures command.
pub fn run(output: &Output, args: &FixturesArgs) -> Result<()> {
    let catalog = FixtureCatalog::<MemoryTemplate>::load(&args.fixtures)?;
    let entries = entries(&catalog, args.driver_name.as_deref());
    if entries.is_empty() {
        if let Some(driver) = &args.driver_name {
            return Err(CliError::InvalidArg(format!("no fixtures for driver {}", driver)));
        }
    }

    if output.is_json() {
        output.json(&entries);
    } else if output.is_table() {
        output.table(&entries);
    } else if entries.is_empty() {
        output.info("No fixtures");
    } else {
        for entry in &entries {
            output.println(&format!("{}/{}: size {}", entry.driver, entry.name, entry.size));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FixtureCatalog<MemoryTemplate> {
        FixtureCatalog::new()
            .with("ebs", "gp2", MemoryTemplate {
                size: 10,
                volume_type: Some("gp2".to_string()),
            })
            .with("memory", "small", MemoryTemplate::new(1))
            .with("memory", "large", MemoryTemplate::new(100))
    }

    #[test]
    fn test_entries_keep_catalog_order() {
        let all = entries(&catalog(), None);
        let names: Vec<_> = all.iter().map(|e| format!("{}/{}", e.driver, e.name)).collect();
        assert_eq!(names, vec!["ebs/gp2", "memory/small", "memory/large"]);
        assert_eq!(all[0].volume_type, "gp2");
    }

    #[test]
    fn test_entries_filter_by_driver() {
        let memory = entries(&catalog(), Some("memory"));
        assert_eq!(memory.len(), 2);
        assert!(entries(&catalog(), Some("gce")).is_empty());
    }
}
