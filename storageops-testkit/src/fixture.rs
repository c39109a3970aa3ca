//! Fixture catalogs: named disk templates per driver.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{load_file, ConfigError};

/// A named disk creation template.
///
/// The template is opaque to the suite; only the driver interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture<T> {
    /// Fixture name, unique per driver.
    pub name: String,
    /// Driver-specific template.
    pub template: T,
}

impl<T> Fixture<T> {
    /// Create a new fixture.
    pub fn new(name: impl Into<String>, template: T) -> Self {
        Self {
            name: name.into(),
            template,
        }
    }
}

/// Fixtures keyed by driver name.
///
/// On disk (TOML):
///
/// ```toml
/// [[drivers.memory]]
/// name = "small"
/// template = { size = 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureCatalog<T> {
    #[serde(default = "BTreeMap::new")]
    drivers: BTreeMap<String, Vec<Fixture<T>>>,
}

impl<T> Default for FixtureCatalog<T> {
    fn default() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }
}

impl<T> FixtureCatalog<T> {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixture for a driver.
    pub fn insert(&mut self, driver: impl Into<String>, fixture: Fixture<T>) {
        self.drivers.entry(driver.into()).or_default().push(fixture);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, driver: impl Into<String>, name: impl Into<String>, template: T) -> Self {
        self.insert(driver, Fixture::new(name, template));
        self
    }

    /// Fixtures registered for a driver, in insertion order.
    pub fn fixtures_for(&self, driver: &str) -> &[Fixture<T>] {
        self.drivers.get(driver).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drivers with at least one fixture.
    pub fn driver_names(&self) -> impl Iterator<Item = &str> {
        self.drivers
            .iter()
            .filter(|(_, f)| !f.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// Total number of fixtures.
    pub fn len(&self) -> usize {
        self.drivers.values().map(Vec::len).sum()
    }

    /// Whether the catalog has no fixtures.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check fixture names are non-empty and unique per driver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (driver, fixtures) in &self.drivers {
            let mut seen = std::collections::BTreeSet::new();
            for fixture in fixtures {
                if fixture.name.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "driver {}: fixture name must not be empty",
                        driver
                    )));
                }
                if !seen.insert(fixture.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "driver {}: duplicate fixture {}",
                        driver, fixture.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<T: DeserializeOwned> FixtureCatalog<T> {
    /// Load a catalog from a TOML or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let catalog: FixtureCatalog<T> = load_file(path)?;
        catalog.validate()?;
        log::info!(
            "Loaded {} fixture(s) for {} driver(s) from {}",
            catalog.len(),
            catalog.driver_names().count(),
            path.display()
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct SizeTemplate {
        size: u64,
    }

    #[test]
    fn fixtures_keep_insertion_order() {
        let catalog = FixtureCatalog::new()
            .with("aws", "gp2", 1)
            .with("aws", "io1", 2)
            .with("gce", "pd-standard", 3);

        let names: Vec<_> = catalog
            .fixtures_for("aws")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["gp2", "io1"]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.driver_names().collect::<Vec<_>>(), vec!["aws", "gce"]);
        assert!(catalog.fixtures_for("azure").is_empty());
    }

    #[test]
    fn load_toml_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fixtures.toml");
        fs::write(
            &path,
            r#"
[[drivers.mock]]
name = "small"
template = { size = 10 }

[[drivers.mock]]
name = "large"
template = { size = 500 }
"#,
        )
        .unwrap();

        let catalog: FixtureCatalog<SizeTemplate> = FixtureCatalog::load(&path).unwrap();
        let fixtures = catalog.fixtures_for("mock");
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].name, "small");
        assert_eq!(fixtures[0].template, SizeTemplate { size: 10 });
        assert_eq!(fixtures[1].template.size, 500);
    }

    #[test]
    fn load_yaml_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fixtures.yml");
        fs::write(
            &path,
            "drivers:\n  mock:\n    - name: small\n      template:\n        size: 10\n",
        )
        .unwrap();

        let catalog: FixtureCatalog<SizeTemplate> = FixtureCatalog::load(&path).unwrap();
        assert_eq!(catalog.fixtures_for("mock")[0].template.size, 10);
    }

    #[test]
    fn load_rejects_duplicate_fixture_names() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fixtures.toml");
        fs::write(
            &path,
            r#"
[[drivers.mock]]
name = "small"
template = { size = 10 }

[[drivers.mock]]
name = "small"
template = { size = 20 }
"#,
        )
        .unwrap();

        let err = FixtureCatalog::<SizeTemplate>::load(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate fixture small"));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fixtures.toml");
        fs::write(&path, "[[drivers.mock]]\nname = \"small\"\n").unwrap();

        let err = FixtureCatalog::<SizeTemplate>::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
        assert!(err.to_string().contains("fixtures.toml"));
    }
}
