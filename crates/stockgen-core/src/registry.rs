use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::characteristic::{Characteristic, ConditionalDistribution};
use crate::error::{Error, Result};
use crate::table::DistributionTable;

/// Subdirectory of a project that holds the distribution tables.
pub const CHARACTERISTICS_DIR: &str = "housing_characteristics";
/// File extension of distribution tables.
pub const TABLE_EXTENSION: &str = "tsv";

/// Read-only set of distribution tables keyed by characteristic name.
#[derive(Debug, Clone, Default)]
pub struct CharacteristicRegistry {
    tables: BTreeMap<String, DistributionTable>,
}

impl CharacteristicRegistry {
    pub fn from_tables(tables: impl IntoIterator<Item = DistributionTable>) -> Result<Self> {
        let mut registry = Self::default();
        for table in tables {
            let name = table.characteristic.name.clone();
            if registry.tables.insert(name.clone(), table).is_some() {
                return Err(Error::DuplicateCharacteristic(name));
            }
        }
        Ok(registry)
    }

    /// Load every `*.tsv` table of a project directory.
    pub fn load_project(project: &Path) -> Result<Self> {
        let dir = tables_dir(project);
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(TABLE_EXTENSION))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::EmptyProject(dir));
        }

        let tables = paths
            .iter()
            .map(|path| DistributionTable::load(path))
            .collect::<Result<Vec<_>>>()?;
        let registry = Self::from_tables(tables)?;

        info!(
            dir = %dir.display(),
            characteristics = registry.len(),
            "distribution tables loaded"
        );

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&DistributionTable> {
        self.tables.get(name)
    }

    pub fn characteristic(&self, name: &str) -> Option<&Characteristic> {
        self.tables.get(name).map(|table| &table.characteristic)
    }

    pub fn distribution(&self, name: &str) -> Option<&ConditionalDistribution> {
        self.tables.get(name).map(|table| &table.distribution)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Characteristic names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Declared dependency lists, the input of the dependency graph.
    pub fn dependency_map(&self) -> BTreeMap<String, Vec<String>> {
        self.tables
            .iter()
            .map(|(name, table)| (name.clone(), table.characteristic.dependency_names.clone()))
            .collect()
    }
}

/// Resolve where a project keeps its tables.
pub fn tables_dir(project: &Path) -> PathBuf {
    let nested = project.join(CHARACTERISTICS_DIR);
    if nested.is_dir() {
        nested
    } else {
        project.to_path_buf()
    }
}
