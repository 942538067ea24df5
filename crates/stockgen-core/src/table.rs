use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::characteristic::{Characteristic, ConditionalDistribution, DependencyKey};
use crate::error::{Error, Result};

/// Header prefix for columns that condition the distribution.
pub const DEPENDENCY_PREFIX: &str = "Dependency=";
/// Header prefix for columns holding option weights.
pub const OPTION_PREFIX: &str = "Option=";

const DUPLICATE_TOLERANCE: f64 = 1e-12;

/// One characteristic's conditional-probability table.
#[derive(Debug, Clone)]
pub struct DistributionTable {
    pub characteristic: Characteristic,
    pub distribution: ConditionalDistribution,
}

impl DistributionTable {
    /// Load a tab-separated table; the characteristic is named after the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let file = File::open(path)?;
        Self::from_reader(&name, BufReader::new(file))
    }

    /// Parse a tab-separated table for the characteristic `name`.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .quoting(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let layout = HeaderLayout::parse(name, &headers)?;

        let mut distribution = ConditionalDistribution::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            let malformed = |reason: String| Error::MalformedProbabilityRow {
                characteristic: name.to_string(),
                line,
                reason,
            };

            if record.len() != headers.len() {
                return Err(malformed(format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    record.len()
                )));
            }

            let mut values = Vec::with_capacity(layout.dependencies.len());
            for (column, dependency) in &layout.dependencies {
                let value = record.get(*column).unwrap_or_default();
                if value.is_empty() {
                    return Err(malformed(format!("empty value for dependency '{dependency}'")));
                }
                values.push(value.to_string());
            }
            let key = DependencyKey::new(values);

            let mut weights = Vec::with_capacity(layout.options.len());
            for (column, option) in &layout.options {
                let raw = record.get(*column).unwrap_or_default();
                let weight: f64 = raw.parse().map_err(|_| {
                    malformed(format!("weight '{raw}' for option '{option}' is not a number"))
                })?;
                if !weight.is_finite() {
                    return Err(malformed(format!(
                        "weight '{raw}' for option '{option}' is not finite"
                    )));
                }
                if weight < 0.0 {
                    return Err(malformed(format!(
                        "negative weight {weight} for option '{option}'"
                    )));
                }
                weights.push(weight);
            }
            let probabilities = normalize(weights);

            if let Some(existing) = distribution.get(&key) {
                if same_vector(existing, &probabilities) {
                    continue;
                }
                return Err(Error::DuplicateDependencyKey {
                    characteristic: name.to_string(),
                    key: key.describe(&layout.dependency_names()),
                    line,
                });
            }
            distribution.insert(key, probabilities);
        }

        debug!(
            characteristic = %name,
            dependencies = layout.dependencies.len(),
            options = layout.options.len(),
            rows = distribution.len(),
            "distribution table loaded"
        );

        Ok(Self {
            characteristic: Characteristic {
                name: name.to_string(),
                dependency_names: layout.dependency_names(),
                options: layout.options.into_iter().map(|(_, label)| label).collect(),
            },
            distribution,
        })
    }
}

/// Column positions of the interpreted header fields.
struct HeaderLayout {
    dependencies: Vec<(usize, String)>,
    options: Vec<(usize, String)>,
}

impl HeaderLayout {
    fn parse(name: &str, headers: &csv::StringRecord) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedHeader {
            characteristic: name.to_string(),
            reason,
        };

        let mut dependencies: Vec<(usize, String)> = Vec::new();
        let mut options: Vec<(usize, String)> = Vec::new();

        for (column, field) in headers.iter().enumerate() {
            if let Some(dependency) = field.strip_prefix(DEPENDENCY_PREFIX) {
                let dependency = dependency.trim();
                if !options.is_empty() {
                    return Err(malformed(format!(
                        "dependency column '{dependency}' follows an option column"
                    )));
                }
                if dependency.is_empty() {
                    return Err(malformed("empty dependency name".to_string()));
                }
                if dependencies.iter().any(|(_, existing)| existing == dependency) {
                    return Err(malformed(format!("duplicate dependency '{dependency}'")));
                }
                dependencies.push((column, dependency.to_string()));
            } else if let Some(option) = field.strip_prefix(OPTION_PREFIX) {
                let option = option.trim();
                if option.is_empty() {
                    return Err(malformed("empty option label".to_string()));
                }
                if options.iter().any(|(_, existing)| existing == option) {
                    return Err(malformed(format!("duplicate option '{option}'")));
                }
                options.push((column, option.to_string()));
            }
        }

        if options.is_empty() {
            return Err(malformed(format!("no '{OPTION_PREFIX}' columns")));
        }

        Ok(Self {
            dependencies,
            options,
        })
    }

    fn dependency_names(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }
}

/// Scale weights to sum to 1. All-zero rows are left untouched.
fn normalize(mut weights: Vec<f64>) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for weight in &mut weights {
            *weight /= total;
        }
    }
    weights
}

fn same_vector(left: &[f64], right: &[f64]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(a, b)| (a - b).abs() <= DUPLICATE_TOLERANCE)
}
