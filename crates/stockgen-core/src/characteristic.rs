use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A categorical housing attribute with its conditioning characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub name: String,
    /// Order matches the `Dependency=` columns of the source table.
    pub dependency_names: Vec<String>,
    pub options: Vec<String>,
}

/// Ordered tuple of dependency values, one per declared dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyKey(Vec<String>);

impl DependencyKey {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Key shared by every row of a characteristic without dependencies.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the key with the dependency names it was built for.
    pub fn describe(&self, dependency_names: &[String]) -> String {
        let pairs: Vec<String> = dependency_names
            .iter()
            .zip(&self.0)
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("({})", pairs.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for DependencyKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Probability vectors of one characteristic keyed by dependency values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalDistribution {
    rows: HashMap<DependencyKey, Vec<f64>>,
}

impl ConditionalDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DependencyKey) -> Option<&[f64]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn insert(&mut self, key: DependencyKey, probabilities: Vec<f64>) {
        self.rows.insert(key, probabilities);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_pairs_names_with_values() {
        let key: DependencyKey = ["1980s", "Natural Gas"].into_iter().collect();
        let names = vec!["Vintage".to_string(), "Heating Fuel".to_string()];
        assert_eq!(
            key.describe(&names),
            "(Vintage=1980s, Heating Fuel=Natural Gas)"
        );
        assert_eq!(key.to_string(), "(1980s, Natural Gas)");
    }
}
