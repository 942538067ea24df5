use std::collections::BTreeMap;

use stockgen_core::DependencyKey;

use crate::errors::{Result, SampleError};

/// One sampled characteristic: an option index per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleColumn {
    name: String,
    options: Vec<String>,
    values: Vec<usize>,
}

impl SampleColumn {
    pub fn new(name: impl Into<String>, options: Vec<String>, values: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            options,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn values(&self) -> &[usize] {
        &self.values
    }

    pub fn label(&self, row: usize) -> Option<&str> {
        self.values
            .get(row)
            .and_then(|option| self.options.get(*option))
            .map(String::as_str)
    }

    /// Number of rows assigned to each option, in option order.
    pub fn option_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.options.len()];
        for option in &self.values {
            if let Some(count) = counts.get_mut(*option) {
                *count += 1;
            }
        }
        counts
    }
}

/// Rows sharing one tuple of dependency values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub key: DependencyKey,
    /// Ascending row indices.
    pub rows: Vec<usize>,
}

/// Borrowed view of a single synthetic dwelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow<'a> {
    pub index: usize,
    pub values: Vec<(&'a str, &'a str)>,
}

/// Synthetic rows with a fixed identity and a growing set of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleTable {
    rows: usize,
    columns: BTreeMap<String, SampleColumn>,
}

impl SampleTable {
    /// A table of `rows` dwellings with no characteristic assigned yet.
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&SampleColumn> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &SampleColumn> {
        self.columns.values()
    }

    pub fn label(&self, row: usize, name: &str) -> Option<&str> {
        self.columns.get(name).and_then(|column| column.label(row))
    }

    pub fn row(&self, index: usize) -> Option<SampleRow<'_>> {
        if index >= self.rows {
            return None;
        }
        let values = self
            .columns
            .values()
            .filter_map(|column| column.label(index).map(|label| (column.name(), label)))
            .collect();
        Some(SampleRow { index, values })
    }

    /// Group rows by the values already assigned to `dependencies`.
    ///
    /// Without dependencies the whole table is a single partition.
    pub fn partition_by(&self, dependencies: &[String]) -> Result<Vec<Partition>> {
        if dependencies.is_empty() {
            return Ok(vec![Partition {
                key: DependencyKey::empty(),
                rows: (0..self.rows).collect(),
            }]);
        }

        let columns = dependencies
            .iter()
            .map(|name| {
                self.columns
                    .get(name)
                    .ok_or_else(|| SampleError::UnsampledColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut groups: BTreeMap<Vec<usize>, Vec<usize>> = BTreeMap::new();
        for row in 0..self.rows {
            let tuple: Vec<usize> = columns.iter().map(|column| column.values[row]).collect();
            groups.entry(tuple).or_default().push(row);
        }

        Ok(groups
            .into_iter()
            .map(|(tuple, rows)| Partition {
                key: tuple
                    .iter()
                    .zip(&columns)
                    .map(|(option, column)| column.options[*option].clone())
                    .collect(),
                rows,
            })
            .collect())
    }

    /// Add a fully populated column. Each column is written once.
    pub fn insert_column(&mut self, column: SampleColumn) -> Result<()> {
        if column.values.len() != self.rows {
            return Err(SampleError::InvalidOptions(format!(
                "column '{}' has {} values for {} rows",
                column.name,
                column.values.len(),
                self.rows
            )));
        }
        if column
            .values
            .iter()
            .any(|option| *option >= column.options.len())
        {
            return Err(SampleError::InvalidOptions(format!(
                "column '{}' references an unknown option",
                column.name
            )));
        }
        if self.columns.contains_key(&column.name) {
            return Err(SampleError::InvalidOptions(format!(
                "column '{}' is already sampled",
                column.name
            )));
        }
        self.columns.insert(column.name.clone(), column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn table() -> SampleTable {
        let mut table = SampleTable::new(5);
        table
            .insert_column(SampleColumn::new(
                "Vintage",
                labels(&["Old", "New"]),
                vec![0, 1, 1, 0, 1],
            ))
            .expect("insert vintage");
        table
            .insert_column(SampleColumn::new(
                "Location",
                labels(&["North", "South"]),
                vec![0, 0, 1, 0, 0],
            ))
            .expect("insert location");
        table
    }

    #[test]
    fn partitions_by_dependency_tuple() {
        let table = table();
        let partitions = table
            .partition_by(&labels(&["Vintage", "Location"]))
            .expect("partition");

        assert_eq!(
            partitions,
            vec![
                Partition {
                    key: ["Old", "North"].into_iter().collect(),
                    rows: vec![0, 3],
                },
                Partition {
                    key: ["New", "North"].into_iter().collect(),
                    rows: vec![1, 4],
                },
                Partition {
                    key: ["New", "South"].into_iter().collect(),
                    rows: vec![2],
                },
            ]
        );
    }

    #[test]
    fn no_dependencies_yield_single_partition() {
        let partitions = table().partition_by(&[]).expect("partition");
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].rows, vec![0, 1, 2, 3, 4]);
        assert!(partitions[0].key.is_empty());
    }

    #[test]
    fn partition_on_missing_column_fails() {
        let err = table().partition_by(&labels(&["Heating Fuel"])).unwrap_err();
        assert!(matches!(err, SampleError::UnsampledColumn(name) if name == "Heating Fuel"));
    }

    #[test]
    fn rejects_second_write_and_wrong_length() {
        let mut table = table();
        let err = table
            .insert_column(SampleColumn::new("Vintage", labels(&["Old"]), vec![0; 5]))
            .unwrap_err();
        assert!(matches!(err, SampleError::InvalidOptions(_)));

        let err = table
            .insert_column(SampleColumn::new("Stories", labels(&["1"]), vec![0; 4]))
            .unwrap_err();
        assert!(matches!(err, SampleError::InvalidOptions(_)));
    }

    #[test]
    fn row_view_lists_labels_by_column_name() {
        let table = table();
        let row = table.row(2).expect("row exists");
        assert_eq!(row.values, vec![("Location", "South"), ("Vintage", "New")]);
        assert!(table.row(5).is_none());
        assert_eq!(table.column("Vintage").map(SampleColumn::option_counts), Some(vec![2, 3]));
    }
}
