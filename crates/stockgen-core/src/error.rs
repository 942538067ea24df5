use std::path::PathBuf;

use thiserror::Error;

/// Core error type for loading distribution tables and resolving their graph.
#[derive(Debug, Error)]
pub enum Error {
    /// The header row of a table cannot be interpreted.
    #[error("malformed header in '{characteristic}': {reason}")]
    MalformedHeader {
        characteristic: String,
        reason: String,
    },
    /// A data row carries a bad weight or the wrong number of fields.
    #[error("malformed probability row in '{characteristic}' at line {line}: {reason}")]
    MalformedProbabilityRow {
        characteristic: String,
        line: u64,
        reason: String,
    },
    /// The same dependency tuple maps to two different weight vectors.
    #[error("duplicate dependency key {key} in '{characteristic}' at line {line}")]
    DuplicateDependencyKey {
        characteristic: String,
        key: String,
        line: u64,
    },
    /// The dependency graph has at least one cycle.
    #[error("cyclic dependency between characteristics: {}", .characteristics.join(", "))]
    CyclicDependency { characteristics: Vec<String> },
    /// A characteristic depends on a characteristic without a table.
    #[error("characteristic '{characteristic}' depends on unknown characteristic '{dependency}'")]
    UnknownDependency {
        characteristic: String,
        dependency: String,
    },
    /// Two tables declare the same characteristic name.
    #[error("characteristic '{0}' is defined more than once")]
    DuplicateCharacteristic(String),
    /// No tables were found where a project should keep them.
    #[error("no distribution tables found in {}", .0.display())]
    EmptyProject(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias for results returned by stockgen crates.
pub type Result<T> = std::result::Result<T, Error>;
