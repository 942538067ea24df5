//! Core contracts for stockgen.
//!
//! This crate parses conditional-probability tables of housing
//! characteristics and resolves their dependency graph into generations.

pub mod characteristic;
pub mod error;
pub mod graph;
pub mod registry;
pub mod table;

pub use characteristic::{Characteristic, ConditionalDistribution, DependencyKey};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, Generation, GraphSummary};
pub use registry::{CharacteristicRegistry, tables_dir};
pub use table::DistributionTable;
