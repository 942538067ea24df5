//! Stratified sampling engine for stockgen.
//!
//! This crate consumes a project's distribution tables and produces a
//! deterministic synthetic housing stock (CSV), one generation of
//! characteristics at a time.

pub mod engine;
pub mod errors;
pub mod executor;
pub mod model;
pub mod output;
pub mod quota;
pub mod sample_table;
pub mod seed;

pub use engine::{SampleResult, SamplingEngine};
pub use errors::SampleError;
pub use executor::{Execution, ExecutorState, GenerationExecutor};
pub use model::{
    CharacteristicReport, GenerationReport, ReportedError, RunStatus, SampleOptions, SampleReport,
};
pub use quota::{LargestRemainder, QuotaAllocator, QuotaError, allocate, allocate_counts};
pub use sample_table::{Partition, SampleColumn, SampleRow, SampleTable};
