use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use stockgen_core::GraphSummary;

use crate::errors::{Result, SampleError};

/// Options for the sampling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleOptions {
    /// Run identifier; a fresh UUID when unset.
    pub run_id: Option<String>,
    /// Base seed every task seed is derived from.
    pub seed: u64,
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
    /// Header of the building id column in the output.
    pub identity_column: String,
    /// Where the run report is written, on success and on failure.
    pub report_path: Option<PathBuf>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            run_id: None,
            seed: 1,
            threads: None,
            identity_column: "Building".to_string(),
            report_path: None,
        }
    }
}

impl SampleOptions {
    pub fn resolved_threads(&self) -> Result<usize> {
        match self.threads {
            Some(0) => Err(SampleError::InvalidOptions(
                "threads must be at least 1".to_string(),
            )),
            Some(threads) => Ok(threads),
            None => Ok(std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)),
        }
    }
}

/// Outcome of a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Summary of one sampled generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub index: usize,
    pub characteristics: Vec<String>,
    pub partitions: usize,
    pub duration_ms: u64,
}

/// Realized counts of one sampled characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicReport {
    pub characteristic: String,
    pub generation: usize,
    pub dependencies: Vec<String>,
    pub partitions: usize,
    pub option_counts: BTreeMap<String, u64>,
}

/// Failure details kept in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characteristic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<usize>,
}

/// Report for a sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleReport {
    pub run_id: String,
    pub status: RunStatus,
    /// RFC 3339 UTC start time.
    pub started_at: String,
    pub seed: u64,
    pub rows_requested: usize,
    pub rows_generated: usize,
    pub threads: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphSummary>,
    pub generations: Vec<GenerationReport>,
    pub characteristics: Vec<CharacteristicReport>,
    pub quota_calls: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub bytes_written: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
}

impl SampleReport {
    pub fn new(run_id: String, seed: u64, rows_requested: usize, threads: usize) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            started_at: Utc::now().to_rfc3339(),
            seed,
            rows_requested,
            rows_generated: 0,
            threads,
            graph: None,
            generations: Vec::new(),
            characteristics: Vec::new(),
            quota_calls: 0,
            output: None,
            bytes_written: 0,
            output_sha256: None,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn record_failure(&mut self, err: &SampleError) {
        self.status = RunStatus::Failed;
        self.error = Some(ReportedError {
            message: err.to_string(),
            characteristic: err.characteristic().map(str::to_string),
            generation: err.generation(),
        });
    }
}
