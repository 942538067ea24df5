use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use stockgen_core::{CharacteristicRegistry, DependencyGraph};

use crate::errors::{Result, SampleError};
use crate::executor::{Execution, GenerationExecutor};
use crate::model::{RunStatus, SampleOptions, SampleReport};
use crate::output::csv::write_sample_csv;
use crate::quota::{LargestRemainder, QuotaAllocator};
use crate::sample_table::SampleTable;

/// Result of a sampling run.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub output: PathBuf,
    pub table: SampleTable,
    pub report: SampleReport,
}

/// Entry point for sampling a project's distribution tables.
#[derive(Debug, Clone)]
pub struct SamplingEngine<A = LargestRemainder> {
    options: SampleOptions,
    allocator: A,
}

impl SamplingEngine<LargestRemainder> {
    pub fn new(options: SampleOptions) -> Self {
        Self::with_allocator(options, LargestRemainder)
    }
}

impl<A: QuotaAllocator> SamplingEngine<A> {
    pub fn with_allocator(options: SampleOptions, allocator: A) -> Self {
        Self { options, allocator }
    }

    pub fn options(&self) -> &SampleOptions {
        &self.options
    }

    /// Load `project`, sample `rows` dwellings and write them to `output`.
    ///
    /// The output file only appears when every generation succeeded.
    pub fn run(&self, project: &Path, rows: usize, output: &Path) -> Result<SampleResult> {
        let start = Instant::now();
        let run_id = self
            .options
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let threads = self.options.resolved_threads()?;
        let mut report = SampleReport::new(run_id.clone(), self.options.seed, rows, threads);

        info!(
            run_id = %run_id,
            project = %project.display(),
            rows,
            seed = self.options.seed,
            threads,
            "sampling started"
        );

        let outcome = self.sample_project(project, rows, output, threads, &mut report);
        report.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(table) => {
                report.status = RunStatus::Completed;
                self.persist_report(&report);
                info!(
                    run_id = %run_id,
                    rows = report.rows_generated,
                    characteristics = report.characteristics.len(),
                    bytes_written = report.bytes_written,
                    sha256 = report.output_sha256.as_deref().unwrap_or(""),
                    duration_ms = report.duration_ms,
                    "sampling completed"
                );
                Ok(SampleResult {
                    output: output.to_path_buf(),
                    table,
                    report,
                })
            }
            Err(err) => {
                report.record_failure(&err);
                self.persist_report(&report);
                warn!(run_id = %run_id, error = %err, "sampling failed");
                Err(err)
            }
        }
    }

    /// Sample `rows` dwellings from an already loaded registry.
    pub fn sample(&self, registry: &CharacteristicRegistry, rows: usize) -> Result<Execution> {
        let threads = self.options.resolved_threads()?;
        let graph = DependencyGraph::from_registry(registry)?;
        self.execute(&graph, registry, rows, threads)
    }

    fn sample_project(
        &self,
        project: &Path,
        rows: usize,
        output: &Path,
        threads: usize,
        report: &mut SampleReport,
    ) -> Result<SampleTable> {
        let registry = CharacteristicRegistry::load_project(project)?;
        let graph = DependencyGraph::from_registry(&registry)?;
        report.graph = Some(graph.summary().clone());

        let execution = self.execute(&graph, &registry, rows, threads)?;
        report.generations = execution.generations;
        report.characteristics = execution.characteristics;
        report.quota_calls = execution.quota_calls;
        report.rows_generated = execution.table.len();

        let written = write_sample_csv(output, &execution.table, &self.options.identity_column)?;
        report.output = Some(output.to_path_buf());
        report.bytes_written = written.bytes;
        report.output_sha256 = Some(written.sha256);

        info!(
            path = %output.display(),
            bytes = written.bytes,
            "sample written"
        );

        Ok(execution.table)
    }

    fn execute(
        &self,
        graph: &DependencyGraph,
        registry: &CharacteristicRegistry,
        rows: usize,
        threads: usize,
    ) -> Result<Execution> {
        let mut executor = GenerationExecutor::with_allocator(threads, &self.allocator)?;
        executor.run(graph, registry, SampleTable::new(rows), self.options.seed)
    }

    /// A report that cannot be written never replaces the run's own outcome.
    fn persist_report(&self, report: &SampleReport) {
        if let Err(err) = self.write_report(report) {
            warn!(
                run_id = %report.run_id,
                path = ?self.options.report_path,
                error = %err,
                "failed to write sample report"
            );
        }
    }

    fn write_report(&self, report: &SampleReport) -> Result<()> {
        if let Some(path) = &self.options.report_path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, serde_json::to_vec_pretty(report)?)
                .map_err(SampleError::from)?;
        }
        Ok(())
    }
}
