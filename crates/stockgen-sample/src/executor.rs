use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stockgen_core::{
    Characteristic, CharacteristicRegistry, DependencyGraph, DependencyKey, Generation,
};

use crate::errors::{Result, SampleError};
use crate::model::{CharacteristicReport, GenerationReport};
use crate::quota::{LargestRemainder, QuotaAllocator, QuotaError};
use crate::sample_table::{SampleColumn, SampleTable};
use crate::seed::task_seed;

/// Lifecycle of a [`GenerationExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutorState {
    NotStarted,
    Running {
        generation: usize,
    },
    Completed,
    /// Terminal; no further generation is attempted.
    Failed {
        generation: usize,
        characteristic: Option<String>,
        error: String,
    },
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running { generation } => write!(f, "running(generation {generation})"),
            Self::Completed => write!(f, "completed"),
            Self::Failed { generation, .. } => write!(f, "failed(generation {generation})"),
        }
    }
}

/// Populated table plus per-generation bookkeeping.
#[derive(Debug, Clone)]
pub struct Execution {
    pub table: SampleTable,
    pub generations: Vec<GenerationReport>,
    pub characteristics: Vec<CharacteristicReport>,
    pub quota_calls: u64,
}

/// Samples generation after generation on a bounded worker pool.
pub struct GenerationExecutor<A = LargestRemainder> {
    pool: rayon::ThreadPool,
    allocator: A,
    state: ExecutorState,
    quota_calls: AtomicU64,
}

impl GenerationExecutor<LargestRemainder> {
    pub fn new(threads: usize) -> Result<Self> {
        Self::with_allocator(threads, LargestRemainder)
    }
}

impl<A: QuotaAllocator> GenerationExecutor<A> {
    pub fn with_allocator(threads: usize, allocator: A) -> Result<Self> {
        if threads == 0 {
            return Err(SampleError::InvalidOptions(
                "thread count must be at least 1".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("stockgen-worker-{index}"))
            .build()
            .map_err(|err| SampleError::ThreadPool(err.to_string()))?;

        Ok(Self {
            pool,
            allocator,
            state: ExecutorState::NotStarted,
            quota_calls: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Sample every generation of `graph` into `table`.
    pub fn run(
        &mut self,
        graph: &DependencyGraph,
        registry: &CharacteristicRegistry,
        mut table: SampleTable,
        seed: u64,
    ) -> Result<Execution> {
        if self.state != ExecutorState::NotStarted {
            return Err(SampleError::ExecutorState(self.state.to_string()));
        }

        let mut generations = Vec::with_capacity(graph.generations().len());
        let mut characteristics = Vec::new();

        for generation in graph.generations() {
            self.state = ExecutorState::Running {
                generation: generation.index,
            };
            let start = Instant::now();

            let outcome = self
                .sample_generation(generation, registry, &table, seed)
                .and_then(|sampled| {
                    let mut reports = Vec::with_capacity(sampled.len());
                    for (column, report) in sampled {
                        table.insert_column(column)?;
                        reports.push(report);
                    }
                    Ok(reports)
                });

            let reports = match outcome {
                Ok(reports) => reports,
                Err(err) => {
                    warn!(
                        generation = generation.index,
                        characteristic = err.characteristic().unwrap_or(""),
                        error = %err,
                        "generation failed"
                    );
                    self.state = ExecutorState::Failed {
                        generation: generation.index,
                        characteristic: err.characteristic().map(str::to_string),
                        error: err.to_string(),
                    };
                    return Err(err);
                }
            };

            let partitions: usize = reports.iter().map(|report| report.partitions).sum();
            let duration_ms = start.elapsed().as_millis() as u64;
            info!(
                generation = generation.index,
                characteristics = reports.len(),
                partitions,
                duration_ms,
                "generation sampled"
            );

            generations.push(GenerationReport {
                index: generation.index,
                characteristics: generation.characteristics.clone(),
                partitions,
                duration_ms,
            });
            characteristics.extend(reports);
        }

        self.state = ExecutorState::Completed;

        Ok(Execution {
            table,
            generations,
            characteristics,
            quota_calls: self.quota_calls.load(Ordering::Relaxed),
        })
    }

    /// Compute every column of one generation without touching the table.
    fn sample_generation(
        &self,
        generation: &Generation,
        registry: &CharacteristicRegistry,
        table: &SampleTable,
        seed: u64,
    ) -> Result<Vec<(SampleColumn, CharacteristicReport)>> {
        self.pool.install(|| -> Result<Vec<_>> {
            let plans = generation
                .characteristics
                .par_iter()
                .map(|name| plan_characteristic(name, generation.index, registry, table, seed))
                .collect::<Result<Vec<_>>>()?;

            let tasks: Vec<&QuotaTask<'_>> = plans.iter().flat_map(|plan| &plan.tasks).collect();
            let assignments = tasks
                .par_iter()
                .map(|task| self.run_task(task, generation.index))
                .collect::<Result<Vec<_>>>()?;

            let mut offset = 0;
            let mut sampled = Vec::with_capacity(plans.len());
            for plan in &plans {
                let count = plan.tasks.len();
                let slice = &assignments[offset..offset + count];
                offset += count;
                sampled.push(merge_characteristic(plan, slice, table.len(), generation.index)?);
            }
            Ok(sampled)
        })
    }

    fn run_task(&self, task: &QuotaTask<'_>, generation: usize) -> Result<Vec<usize>> {
        self.quota_calls.fetch_add(1, Ordering::Relaxed);
        let group_size = task.rows.len();

        let labels = self
            .allocator
            .allocate(task.probabilities, group_size, task.seed)
            .map_err(|err| {
                let characteristic = task.characteristic.name.clone();
                let key = task
                    .key
                    .describe(&task.characteristic.dependency_names);
                match err {
                    QuotaError::InvalidDistribution(reason) => SampleError::InvalidDistribution {
                        characteristic,
                        generation,
                        key,
                        reason,
                    },
                    QuotaError::QuotaOverflow(reason) => SampleError::QuotaOverflow {
                        characteristic,
                        generation,
                        key,
                        reason,
                    },
                }
            })?;

        if labels.len() != group_size {
            return Err(SampleError::QuotaOverflow {
                characteristic: task.characteristic.name.clone(),
                generation,
                key: task.key.describe(&task.characteristic.dependency_names),
                reason: format!("{} labels for a group of {group_size}", labels.len()),
            });
        }

        Ok(labels)
    }
}

/// One quota computation: a partition and the distribution it samples from.
struct QuotaTask<'a> {
    characteristic: &'a Characteristic,
    key: DependencyKey,
    probabilities: &'a [f64],
    rows: Vec<usize>,
    seed: u64,
}

struct CharacteristicPlan<'a> {
    characteristic: &'a Characteristic,
    tasks: Vec<QuotaTask<'a>>,
}

fn plan_characteristic<'a>(
    name: &str,
    generation: usize,
    registry: &'a CharacteristicRegistry,
    table: &SampleTable,
    seed: u64,
) -> Result<CharacteristicPlan<'a>> {
    let source = registry
        .get(name)
        .ok_or_else(|| SampleError::UnknownCharacteristic(name.to_string()))?;
    let characteristic = &source.characteristic;

    let partitions = table.partition_by(&characteristic.dependency_names)?;
    let mut tasks = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let probabilities = source.distribution.get(&partition.key).ok_or_else(|| {
            SampleError::MissingDependencyValue {
                characteristic: name.to_string(),
                generation,
                key: partition.key.describe(&characteristic.dependency_names),
            }
        })?;
        let seed = task_seed(seed, name, &partition.key, generation, partition.rows.len());
        tasks.push(QuotaTask {
            characteristic,
            key: partition.key,
            probabilities,
            rows: partition.rows,
            seed,
        });
    }

    debug!(
        characteristic = %name,
        generation,
        partitions = tasks.len(),
        "characteristic planned"
    );

    Ok(CharacteristicPlan {
        characteristic,
        tasks,
    })
}

/// Scatter each partition's labels back to its rows.
fn merge_characteristic(
    plan: &CharacteristicPlan<'_>,
    assignments: &[Vec<usize>],
    rows: usize,
    generation: usize,
) -> Result<(SampleColumn, CharacteristicReport)> {
    let characteristic = plan.characteristic;
    let mut values: Vec<Option<usize>> = vec![None; rows];

    for (task, labels) in plan.tasks.iter().zip(assignments) {
        for (row, label) in task.rows.iter().zip(labels) {
            values[*row] = Some(*label);
        }
    }

    let values = values
        .into_iter()
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| {
            SampleError::InvalidOptions(format!(
                "rows left without a value for '{}'",
                characteristic.name
            ))
        })?;

    let column = SampleColumn::new(
        characteristic.name.clone(),
        characteristic.options.clone(),
        values,
    );
    let option_counts = characteristic
        .options
        .iter()
        .cloned()
        .zip(column.option_counts().into_iter().map(|count| count as u64))
        .collect();

    let report = CharacteristicReport {
        characteristic: characteristic.name.clone(),
        generation,
        dependencies: characteristic.dependency_names.clone(),
        partitions: plan.tasks.len(),
        option_counts,
    };

    Ok((column, report))
}
