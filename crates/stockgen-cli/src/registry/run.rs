use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RegistryError, RegistryResult};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub project: PathBuf,
    pub num_datapoints: u64,
    pub output: PathBuf,
    pub seed: u64,
    pub threads: Option<usize>,
    pub run_dir: PathBuf,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub project: PathBuf,
    pub num_datapoints: u64,
    pub output: PathBuf,
    pub seed: u64,
    pub threads: Option<usize>,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let paths = run_paths(ctx);
    create_dir_all(&paths.root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        project: ctx.project.clone(),
        num_datapoints: ctx.num_datapoints,
        output: ctx.output.clone(),
        seed: ctx.seed,
        threads: ctx.threads,
        git: collect_git_info(),
    };

    write_json(&paths.config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.logs_path)?;

    Ok(paths)
}

fn run_paths(ctx: &RunContext) -> RunPaths {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx
        .run_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));
    RunPaths {
        config_path: root.join("config.json"),
        logs_path: root.join("logs.ndjson"),
        report_path: root.join("sample_report.json"),
        root,
    }
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}
