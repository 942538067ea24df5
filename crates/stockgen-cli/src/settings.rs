use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings file looked up inside a project directory.
pub const PROJECT_SETTINGS_FILE: &str = "stockgen.toml";

const DEFAULT_RUN_DIR: &str = "runs";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Sampler settings read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerSettings {
    pub seed: u64,
    pub threads: Option<usize>,
    pub run_dir: PathBuf,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            seed: 1,
            threads: None,
            run_dir: PathBuf::from(DEFAULT_RUN_DIR),
        }
    }
}

impl SamplerSettings {
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read `explicit` when given, else `<project>/stockgen.toml` if present, else defaults.
pub fn load_settings(
    explicit: Option<&Path>,
    project: &Path,
) -> Result<SamplerSettings, SettingsError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = project.join(PROJECT_SETTINGS_FILE);
            if !candidate.is_file() {
                return Ok(SamplerSettings::default());
            }
            candidate
        }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Read {
        path: path.clone(),
        source,
    })?;
    SamplerSettings::from_toml(&path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_project() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stockgen_settings_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn missing_project_settings_fall_back_to_defaults() {
        let project = temp_project();
        let settings = load_settings(None, &project).expect("load");
        assert_eq!(settings, SamplerSettings::default());
        assert_eq!(settings.run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn project_settings_are_read() {
        let project = temp_project();
        std::fs::write(
            project.join(PROJECT_SETTINGS_FILE),
            "seed = 42\nthreads = 3\n",
        )
        .expect("write settings");

        let settings = load_settings(None, &project).expect("load");
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.threads, Some(3));
        assert_eq!(settings.run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let project = temp_project();
        let err = load_settings(Some(&project.join("absent.toml")), &project).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SamplerSettings::from_toml(Path::new("s.toml"), "sead = 4\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }
}
