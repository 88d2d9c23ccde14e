// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Project configuration
//!
//! Loaded from `.etldag.yaml` in the working directory, or from
//! `config.yaml` in the user config directory when the project has none.
//! Command-line flags override whatever is set here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::dag::{DuplicatePolicy, LoadOptions, Scheme, ValidationOptions};
use crate::errors::{EtlDagError, EtlDagResult};

/// Name of the per-project configuration file
pub const CONFIG_FILE: &str = ".etldag.yaml";

/// Settings from `.etldag.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Root DAG file
    #[serde(default = "default_dag")]
    pub dag: PathBuf,

    /// Directory of archived DAG files
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,

    /// Load archived DAG files alongside the active ones
    #[serde(default)]
    pub include_archive: bool,

    /// How to treat a step defined in more than one file
    #[serde(default)]
    pub duplicates: DuplicatePolicy,

    /// Warn about dependencies on old dataset versions
    #[serde(default = "default_true")]
    pub warn_outdated: bool,

    /// Glob patterns of metadata files
    #[serde(default = "default_metadata")]
    pub metadata: Vec<String>,

    /// Schemes that may be referenced without a definition
    #[serde(default)]
    pub source_schemes: Option<Vec<Scheme>>,

    /// File this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_dag() -> PathBuf {
    PathBuf::from("dag/main.yml")
}

fn default_true() -> bool {
    true
}

fn default_metadata() -> Vec<String> {
    vec!["steps/**/*.meta.yml".to_string()]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dag: default_dag(),
            archive_dir: None,
            include_archive: false,
            duplicates: DuplicatePolicy::default(),
            warn_outdated: true,
            metadata: default_metadata(),
            source_schemes: None,
            source: None,
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> EtlDagResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EtlDagError::read_failed(path, e))?;

        let invalid = |e: serde_yaml::Error| EtlDagError::ConfigError {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(invalid)?;
        let mut config = if value.is_null() {
            Self::default()
        } else {
            serde_yaml::from_value::<Self>(value).map_err(invalid)?
        };

        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find the configuration for a project directory
    ///
    /// Falls back to the user config file, then to defaults.
    pub fn discover(dir: &Path) -> EtlDagResult<Self> {
        let local = dir.join(CONFIG_FILE);
        if local.is_file() {
            debug!("Using project config {}", local.display());
            return Self::load(&local);
        }

        if let Some(user) = Self::user_config_path().filter(|p| p.is_file()) {
            debug!("Using user config {}", user.display());
            return Self::load(&user);
        }

        debug!("No configuration found, using defaults");
        Ok(Self::default())
    }

    /// `config.yaml` in the platform's config directory for etldag
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "etldag")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Directory of the project `.etldag.yaml` this config came from
    pub fn project_dir(&self) -> Option<PathBuf> {
        let source = self.source.as_ref()?;
        if source.file_name()? != CONFIG_FILE {
            return None;
        }
        source.parent().map(Path::to_path_buf)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            duplicates: self.duplicates,
            archive_dir: self.archive_dir.clone(),
            load_archive: self.include_archive,
            base_dir: self.project_dir(),
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        let defaults = ValidationOptions::default();
        ValidationOptions {
            warn_outdated: self.warn_outdated,
            source_schemes: self
                .source_schemes
                .clone()
                .unwrap_or(defaults.source_schemes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.dag, PathBuf::from("dag/main.yml"));
        assert_eq!(config.duplicates, DuplicatePolicy::Error);
        assert!(config.warn_outdated);

        let options = config.validation_options();
        assert!(options.source_schemes.contains(&Scheme::Snapshot));
        assert!(!options.source_schemes.contains(&Scheme::Data));
    }

    #[test]
    fn test_load_project_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "dag: etl/dag/main.yml\n\
             duplicates: override\n\
             include_archive: true\n\
             warn_outdated: false\n\
             source_schemes: [snapshot, etag]\n",
        )
        .unwrap();

        let config = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(config.dag, PathBuf::from("etl/dag/main.yml"));
        assert_eq!(config.source, Some(dir.path().join(CONFIG_FILE)));

        let load = config.load_options();
        assert_eq!(load.duplicates, DuplicatePolicy::Override);
        assert!(load.load_archive);
        assert_eq!(load.base_dir, Some(dir.path().to_path_buf()));

        let validation = config.validation_options();
        assert!(!validation.warn_outdated);
        assert_eq!(validation.source_schemes, vec![Scheme::Snapshot, Scheme::Etag]);
    }

    #[test]
    fn test_empty_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "# nothing configured\n").unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.metadata, vec!["steps/**/*.meta.yml"]);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "dags: main.yml\n").unwrap();

        let err = ProjectConfig::load(&path).unwrap_err();
        assert!(matches!(err, EtlDagError::ConfigError { .. }));
    }
}
