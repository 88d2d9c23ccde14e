// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! DAG file structures
//!
//! Defines the schema of a single DAG YAML file:
//!
//! ```yaml
//! include:
//!   - health.yml
//! steps:
//!   data://meadow/who/2024-01-01/gho:
//!     - snapshot://who/2024-01-01/gho.zip
//!   data://garden/who/2024-01-01/gho:
//!     - data://meadow/who/2024-01-01/gho
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dag::StepUri;
use crate::errors::{EtlDagError, EtlDagResult};

/// Contents of one DAG file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DagFile {
    /// Other DAG files to merge in
    #[serde(default, deserialize_with = "null_as_default")]
    pub include: Vec<PathBuf>,

    /// Step → dependencies, keyed by the raw URI
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: BTreeMap<String, Dependencies>,
}

/// Dependency list of a step; `null` and a missing value mean "none"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dependencies(#[serde(deserialize_with = "null_as_default")] pub Vec<String>);

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DagFile {
    /// Load a DAG file from disk
    pub fn from_file(path: &Path) -> EtlDagResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EtlDagError::read_failed(path, e))?;

        Self::from_yaml(&content).map_err(|e| EtlDagError::InvalidDagFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse a DAG file from YAML
    ///
    /// An empty or comment-only document is an empty DAG file.
    pub fn from_yaml(yaml: &str) -> EtlDagResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(Into::into)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> EtlDagResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Parse every step key and dependency into URIs
    pub fn parsed_steps(&self) -> EtlDagResult<Vec<(StepUri, Vec<StepUri>)>> {
        self.steps
            .iter()
            .map(|(step, deps)| {
                let step = StepUri::parse(step)?;
                let deps = deps
                    .0
                    .iter()
                    .map(|d| StepUri::parse(d))
                    .collect::<EtlDagResult<Vec<_>>>()?;
                Ok((step, deps))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dag_file() {
        let yaml = r#"
include:
  - dag/health.yml
  - dag/archive/health.yml
steps:
  data://meadow/who/2024-01-01/gho:
    - snapshot://who/2024-01-01/gho.zip
  data://garden/who/2024-01-01/gho:
    - data://meadow/who/2024-01-01/gho
    - data://garden/regions/2023-01-01/regions
"#;

        let dag = DagFile::from_yaml(yaml).unwrap();
        assert_eq!(dag.include.len(), 2);
        assert_eq!(dag.steps.len(), 2);
        assert_eq!(dag.steps["data://garden/who/2024-01-01/gho"].0.len(), 2);
    }

    #[test]
    fn test_null_dependencies() {
        let yaml = r#"
steps:
  data://garden/regions/2023-01-01/regions:
  data://garden/demography/2023-03-31/population: []
"#;

        let dag = DagFile::from_yaml(yaml).unwrap();
        assert!(dag.steps["data://garden/regions/2023-01-01/regions"].0.is_empty());
        assert!(dag.steps["data://garden/demography/2023-03-31/population"]
            .0
            .is_empty());
    }

    #[test]
    fn test_empty_and_comment_only_files() {
        assert_eq!(DagFile::from_yaml("").unwrap(), DagFile::default());
        assert_eq!(
            DagFile::from_yaml("# everything moved to archive\n").unwrap(),
            DagFile::default()
        );
        assert!(DagFile::from_yaml("steps:\n").unwrap().steps.is_empty());
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let yaml = "stepz:\n  data://garden/a/latest/b: []\n";
        assert!(DagFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_parsed_steps_reports_bad_uri() {
        let yaml = "steps:\n  data://garden/a/latest/b:\n    - not-a-uri\n";
        let dag = DagFile::from_yaml(yaml).unwrap();
        assert!(matches!(
            dag.parsed_steps(),
            Err(EtlDagError::InvalidStepUri { .. })
        ));
    }
}
