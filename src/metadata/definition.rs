// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Metadata file structures
//!
//! Schema of the `*.meta.yml` files that document a dataset and the
//! variables of its tables. Keys outside the schema are kept in `extra` so
//! they can be reported instead of silently dropped.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{EtlDagError, EtlDagResult};

type Extra = BTreeMap<String, serde_yaml::Value>;

/// A metadata YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFile {
    /// Shared snippets, usually referenced through YAML anchors
    #[serde(default)]
    pub definitions: Option<serde_yaml::Value>,

    #[serde(default)]
    pub dataset: Option<DatasetMeta>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tables: BTreeMap<String, TableMeta>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl MetadataFile {
    /// Load a metadata file from disk
    pub fn from_file(path: &Path) -> EtlDagResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EtlDagError::read_failed(path, e))?;

        Self::from_yaml(&content).map_err(|e| EtlDagError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse metadata from YAML, resolving `<<:` merge keys first
    pub fn from_yaml(yaml: &str) -> EtlDagResult<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        value.apply_merge()?;
        serde_yaml::from_value(value).map_err(Into::into)
    }

    /// Number of variables over all tables
    pub fn variable_count(&self) -> usize {
        self.tables.values().map(|t| t.variables.len()).sum()
    }
}

/// `dataset:` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetMeta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub licenses: Vec<License>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub update_period_days: Option<u32>,
    #[serde(default)]
    pub non_redistributable: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `tables.<table>:` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: BTreeMap<String, VariableMeta>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `tables.<table>.variables.<variable>:` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableMeta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub short_unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_short: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description_key: Vec<String>,
    #[serde(default)]
    pub description_processing: Option<String>,
    #[serde(default)]
    pub description_from_producer: Option<String>,
    /// `minor` or `major`; kept as text since it is often templated
    #[serde(default)]
    pub processing_level: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort: Vec<String>,
    #[serde(default)]
    pub display: Option<Display>,
    #[serde(default)]
    pub presentation: Option<Presentation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub origins: Vec<Origin>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub licenses: Vec<License>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Chart display hints (camelCase, as consumed by the chart renderer)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub num_decimal_places: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub short_unit: Option<String>,
    #[serde(default)]
    pub conversion_factor: Option<f64>,
    #[serde(default)]
    pub is_projection: Option<bool>,
    #[serde(default)]
    pub tolerance: Option<i64>,
    #[serde(default)]
    pub entity_annotations_map: Option<String>,
    #[serde(default)]
    pub include_in_table: Option<bool>,
    #[serde(default)]
    pub zero_day: Option<String>,
    #[serde(default)]
    pub year_is_day: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `presentation:` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub title_public: Option<String>,
    #[serde(default)]
    pub title_variant: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub attribution_short: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub faqs: Vec<serde_yaml::Value>,
    /// Free-form chart configuration
    #[serde(default)]
    pub grapher_config: Option<serde_yaml::Mapping>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Provenance of the data behind a variable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub producer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_snapshot: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub citation_full: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub attribution_short: Option<String>,
    #[serde(default)]
    pub url_main: Option<String>,
    #[serde(default)]
    pub url_download: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub date_published: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub date_accessed: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub version_producer: Option<String>,
    #[serde(default)]
    pub license: Option<License>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Licence reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct License {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept `2023`, `2023-05-01` or `"2023"` alike
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_yaml::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, got {:?}",
            other
        ))),
    }
}
