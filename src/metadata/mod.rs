// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Dataset metadata
//!
//! Parsing and validation of the `*.meta.yml` files that sit next to steps.

mod definition;
mod validation;

pub use definition::{
    DatasetMeta, Display, License, MetadataFile, Origin, Presentation, TableMeta, VariableMeta,
};
pub use validation::{MetadataValidator, MAX_DESCRIPTION_SHORT_LEN, MAX_SHORT_UNIT_LEN};

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::errors::{EtlDagError, EtlDagResult};

/// Expand glob patterns into a sorted, de-duplicated list of files
///
/// Patterns that name an existing file directly are taken as-is.
pub fn collect_files(patterns: &[String]) -> EtlDagResult<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for pattern in patterns {
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(path) if path.is_file() => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
            }
        }
    }

    if files.is_empty() {
        return Err(EtlDagError::NoMetadataFiles {
            pattern: patterns.join(", "),
        });
    }

    Ok(files.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files() {
        let dir = TempDir::new().unwrap();
        let garden = dir.path().join("garden/who/2024");
        std::fs::create_dir_all(&garden).unwrap();
        std::fs::write(garden.join("gho.meta.yml"), "tables: {}\n").unwrap();
        std::fs::write(garden.join("gho.py"), "").unwrap();
        std::fs::write(dir.path().join("top.meta.yml"), "tables: {}\n").unwrap();

        let pattern = format!("{}/**/*.meta.yml", dir.path().display());
        let files = collect_files(&[pattern.clone(), pattern]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.to_string_lossy().ends_with(".meta.yml")));
    }

    #[test]
    fn test_collect_files_none_matched() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.meta.yml", dir.path().display());

        let err = collect_files(&[pattern]).unwrap_err();
        assert!(matches!(err, EtlDagError::NoMetadataFiles { .. }));
    }
}
