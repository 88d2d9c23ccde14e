// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! DAG loading and `include:` merging
//!
//! Starting from a root file, every included file is read once and its steps
//! are merged into a single [`MergedDag`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::dag::{DagFile, StepUri};
use crate::errors::{EtlDagError, EtlDagResult};

/// What to do when two files define the same step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail loading
    #[default]
    Error,
    /// Union the dependency lists and record a note
    Warn,
    /// Keep the definition loaded last and record a note
    Override,
}

/// Options for [`DagLoader`]
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub duplicates: DuplicatePolicy,
    /// Directory holding archived DAG files; defaults to `archive/` next to
    /// the root file
    pub archive_dir: Option<PathBuf>,
    /// Also load every file in the archive directory
    pub load_archive: bool,
    /// Project directory that relative includes resolve against first;
    /// the working directory when unset
    pub base_dir: Option<PathBuf>,
}

/// A DAG file that took part in the merge
#[derive(Debug, Clone, Serialize)]
pub struct LoadedFile {
    pub path: PathBuf,
    /// BLAKE3 hex digest of the file content
    pub fingerprint: String,
    pub archived: bool,
    pub step_count: usize,
}

/// A step after merging
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepEntry {
    pub dependencies: BTreeSet<StepUri>,
    /// Files that define this step, in load order
    pub defined_in: Vec<PathBuf>,
    pub archived: bool,
    /// Dependencies listed more than once in a single definition
    pub repeated_dependencies: Vec<StepUri>,
}

/// All steps from a root DAG file and everything it includes
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedDag {
    steps: BTreeMap<StepUri, StepEntry>,
    files: Vec<LoadedFile>,
    notes: Vec<String>,
}

impl MergedDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one step definition coming from `file`
    pub fn insert(
        &mut self,
        step: StepUri,
        dependencies: Vec<StepUri>,
        file: &Path,
        archived: bool,
        policy: DuplicatePolicy,
    ) -> EtlDagResult<()> {
        let mut unique = BTreeSet::new();
        let mut repeated = Vec::new();
        for dep in dependencies {
            if !unique.insert(dep.clone()) {
                repeated.push(dep);
            }
        }

        let Some(existing) = self.steps.get_mut(&step) else {
            self.steps.insert(
                step,
                StepEntry {
                    dependencies: unique,
                    defined_in: vec![file.to_path_buf()],
                    archived,
                    repeated_dependencies: repeated,
                },
            );
            return Ok(());
        };

        let first = existing.defined_in[0].clone();
        let previous = existing.defined_in.last().unwrap_or(&first).clone();
        match policy {
            DuplicatePolicy::Error => {
                return Err(EtlDagError::DuplicateStep {
                    step: step.to_string(),
                    first,
                    second: file.to_path_buf(),
                });
            }
            DuplicatePolicy::Warn => {
                existing.dependencies.extend(unique);
                existing.repeated_dependencies.extend(repeated);
                existing.archived &= archived;
                self.notes.push(format!(
                    "Step '{}' is defined in both '{}' and '{}'; dependencies merged",
                    step,
                    first.display(),
                    file.display()
                ));
            }
            DuplicatePolicy::Override => {
                existing.dependencies = unique;
                existing.repeated_dependencies = repeated;
                existing.archived = archived;
                self.notes.push(format!(
                    "Step '{}' from '{}' overrides the definition in '{}'",
                    step,
                    file.display(),
                    previous.display()
                ));
            }
        }
        existing.defined_in.push(file.to_path_buf());
        Ok(())
    }

    pub fn steps(&self) -> &BTreeMap<StepUri, StepEntry> {
        &self.steps
    }

    pub fn get(&self, step: &StepUri) -> Option<&StepEntry> {
        self.steps.get(step)
    }

    /// Look a step up by its string form
    pub fn find(&self, step: &str) -> Option<(&StepUri, &StepEntry)> {
        let uri = StepUri::parse(step).ok()?;
        self.steps.get_key_value(&uri)
    }

    pub fn contains(&self, step: &StepUri) -> bool {
        self.steps.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    /// Non-fatal observations made while merging
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Steps referenced as a dependency but not defined anywhere
    pub fn undefined_references(&self) -> BTreeSet<&StepUri> {
        self.steps
            .values()
            .flat_map(|entry| entry.dependencies.iter())
            .filter(|dep| !self.steps.contains_key(*dep))
            .collect()
    }

    /// Combined fingerprint over every loaded file
    pub fn fingerprint(&self) -> String {
        let mut files: Vec<&LoadedFile> = self.files.iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = blake3::Hasher::new();
        for file in files {
            hasher.update(file.path.to_string_lossy().as_bytes());
            hasher.update(file.fingerprint.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Loads a root DAG file and everything it includes
pub struct DagLoader {
    options: LoadOptions,
    base_dir: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    visited: HashSet<PathBuf>,
    stack: Vec<PathBuf>,
    dag: MergedDag,
}

impl DagLoader {
    /// Load `root` and merge all included (and optionally archived) files
    pub fn load(root: &Path, options: &LoadOptions) -> EtlDagResult<MergedDag> {
        if !root.exists() {
            return Err(EtlDagError::DagNotFound {
                path: root.to_path_buf(),
            });
        }

        let archive_dir = options
            .archive_dir
            .clone()
            .unwrap_or_else(|| root.parent().unwrap_or(Path::new(".")).join("archive"));

        let base_dir = options
            .base_dir
            .clone()
            .or_else(|| std::env::current_dir().ok());

        let mut loader = Self {
            options: options.clone(),
            base_dir,
            archive_dir: archive_dir.canonicalize().ok(),
            visited: HashSet::new(),
            stack: Vec::new(),
            dag: MergedDag::new(),
        };

        loader.load_file(root)?;

        if options.load_archive {
            for file in archive_files(&archive_dir)? {
                loader.load_file(&file)?;
            }
        }

        debug!(
            files = loader.dag.files.len(),
            steps = loader.dag.len(),
            "merged DAG"
        );

        Ok(loader.dag)
    }

    fn load_file(&mut self, path: &Path) -> EtlDagResult<()> {
        let canonical = path.canonicalize().map_err(|e| EtlDagError::read_failed(path, e))?;

        if let Some(pos) = self.stack.iter().position(|p| p == &canonical) {
            let mut chain: Vec<String> = self.stack[pos..]
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(canonical.display().to_string());
            return Err(EtlDagError::IncludeCycle { chain });
        }

        if !self.visited.insert(canonical.clone()) {
            debug!(path = %path.display(), "already loaded, skipping");
            return Ok(());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| EtlDagError::read_failed(path, e))?;
        let file = DagFile::from_yaml(&content).map_err(|e| EtlDagError::InvalidDagFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let archived = self
            .archive_dir
            .as_ref()
            .is_some_and(|dir| canonical.starts_with(dir));

        let steps = file.parsed_steps().map_err(|e| EtlDagError::InvalidDagFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %path.display(),
            steps = steps.len(),
            includes = file.include.len(),
            archived,
            "loaded DAG file"
        );

        self.dag.files.push(LoadedFile {
            path: path.to_path_buf(),
            fingerprint: blake3::hash(content.as_bytes()).to_hex().to_string(),
            archived,
            step_count: steps.len(),
        });

        for (step, deps) in steps {
            self.dag
                .insert(step, deps, path, archived, self.options.duplicates)?;
        }

        self.stack.push(canonical);
        for include in &file.include {
            let target = self.resolve_include(include, path);

            if !target.exists() {
                warn!(include = %target.display(), from = %path.display(), "missing include");
                return Err(EtlDagError::include_not_found(target, path.to_path_buf()));
            }

            self.load_file(&target)?;
        }
        self.stack.pop();

        Ok(())
    }

    /// Absolute includes are used as-is; relative ones are tried against the
    /// project directory, then against the including file's directory
    fn resolve_include(&self, include: &Path, from: &Path) -> PathBuf {
        if include.is_absolute() {
            return include.to_path_buf();
        }

        if let Some(candidate) = self
            .base_dir
            .as_ref()
            .map(|base| base.join(include))
            .filter(|p| p.exists())
        {
            return candidate;
        }

        from.parent().unwrap_or(Path::new(".")).join(include)
    }
}

/// Every `*.yml` / `*.yaml` directly inside `dir`, sorted
fn archive_files(dir: &Path) -> EtlDagResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "no archive directory");
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for ext in ["yml", "yaml"] {
        let pattern = dir.join(format!("*.{}", ext));
        for entry in glob::glob(&pattern.to_string_lossy())? {
            match entry {
                Ok(path) => files.push(path),
                Err(e) => warn!(error = %e, "unreadable archive entry"),
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn uri(s: &str) -> StepUri {
        StepUri::parse(s).unwrap()
    }

    #[test]
    fn test_follows_includes_relative_to_including_file() {
        let tmp = TempDir::new().unwrap();
        let root = write(
            tmp.path(),
            "dag/main.yml",
            "include:\n  - health.yml\nsteps:\n  data://garden/un/2024/population:\n    - snapshot://un/2024/wpp.csv\n",
        );
        write(
            tmp.path(),
            "dag/health.yml",
            "steps:\n  data://garden/who/2024/gho:\n    - data://garden/un/2024/population\n",
        );

        let dag = DagLoader::load(&root, &LoadOptions::default()).unwrap();

        assert_eq!(dag.len(), 2);
        assert_eq!(dag.files().len(), 2);
        let gho = dag.get(&uri("data://garden/who/2024/gho")).unwrap();
        assert!(gho.dependencies.contains(&uri("data://garden/un/2024/population")));
        assert!(gho.defined_in[0].ends_with("health.yml"));
    }

    #[test]
    fn test_follows_project_relative_includes() {
        let tmp = TempDir::new().unwrap();
        let root = write(
            tmp.path(),
            "dag/main.yml",
            "include:\n  - dag/health.yml\nsteps:\n  data://garden/un/2024/population:\n",
        );
        write(
            tmp.path(),
            "dag/health.yml",
            "steps:\n  data://garden/who/2024/gho:\n    - data://garden/un/2024/population\n",
        );

        let options = LoadOptions {
            base_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let dag = DagLoader::load(&root, &options).unwrap();

        assert_eq!(dag.len(), 2);
        assert_eq!(dag.files().len(), 2);
        assert_eq!(dag.files()[1].path, tmp.path().join("dag/health.yml"));

        let err = DagLoader::load(&root, &LoadOptions::default()).unwrap_err();
        match err {
            EtlDagError::IncludeNotFound { path, .. } => {
                assert!(path.ends_with("dag/dag/health.yml"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_diamond_include_loads_once() {
        let tmp = TempDir::new().unwrap();
        let root = write(tmp.path(), "main.yml", "include:\n  - a.yml\n  - b.yml\n");
        write(tmp.path(), "a.yml", "include:\n  - shared.yml\n");
        write(tmp.path(), "b.yml", "include:\n  - shared.yml\n");
        write(
            tmp.path(),
            "shared.yml",
            "steps:\n  data://garden/regions/2023/regions:\n",
        );

        let dag = DagLoader::load(&root, &LoadOptions::default()).unwrap();
        assert_eq!(dag.files().len(), 4);
        assert_eq!(dag.len(), 1);
    }

    #[test]
    fn test_include_cycle_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let root = write(tmp.path(), "main.yml", "include:\n  - a.yml\n");
        write(tmp.path(), "a.yml", "include:\n  - main.yml\n");

        let err = DagLoader::load(&root, &LoadOptions::default()).unwrap_err();
        match err {
            EtlDagError::IncludeCycle { chain } => {
                assert_eq!(chain.len(), 3);
                assert!(chain[0].ends_with("main.yml"));
                assert!(chain[2].ends_with("main.yml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_include() {
        let tmp = TempDir::new().unwrap();
        let root = write(tmp.path(), "main.yml", "include:\n  - nope.yml\n");

        let err = DagLoader::load(&root, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, EtlDagError::IncludeNotFound { .. }));
    }

    #[test]
    fn test_missing_root() {
        let err = DagLoader::load(Path::new("/definitely/not/here.yml"), &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, EtlDagError::DagNotFound { .. }));
    }

    #[test]
    fn test_duplicate_policies() {
        let tmp = TempDir::new().unwrap();
        let root = write(tmp.path(), "main.yml", "include:\n  - other.yml\nsteps:\n  data://garden/a/2024/b:\n    - snapshot://a/2024/b.csv\n");
        write(
            tmp.path(),
            "other.yml",
            "steps:\n  data://garden/a/2024/b:\n    - snapshot://a/2024/c.csv\n",
        );

        let err = DagLoader::load(&root, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, EtlDagError::DuplicateStep { .. }));

        let merged = DagLoader::load(
            &root,
            &LoadOptions {
                duplicates: DuplicatePolicy::Warn,
                ..Default::default()
            },
        )
        .unwrap();
        let entry = merged.get(&uri("data://garden/a/2024/b")).unwrap();
        assert_eq!(entry.dependencies.len(), 2);
        assert_eq!(entry.defined_in.len(), 2);
        assert_eq!(merged.notes().len(), 1);

        let overridden = DagLoader::load(
            &root,
            &LoadOptions {
                duplicates: DuplicatePolicy::Override,
                ..Default::default()
            },
        )
        .unwrap();
        let entry = overridden.get(&uri("data://garden/a/2024/b")).unwrap();
        assert_eq!(
            entry.dependencies.iter().collect::<Vec<_>>(),
            vec![&uri("snapshot://a/2024/c.csv")]
        );
    }

    #[test]
    fn test_override_note_names_replaced_definition() {
        let mut dag = MergedDag::new();
        for file in ["main.yml", "second.yml", "third.yml"] {
            dag.insert(
                uri("data://garden/a/2024/b"),
                vec![],
                Path::new(file),
                false,
                DuplicatePolicy::Override,
            )
            .unwrap();
        }

        assert_eq!(dag.notes().len(), 2);
        assert!(dag.notes()[1].ends_with("overrides the definition in 'second.yml'"));
        assert_eq!(
            dag.get(&uri("data://garden/a/2024/b")).unwrap().defined_in.len(),
            3
        );
    }

    #[test]
    fn test_archive_files_are_flagged() {
        let tmp = TempDir::new().unwrap();
        let root = write(
            tmp.path(),
            "dag/main.yml",
            "steps:\n  data://garden/a/2024/b:\n    - data://garden/a/2020/b\n",
        );
        write(
            tmp.path(),
            "dag/archive/old.yml",
            "steps:\n  data://garden/a/2020/b:\n",
        );

        let without = DagLoader::load(&root, &LoadOptions::default()).unwrap();
        assert_eq!(without.len(), 1);

        let with = DagLoader::load(
            &root,
            &LoadOptions {
                load_archive: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(with.len(), 2);
        assert!(with.get(&uri("data://garden/a/2020/b")).unwrap().archived);
        assert!(!with.get(&uri("data://garden/a/2024/b")).unwrap().archived);
    }

    #[test]
    fn test_included_archive_file_is_flagged() {
        let tmp = TempDir::new().unwrap();
        let root = write(
            tmp.path(),
            "dag/main.yml",
            "include:\n  - archive/old.yml\nsteps:\n  data://garden/a/2024/b:\n    - data://garden/a/2020/b\n",
        );
        write(
            tmp.path(),
            "dag/archive/old.yml",
            "steps:\n  data://garden/a/2020/b:\n",
        );

        let dag = DagLoader::load(&root, &LoadOptions::default()).unwrap();

        assert_eq!(dag.len(), 2);
        assert!(dag.get(&uri("data://garden/a/2020/b")).unwrap().archived);
        assert!(!dag.get(&uri("data://garden/a/2024/b")).unwrap().archived);
        let archived: Vec<bool> = dag.files().iter().map(|f| f.archived).collect();
        assert_eq!(archived, vec![false, true]);
    }

    #[test]
    fn test_repeated_dependencies_recorded() {
        let mut dag = MergedDag::new();
        dag.insert(
            uri("data://garden/a/2024/b"),
            vec![uri("snapshot://a/2024/b.csv"), uri("snapshot://a/2024/b.csv")],
            Path::new("main.yml"),
            false,
            DuplicatePolicy::Error,
        )
        .unwrap();

        let entry = dag.get(&uri("data://garden/a/2024/b")).unwrap();
        assert_eq!(entry.dependencies.len(), 1);
        assert_eq!(entry.repeated_dependencies.len(), 1);
        assert_eq!(dag.undefined_references().len(), 1);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let tmp = TempDir::new().unwrap();
        let root = write(tmp.path(), "main.yml", "steps:\n  data://garden/a/2024/b:\n");

        let first = DagLoader::load(&root, &LoadOptions::default()).unwrap().fingerprint();
        let again = DagLoader::load(&root, &LoadOptions::default()).unwrap().fingerprint();
        assert_eq!(first, again);

        write(tmp.path(), "main.yml", "steps:\n  data://garden/a/2024/c:\n");
        let changed = DagLoader::load(&root, &LoadOptions::default()).unwrap().fingerprint();
        assert_ne!(first, changed);
    }
}
