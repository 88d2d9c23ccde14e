// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Watch command - re-validate the DAG on file changes

use colored::Colorize;
use miette::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{print_suggestion, DagArgs};
use crate::config::ProjectConfig;
use crate::dag::{DagLoader, DagValidator};
use crate::errors::EtlDagError;
use crate::utils::{print_error, print_warning};

/// Run the watch command
pub async fn run(
    args: DagArgs,
    debounce_ms: u64,
    config: &ProjectConfig,
    verbose: bool,
) -> Result<()> {
    let (root, _) = args.resolve(config);
    if !root.exists() {
        let err = EtlDagError::DagNotFound { path: root };
        print_suggestion(&err);
        return Err(err.into());
    }

    println!("{}", "Starting watch mode...".bold());
    println!("Watching DAG files (debounce: {}ms)", debounce_ms);
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), move |res| {
        let _ = tx.send(res);
    })
    .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    let mut gate = ChangeGate::default();
    let loaded = revalidate(&args, config, &mut gate, verbose);

    for dir in watch_dirs(&root, &loaded) {
        debug!("Watching {}", dir.display());
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|e| miette::miette!("Failed to watch '{}': {}", dir.display(), e))?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!();
                println!("{}", "Stopped watching.".dimmed());
                break;
            }
            event = rx.recv() => {
                match event {
                    Some(Ok(events)) => {
                        let relevant: Vec<_> = events
                            .iter()
                            .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                            .filter(|e| is_yaml(&e.path))
                            .collect();

                        if relevant.is_empty() {
                            continue;
                        }

                        println!();
                        println!("{}", "─".repeat(50).dimmed());
                        println!(
                            "{}: {} file(s) changed",
                            "Change detected".yellow(),
                            relevant.len()
                        );
                        if verbose {
                            for event in &relevant {
                                println!("  {}", event.path.display());
                            }
                        }
                        println!();

                        revalidate(&args, config, &mut gate, verbose);
                    }
                    Some(Err(e)) => {
                        eprintln!("{}: {:?}", "Watch error".red(), e);
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

/// Remembers the fingerprint of the last DAG that was validated
#[derive(Debug, Default)]
struct ChangeGate {
    last: Option<String>,
}

impl ChangeGate {
    /// Whether `fingerprint` differs from the last one seen; records it
    fn changed(&mut self, fingerprint: String) -> bool {
        if self.last.as_ref() == Some(&fingerprint) {
            return false;
        }
        self.last = Some(fingerprint);
        true
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// Load and validate once, printing the outcome; returns the loaded files
fn revalidate(
    args: &DagArgs,
    config: &ProjectConfig,
    gate: &mut ChangeGate,
    verbose: bool,
) -> Vec<PathBuf> {
    let start = Instant::now();
    let (root, options) = args.resolve(config);

    let dag = match DagLoader::load(&root, &options) {
        Ok(dag) => dag,
        Err(e) => {
            gate.reset();
            eprintln!("{} {}", "✗".red(), e);
            print_suggestion(&e);
            return Vec::new();
        }
    };
    let files: Vec<PathBuf> = dag.files().iter().map(|f| f.path.clone()).collect();

    if !gate.changed(dag.fingerprint()) {
        println!("{}", "No effective change to the DAG, skipping.".dimmed());
        return files;
    }

    let validation = DagValidator::validate(&dag, &config.validation_options());

    for error in &validation.errors {
        print_error(error);
    }
    if verbose || validation.errors.len() + validation.warnings.len() <= 20 {
        for warning in &validation.warnings {
            print_warning(warning);
        }
    } else if validation.has_warnings() {
        print_warning(&format!(
            "{} warnings (use -v to list)",
            validation.warnings.len()
        ));
    }

    let elapsed = start.elapsed().as_secs_f64();
    if validation.is_valid() {
        println!(
            "{} {} steps ({:.2}s)",
            "DAG is valid:".green(),
            dag.len(),
            elapsed
        );
    } else {
        println!(
            "{} {} error(s) ({:.2}s)",
            "DAG is invalid:".red(),
            validation.errors.len(),
            elapsed
        );
    }

    files
}

/// Directories to watch: the root DAG's directory plus any directory of a
/// loaded file outside it
fn watch_dirs(root: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    let base = root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let base_abs = base.canonicalize().unwrap_or_else(|_| base.clone());

    let mut dirs = BTreeSet::new();
    dirs.insert(base);
    for file in files {
        if let Some(parent) = file.parent() {
            let abs = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
            if !abs.starts_with(&base_abs) {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    dirs.into_iter().collect()
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}
