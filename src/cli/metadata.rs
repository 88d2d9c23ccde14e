// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Metadata command - validate metadata files

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use super::OutputFormat;
use crate::config::ProjectConfig;
use crate::dag::ValidationResult;
use crate::metadata::{collect_files, MetadataFile, MetadataValidator};
use crate::utils::create_progress_bar;

#[derive(Debug, Serialize)]
struct FileReport {
    path: PathBuf,
    variables: usize,
    #[serde(flatten)]
    result: ValidationResult,
}

/// Run the metadata command
pub async fn run(
    patterns: Vec<String>,
    strict: bool,
    format: OutputFormat,
    config: &ProjectConfig,
    verbose: bool,
) -> Result<()> {
    let patterns = if patterns.is_empty() {
        config.metadata.clone()
    } else {
        patterns
    };
    let files = collect_files(&patterns)?;

    let progress = create_progress_bar(files.len() as u64, "Validating metadata");
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        progress.set_message(path.display().to_string());
        reports.push(check_file(path));
        progress.inc(1);
    }
    progress.finish_and_clear();

    let errors: usize = reports.iter().map(|r| r.result.errors.len()).sum();
    let warnings: usize = reports.iter().map(|r| r.result.warnings.len()).sum();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&reports)
                .map_err(|e| miette::miette!("Failed to serialize result: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => print_reports(&reports, verbose),
    }

    if errors > 0 {
        return Err(miette::miette!(
            "Metadata validation failed with {} error(s) in {} file(s)",
            errors,
            reports.iter().filter(|r| !r.result.is_valid()).count()
        ));
    }
    if strict && warnings > 0 {
        return Err(miette::miette!(
            "Metadata has {} warning(s) and --strict was given",
            warnings
        ));
    }

    Ok(())
}

/// Parse and validate one file; parse failures become errors in the report
fn check_file(path: PathBuf) -> FileReport {
    debug!("Validating {}", path.display());

    match MetadataFile::from_file(&path) {
        Ok(meta) => FileReport {
            variables: meta.variable_count(),
            result: MetadataValidator::validate(&meta),
            path,
        },
        Err(e) => {
            let mut result = ValidationResult::new();
            result.add_error(&e.to_string());
            FileReport {
                path,
                variables: 0,
                result,
            }
        }
    }
}

fn print_reports(reports: &[FileReport], verbose: bool) {
    println!("{}", "Validating metadata...".bold());
    println!();

    for report in reports {
        let result = &report.result;
        if !result.is_valid() {
            println!("  {} {}", "✗".red(), report.path.display());
        } else if result.has_warnings() {
            println!("  {} {}", "⚠".yellow(), report.path.display());
        } else if verbose {
            println!(
                "  {} {} {}",
                "✓".green(),
                report.path.display(),
                format!("({} variables)", report.variables).dimmed()
            );
        }

        for error in &result.errors {
            println!("      {} {}", "error:".red(), error);
        }
        for warning in &result.warnings {
            println!("      {} {}", "warning:".yellow(), warning);
        }
    }

    let valid = reports.iter().filter(|r| r.result.is_valid()).count();
    let variables: usize = reports.iter().map(|r| r.variables).sum();

    println!();
    println!(
        "{} of {} file(s) valid, {} variable(s) checked",
        valid,
        reports.len(),
        variables
    );
}
