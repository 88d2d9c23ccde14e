// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Metadata validation
//!
//! Checks a parsed metadata file against what the chart renderer expects
//! from each variable record.

use crate::dag::ValidationResult;
use crate::metadata::{License, MetadataFile, Origin, VariableMeta};

/// Longest `short_unit` that still fits chart axes
pub const MAX_SHORT_UNIT_LEN: usize = 12;

/// Longest `description_short` shown in chart footers
pub const MAX_DESCRIPTION_SHORT_LEN: usize = 300;

const PROCESSING_LEVELS: [&str; 2] = ["minor", "major"];

/// Metadata validator
pub struct MetadataValidator;

impl MetadataValidator {
    /// Validate a metadata file
    pub fn validate(meta: &MetadataFile) -> ValidationResult {
        let mut result = ValidationResult::new();

        if meta.dataset.is_none() && meta.tables.is_empty() {
            result.add_error("Metadata has neither a `dataset:` nor a `tables:` block");
            return result;
        }

        for key in meta.extra.keys() {
            result.add_warning(&format!("Unknown top-level key '{}'", key));
        }

        let dataset_title = meta.dataset.as_ref().and_then(|d| d.title.as_ref());
        if let Some(dataset) = &meta.dataset {
            if dataset.title.is_none() {
                result.add_warning("dataset: missing `title`");
            }
            if dataset.update_period_days == Some(0) {
                result.add_warning("dataset: `update_period_days` is 0");
            }
            for key in dataset.extra.keys() {
                result.add_warning(&format!("dataset: unknown key '{}'", key));
            }
            Self::validate_licenses("dataset", &dataset.licenses, &mut result);
        }

        for (table_name, table) in &meta.tables {
            let table_path = format!("tables.{}", table_name);

            if table.title.is_none() && dataset_title.is_none() {
                result.add_warning(&format!(
                    "{}: missing `title` (and no dataset title to fall back on)",
                    table_path
                ));
            }
            if table.variables.is_empty() {
                result.add_warning(&format!("{}: declares no variables", table_path));
            }
            for key in table.extra.keys() {
                result.add_warning(&format!("{}: unknown key '{}'", table_path, key));
            }

            for (var_name, var) in &table.variables {
                let path = format!("{}.variables.{}", table_path, var_name);
                Self::validate_variable(&path, var, &mut result);
            }
        }

        result
    }

    fn validate_variable(path: &str, var: &VariableMeta, result: &mut ValidationResult) {
        if var.unit.is_none() {
            result.add_error(&format!("{}: missing `unit` (use \"\" for unitless values)", path));
        }
        if var.title.is_none() {
            result.add_warning(&format!("{}: missing `title`", path));
        }

        if let Some(short_unit) = &var.short_unit {
            if short_unit.chars().count() > MAX_SHORT_UNIT_LEN {
                result.add_warning(&format!(
                    "{}: `short_unit` '{}' is longer than {} characters",
                    path, short_unit, MAX_SHORT_UNIT_LEN
                ));
            }
        }

        if let Some(short) = &var.description_short {
            if short.chars().count() > MAX_DESCRIPTION_SHORT_LEN {
                result.add_warning(&format!(
                    "{}: `description_short` is longer than {} characters",
                    path, MAX_DESCRIPTION_SHORT_LEN
                ));
            }
            let body = short.trim_end_matches('\n');
            if body != body.trim_end() {
                result.add_warning(&format!("{}: `description_short` has trailing whitespace", path));
            }
        }

        if let Some(level) = &var.processing_level {
            if !is_templated(level) && !PROCESSING_LEVELS.contains(&level.as_str()) {
                result.add_error(&format!(
                    "{}: `processing_level` must be 'minor' or 'major', got '{}'",
                    path, level
                ));
            }
        }

        if let Some(display) = &var.display {
            if let Some(places) = display.num_decimal_places.filter(|p| *p < 0) {
                result.add_error(&format!(
                    "{}: `display.numDecimalPlaces` must not be negative, got {}",
                    path, places
                ));
            }
            for key in display.extra.keys() {
                result.add_warning(&format!("{}: unknown display key '{}'", path, key));
            }
        }

        if let Some(config) = var
            .presentation
            .as_ref()
            .and_then(|p| p.grapher_config.as_ref())
        {
            if let Some(has_map_tab) = config.get("hasMapTab") {
                if !has_map_tab.is_bool() {
                    result.add_error(&format!(
                        "{}: `presentation.grapher_config.hasMapTab` must be true or false",
                        path
                    ));
                }
            }
        }

        for (i, origin) in var.origins.iter().enumerate() {
            Self::validate_origin(&format!("{}.origins[{}]", path, i), origin, result);
        }
        Self::validate_licenses(path, &var.licenses, result);

        for key in var.extra.keys() {
            result.add_warning(&format!("{}: unknown key '{}'", path, key));
        }
    }

    fn validate_origin(path: &str, origin: &Origin, result: &mut ValidationResult) {
        if origin.producer.is_none() {
            result.add_warning(&format!("{}: missing `producer`", path));
        }
        if origin.title.is_none() {
            result.add_warning(&format!("{}: missing `title`", path));
        }
        if let Some(license) = &origin.license {
            Self::validate_licenses(path, std::slice::from_ref(license), result);
        }
    }

    fn validate_licenses(path: &str, licenses: &[License], result: &mut ValidationResult) {
        for license in licenses {
            if license.name.is_none() && license.url.is_none() {
                result.add_error(&format!("{}: license needs a `name` or a `url`", path));
            }
        }
    }
}

/// Values rendered by a template engine before use
fn is_templated(value: &str) -> bool {
    value.contains("<%") || value.contains("{") || value.contains("<<")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> ValidationResult {
        MetadataValidator::validate(&MetadataFile::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_valid_metadata() {
        let result = validate(
            r#"
dataset:
  title: Population
  licenses:
    - name: CC BY 4.0
tables:
  population:
    variables:
      population:
        title: Population
        unit: people
        short_unit: ""
        processing_level: major
        display:
          numDecimalPlaces: 0
        presentation:
          grapher_config:
            hasMapTab: true
        origins:
          - producer: UN
            title: World Population Prospects
"#,
        );

        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(!result.has_warnings(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let result = MetadataValidator::validate(&MetadataFile::default());
        assert!(!result.is_valid());
    }

    #[test]
    fn test_variable_errors() {
        let result = validate(
            r#"
tables:
  t:
    title: T
    variables:
      v:
        title: V
        processing_level: medium
        display:
          numDecimalPlaces: -1
        presentation:
          grapher_config:
            hasMapTab: "yes"
        licenses:
          - {}
"#,
        );

        assert_eq!(result.errors.len(), 5, "errors: {:?}", result.errors);
        assert!(result.errors.iter().any(|e| e.contains("missing `unit`")));
        assert!(result.errors.iter().any(|e| e.contains("processing_level")));
        assert!(result.errors.iter().any(|e| e.contains("numDecimalPlaces")));
        assert!(result.errors.iter().any(|e| e.contains("hasMapTab")));
        assert!(result.errors.iter().any(|e| e.contains("license needs")));
        assert!(result.errors[0].starts_with("tables.t.variables.v:"));
    }

    #[test]
    fn test_variable_warnings() {
        let long = "x".repeat(MAX_DESCRIPTION_SHORT_LEN + 1);
        let yaml = format!(
            r#"
dataset:
  title: D
  colour: blue
tables:
  t:
    variables:
      v:
        unit: tonnes of CO2 equivalent
        short_unit: tCO2eq per capita
        description_short: "{}"
        origins:
          - title: Something
"#,
            long
        );
        let result = validate(&yaml);

        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.contains("missing `title`")));
        assert!(result.warnings.iter().any(|w| w.contains("short_unit")));
        assert!(result.warnings.iter().any(|w| w.contains("description_short")));
        assert!(result.warnings.iter().any(|w| w.contains("missing `producer`")));
        assert!(result.warnings.iter().any(|w| w.contains("unknown key 'colour'")));
    }

    #[test]
    fn test_templated_processing_level_accepted() {
        let result = validate(
            r#"
tables:
  t:
    variables:
      v:
        title: V
        unit: ""
        processing_level: <% if major %>major<% else %>minor<% endif %>
"#,
        );
        assert!(result.is_valid(), "errors: {:?}", result.errors);
    }

    #[test]
    fn test_trailing_whitespace_in_short_description() {
        let result = validate(
            "tables:\n  t:\n    variables:\n      v:\n        title: V\n        unit: ''\n        description_short: \"Ends with a space \"\n",
        );
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("trailing whitespace")));
    }
}
