use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::trigger::IntervalUnit;

#[derive(Default, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LeadAssignConfig {
    pub project: ProjectConfig,
    pub assignment: AssignmentConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub pool_path: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Max leads fetched and assigned per internal batch.
    pub bundle_size: u32,
    /// Default days of the period a run covers when `--work-days` is absent.
    pub work_days: u32,
    /// Capacity period length in days.
    pub period_days: u32,
    /// Rolling lookback window for duplicate matching.
    pub dedup_window_days: u32,
    /// Restrict duplicate matching to leads in the same company scope.
    pub same_company_only: bool,
    /// Enables watch mode (periodic automatic runs).
    pub auto: bool,
    pub interval_number: u32,
    pub interval_unit: IntervalUnit,
    /// One-shot override for when the next automatic run fires, as a quoted
    /// RFC 3339 timestamp (e.g. `"2026-09-01T08:00:00Z"`). Later runs fall
    /// back to the interval cadence.
    pub next_run: Option<DateTime<Utc>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            pool_path: "LEADS.yaml".to_string(),
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            bundle_size: 5,
            work_days: 2,
            period_days: 30,
            dedup_window_days: 30,
            same_company_only: false,
            auto: false,
            interval_number: 1,
            interval_unit: IntervalUnit::Days,
            next_run: None,
        }
    }
}

pub fn validate(config: &LeadAssignConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.assignment.bundle_size < 1 {
        errors.push("assignment.bundle_size must be >= 1".to_string());
    }

    if config.assignment.period_days < 1 {
        errors.push("assignment.period_days must be >= 1".to_string());
    }

    if config.assignment.work_days > config.assignment.period_days {
        errors.push(format!(
            "assignment.work_days ({}) must not exceed assignment.period_days ({})",
            config.assignment.work_days, config.assignment.period_days
        ));
    }

    if config.assignment.interval_number < 1 {
        errors.push("assignment.interval_number must be >= 1".to_string());
    }

    if config.project.pool_path.trim().is_empty() {
        errors.push("project.pool_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Load configuration from `{root}/lead-assign.toml`, falling back to
/// defaults when the file is absent.
pub fn load_config(project_root: &Path) -> Result<LeadAssignConfig, String> {
    let config_path = project_root.join("lead-assign.toml");

    if !config_path.exists() {
        return Ok(LeadAssignConfig::default());
    }

    load_config_file(&config_path)
}

/// Load configuration from an explicit file path.
pub fn load_config_file(config_path: &Path) -> Result<LeadAssignConfig, String> {
    let contents = std::fs::read_to_string(config_path)
        .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;

    let config: LeadAssignConfig = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", config_path.display(), e))?;

    validate(&config).map_err(|errors| {
        format!(
            "Config validation failed:\n{}",
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;

    Ok(config)
}
