use crate::conflict::ConflictPolicy;
use crate::planner::{PlanOptions, SortKey, SortOrder};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted defaults for the rename command. Missing keys fall back to the
/// built-in defaults, so a config file may list only what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub delimiter: String,
    pub template: String,
    /// Joiner for slice placeholders; the delimiter is used when unset.
    pub slice_joiner: Option<String>,
    pub recursive_default: bool,
    pub conflict: ConflictPolicy,
    pub suffix_sep: String,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub seq_start: i64,
    pub seq_step: i64,
    pub seq_pad: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let plan = PlanOptions::default();
        Self {
            delimiter: plan.delimiter,
            template: plan.template,
            slice_joiner: None,
            recursive_default: plan.recursive,
            conflict: plan.conflict,
            suffix_sep: plan.suffix_sep,
            sort_key: plan.sort_key,
            sort_order: plan.sort_order,
            seq_start: plan.seq_start,
            seq_step: plan.seq_step,
            seq_pad: plan.seq_pad,
        }
    }
}

impl AppConfig {
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            delimiter: self.delimiter.clone(),
            template: self.template.clone(),
            slice_joiner: self
                .slice_joiner
                .clone()
                .unwrap_or_else(|| self.delimiter.clone()),
            recursive: self.recursive_default,
            conflict: self.conflict,
            suffix_sep: self.suffix_sep.clone(),
            sort_key: self.sort_key,
            sort_order: self.sort_order,
            seq_start: self.seq_start,
            seq_step: self.seq_step,
            seq_pad: self.seq_pad,
            ..PlanOptions::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "flexrename", "flexrename")
        .context("could not resolve the OS config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&app_paths()?.config_path)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &app_paths()?.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}
