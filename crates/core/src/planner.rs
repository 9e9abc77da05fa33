use crate::apply::TEMP_PREFIX;
use crate::conflict::{resolve_conflicts, ConflictPolicy};
use crate::segments::{anchored_regex, capture_named, split_extension, split_segments};
use crate::template::{zero_pad, Template};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use glob_match::glob_match;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Mtime,
    Ctime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub delimiter: String,
    pub regex: Option<String>,
    pub recursive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub exts: Vec<String>,
    pub template: String,
    pub slice_joiner: String,
    pub conflict: ConflictPolicy,
    pub suffix_sep: String,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub seq_start: i64,
    pub seq_step: i64,
    pub seq_pad: usize,
    /// Caps the number of returned items; 0 keeps everything.
    pub preview_limit: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            delimiter: "-".to_string(),
            regex: None,
            recursive: false,
            include: Vec::new(),
            exclude: Vec::new(),
            exts: Vec::new(),
            template: "{stem}".to_string(),
            slice_joiner: "-".to_string(),
            conflict: ConflictPolicy::Skip,
            suffix_sep: "_".to_string(),
            sort_key: SortKey::Name,
            sort_order: SortOrder::Asc,
            seq_start: 1,
            seq_step: 1,
            seq_pad: 4,
            preview_limit: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanReason {
    Ok,
    NoChange,
    DedupSuffix,
}

impl PlanReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanReason::Ok => "ok",
            PlanReason::NoChange => "no-change",
            PlanReason::DedupSuffix => "dedup-suffix",
        }
    }
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub changed: bool,
    pub reason: PlanReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub skipped_temp: usize,
    pub filtered_out: usize,
    pub planned: usize,
    pub changed: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub template: String,
    pub items: Vec<PlanItem>,
    pub stats: RenameStats,
}

impl RenamePlan {
    pub fn changed_items(&self) -> Vec<PlanItem> {
        self.items.iter().filter(|item| item.changed).cloned().collect()
    }

    fn refresh_counts(&mut self) {
        self.stats.planned = self.items.len();
        self.stats.changed = self.items.iter().filter(|item| item.changed).count();
        self.stats.unchanged = self.stats.planned - self.stats.changed;
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("path does not exist or is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),
    #[error("invalid regex `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("template renders an unusable file name `{rendered}` for {}", .src.display())]
    InvalidDestination { src: PathBuf, rendered: String },
}

/// Scans `root`, renders every surviving file and resolves destination
/// collisions according to `options.conflict`.
pub fn generate_plan(root: &Path, options: &PlanOptions) -> Result<RenamePlan> {
    let mut plan = build_plan(root, options)?;
    plan.items = resolve_conflicts(plan.items, options.conflict, &options.suffix_sep);
    plan.refresh_counts();
    info!(
        "plan ready: {} items, {} changed",
        plan.stats.planned, plan.stats.changed
    );
    Ok(plan)
}

/// Builds the raw plan without conflict resolution.
pub fn build_plan(root: &Path, options: &PlanOptions) -> Result<RenamePlan> {
    if !root.is_dir() {
        return Err(PlanError::InvalidRoot(root.to_path_buf()).into());
    }

    let regex = match options.regex.as_deref().filter(|p| !p.is_empty()) {
        Some(pattern) => Some(anchored_regex(pattern).map_err(|err| PlanError::InvalidRegex {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?),
        None => None,
    };
    let template = Template::parse(&options.template);

    let mut stats = RenameStats::default();
    let mut files = Vec::new();
    for path in collect_files(root, options.recursive)? {
        stats.scanned_files += 1;
        let name = file_name_of(&path);
        if name.starts_with(TEMP_PREFIX) {
            stats.skipped_temp += 1;
            continue;
        }
        if !should_take(root, &path, &name, options) {
            stats.filtered_out += 1;
            continue;
        }
        files.push(ScannedFile::read(path, name)?);
    }
    sort_files(&mut files, options.sort_key, options.sort_order);

    let mut items = Vec::with_capacity(files.len());
    let mut seq = options.seq_start;
    for file in files {
        let (stem, ext) = split_extension(&file.name);
        let segments = split_segments(stem, &options.delimiter);

        let mut vars = HashMap::<String, String>::new();
        vars.insert("stem".to_string(), stem.to_string());
        vars.insert("ext".to_string(), ext.to_string());
        vars.insert("name".to_string(), file.name.clone());
        vars.insert("seq".to_string(), zero_pad(&seq.to_string(), options.seq_pad));
        vars.insert("seq_raw".to_string(), seq.to_string());
        vars.insert("mtime".to_string(), iso_seconds(file.modified));
        vars.insert("ctime".to_string(), iso_seconds(file.status_changed));
        seq = seq.saturating_add(options.seq_step);
        if let Some(regex) = &regex {
            vars.extend(capture_named(regex, stem));
        }

        let rendered = template.render(&vars, &segments, &options.slice_joiner);
        let new_name = if template.mentions_extension() {
            rendered
        } else {
            format!("{rendered}{ext}")
        };
        if !is_usable_name(&new_name) {
            return Err(PlanError::InvalidDestination {
                src: file.path,
                rendered: new_name,
            }
            .into());
        }

        let parent = file
            .path
            .parent()
            .with_context(|| format!("no parent directory: {}", file.path.display()))?;
        let dst = parent.join(&new_name);
        let changed = dst != file.path;
        debug!("{} -> {} (changed: {})", file.name, new_name, changed);
        items.push(PlanItem {
            src: file.path,
            dst,
            changed,
            reason: if changed {
                PlanReason::Ok
            } else {
                PlanReason::NoChange
            },
        });
    }

    if options.preview_limit > 0 {
        items.truncate(options.preview_limit);
    }

    let mut plan = RenamePlan {
        root: root.to_path_buf(),
        template: options.template.clone(),
        items,
        stats,
    };
    plan.refresh_counts();
    Ok(plan)
}

struct ScannedFile {
    path: PathBuf,
    name: String,
    sort_name: String,
    modified: SystemTime,
    status_changed: SystemTime,
}

impl ScannedFile {
    fn read(path: PathBuf, name: String) -> Result<Self> {
        let meta = fs::metadata(&path)
            .with_context(|| format!("failed to read metadata: {}", path.display()))?;
        let modified = meta
            .modified()
            .with_context(|| format!("modification time unavailable: {}", path.display()))?;
        Ok(Self {
            sort_name: name.to_lowercase(),
            status_changed: status_changed(&meta),
            path,
            name,
            modified,
        })
    }
}

fn collect_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    if recursive {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.with_context(|| format!("failed to walk: {}", root.display()))?;
            if entry.file_type().is_file() {
                out.push(entry.into_path());
            }
        }
    } else {
        for entry in fs::read_dir(root)
            .with_context(|| format!("failed to read directory: {}", root.display()))?
        {
            let entry = entry.with_context(|| format!("failed to read entry: {}", root.display()))?;
            let path = entry.path();
            if path.is_file() {
                out.push(path);
            }
        }
    }

    Ok(out)
}

fn should_take(root: &Path, path: &Path, name: &str, options: &PlanOptions) -> bool {
    if !options.exts.is_empty() {
        let lower = name.to_lowercase();
        let allowed = options.exts.iter().any(|ext| {
            let ext = ext.trim().to_lowercase();
            if ext.starts_with('.') {
                lower.ends_with(&ext)
            } else {
                lower.ends_with(&format!(".{ext}"))
            }
        });
        if !allowed {
            return false;
        }
    }

    if !options.include.is_empty()
        && !options
            .include
            .iter()
            .any(|pattern| glob_matches(pattern, root, path))
    {
        return false;
    }
    !options
        .exclude
        .iter()
        .any(|pattern| glob_matches(pattern, root, path))
}

/// Matches from the right: a pattern with k components is tested against the
/// last k components of the full path, so directories above the root count
/// too. Patterns using `**` are tried against the relative and the full path.
fn glob_matches(pattern: &str, root: &Path, path: &Path) -> bool {
    let components = normal_components(path);
    if pattern.contains("**") {
        let relative = normal_components(path.strip_prefix(root).unwrap_or(path));
        return glob_match(pattern, &relative.join("/"))
            || glob_match(pattern, &components.join("/"));
    }
    let depth = pattern.split('/').filter(|part| !part.is_empty()).count().max(1);
    if depth > components.len() {
        return false;
    }
    let tail = components[components.len() - depth..].join("/");
    glob_match(pattern.trim_start_matches('/'), &tail)
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn sort_files(files: &mut [ScannedFile], key: SortKey, order: SortOrder) {
    files.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => Ordering::Equal,
            SortKey::Mtime => a.modified.cmp(&b.modified),
            SortKey::Ctime => a.status_changed.cmp(&b.status_changed),
        };
        let ordering = primary
            .then_with(|| a.sort_name.cmp(&b.sort_name))
            .then_with(|| a.path.cmp(&b.path));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn is_usable_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.ends_with(['/', '\\'])
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn iso_seconds(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

#[cfg(unix)]
fn status_changed(meta: &fs::Metadata) -> SystemTime {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    let secs = u64::try_from(meta.ctime()).unwrap_or(0);
    let nanos = u32::try_from(meta.ctime_nsec()).unwrap_or(0);
    UNIX_EPOCH + Duration::new(secs, nanos)
}

#[cfg(not(unix))]
fn status_changed(meta: &fs::Metadata) -> SystemTime {
    meta.created()
        .or_else(|_| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
