use crate::planner::PlanItem;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `.json` (any case) selects JSON; every other target gets CSV.
    pub fn for_path(path: &Path) -> Self {
        let is_json = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            ExportFormat::Json
        } else {
            ExportFormat::Csv
        }
    }
}

pub fn export_plan(items: &[PlanItem], path: &Path) -> Result<()> {
    let body = match ExportFormat::for_path(path) {
        ExportFormat::Json => render_json(items)?,
        ExportFormat::Csv => render_csv(items),
    };
    fs::write(path, body)
        .with_context(|| format!("failed to write plan export: {}", path.display()))?;
    Ok(())
}

pub fn render_json(items: &[PlanItem]) -> Result<String> {
    serde_json::to_string_pretty(items).context("failed to serialize plan")
}

/// Quoted CSV without escaping: a field containing `"` produces a malformed row.
pub fn render_csv(items: &[PlanItem]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push("src,dst,changed,reason".to_string());
    for item in items {
        lines.push(format!(
            "\"{}\",\"{}\",\"{}\",\"{}\"",
            item.src.display(),
            item.dst.display(),
            if item.changed { "True" } else { "False" },
            item.reason
        ));
    }
    lines.join("\n")
}
