use crate::planner::{PlanItem, PlanReason};
use crate::segments::split_extension;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave collisions in the plan; the executor skips occupied targets.
    #[default]
    Skip,
    /// Disambiguate with `<stem><sep><n><ext>`.
    Suffix,
}

pub fn resolve_conflicts(
    items: Vec<PlanItem>,
    policy: ConflictPolicy,
    suffix_sep: &str,
) -> Vec<PlanItem> {
    match policy {
        ConflictPolicy::Skip => items,
        ConflictPolicy::Suffix => dedupe_with_suffix(items, suffix_sep),
    }
}

fn dedupe_with_suffix(items: Vec<PlanItem>, suffix_sep: &str) -> Vec<PlanItem> {
    // Unchanged files keep their names, so they occupy those names up front.
    let mut claimed: HashSet<String> = items
        .iter()
        .filter(|item| !item.changed)
        .map(|item| claim_key(&item.dst))
        .collect();

    let mut out = Vec::with_capacity(items.len());
    for mut item in items {
        if !item.changed {
            out.push(item);
            continue;
        }

        let name = item
            .dst
            .file_name()
            .map(|v| v.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (stem, ext) = split_extension(&name);

        let mut candidate = item.dst.clone();
        let mut n = 0usize;
        while claimed.contains(&claim_key(&candidate)) {
            n += 1;
            candidate = item.dst.with_file_name(format!("{stem}{suffix_sep}{n}{ext}"));
        }
        claimed.insert(claim_key(&candidate));

        if n > 0 {
            debug!(
                "destination taken, using {} for {}",
                candidate.display(),
                item.src.display()
            );
            item.dst = candidate;
            item.changed = item.dst != item.src;
            item.reason = PlanReason::DedupSuffix;
        }
        out.push(item);
    }
    out
}

fn claim_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
