use crate::planner::PlanItem;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of every quarantined file name. The planner never picks up files
/// carrying it.
pub const TEMP_PREFIX: &str = "__tmp_rename__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyOutcome {
    Renamed,
    Unchanged,
    TargetExists,
    DuplicateTarget,
    StageFailed,
    CommitFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyLogEntry {
    pub outcome: ApplyOutcome,
    pub src: PathBuf,
    pub dst: PathBuf,
    /// Temporary name the file was left under, when a commit failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parked: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl fmt::Display for ApplyLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let src = display_name(&self.src);
        let dst = display_name(&self.dst);
        match self.outcome {
            ApplyOutcome::Renamed => write!(f, "[done] {src} -> {dst}"),
            ApplyOutcome::Unchanged => write!(f, "[skip] no change: {src}"),
            ApplyOutcome::TargetExists => write!(f, "[skip] target exists: {src} -> {dst}"),
            ApplyOutcome::DuplicateTarget => {
                write!(f, "[skip] target claimed by an earlier item: {src} -> {dst}")
            }
            ApplyOutcome::StageFailed => write!(
                f,
                "[fail] {src} -> {dst} (phase 1): {}",
                self.detail.as_deref().unwrap_or_default()
            ),
            ApplyOutcome::CommitFailed => {
                let parked = self
                    .parked
                    .as_deref()
                    .map(display_name)
                    .unwrap_or_default();
                write!(
                    f,
                    "[fail] {parked} -> {dst} (phase 2): {}",
                    self.detail.as_deref().unwrap_or_default()
                )
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyResult {
    pub applied: usize,
    /// Skipped in phase 1 or failed in either phase.
    pub skipped: usize,
    pub log: Vec<ApplyLogEntry>,
}

#[derive(Debug, Clone)]
struct StagedRename {
    original_path: PathBuf,
    target_path: PathBuf,
    temp_path: PathBuf,
}

/// Applies the changed items through a two-phase rename.
///
/// Phase 1 moves every eligible source to a temporary sibling whose name
/// carries a per-run random tag. Phase 2 moves each temporary file to its
/// destination. Because no destination is written until every source has
/// left its name, swaps and longer rename cycles go through without
/// clobbering anything. Errors are recorded per item and never abort the
/// run; nothing is rolled back.
pub fn apply_plan(items: &[PlanItem]) -> ApplyResult {
    let tag = temp_tag();
    let mut result = ApplyResult::default();
    let verdicts = quarantine_verdicts(items);

    let mut staged = Vec::<StagedRename>::new();
    for (item, verdict) in items.iter().zip(verdicts) {
        if let Some(outcome) = verdict {
            warn!(
                "skipping {} -> {}: {:?}",
                item.src.display(),
                item.dst.display(),
                outcome
            );
            result.skipped += 1;
            result.log.push(ApplyLogEntry {
                outcome,
                src: item.src.clone(),
                dst: item.dst.clone(),
                parked: None,
                detail: None,
            });
            continue;
        }

        let entry = StagedRename {
            original_path: item.src.clone(),
            target_path: item.dst.clone(),
            temp_path: temp_path_for(&item.src, &tag),
        };
        match fs::rename(&entry.original_path, &entry.temp_path) {
            Ok(()) => {
                debug!(
                    "staged {} as {}",
                    entry.original_path.display(),
                    entry.temp_path.display()
                );
                staged.push(entry);
            }
            Err(err) => {
                warn!(
                    "phase 1 rename failed for {}: {err}",
                    entry.original_path.display()
                );
                result.skipped += 1;
                result.log.push(ApplyLogEntry {
                    outcome: ApplyOutcome::StageFailed,
                    src: entry.original_path,
                    dst: entry.target_path,
                    parked: None,
                    detail: Some(err.to_string()),
                });
            }
        }
    }

    for entry in staged {
        match commit(&entry) {
            Ok(()) => {
                result.applied += 1;
                result.log.push(ApplyLogEntry {
                    outcome: ApplyOutcome::Renamed,
                    src: entry.original_path,
                    dst: entry.target_path,
                    parked: None,
                    detail: None,
                });
            }
            Err(detail) => {
                warn!(
                    "phase 2 rename failed, file left at {}: {detail}",
                    entry.temp_path.display()
                );
                result.skipped += 1;
                result.log.push(ApplyLogEntry {
                    outcome: ApplyOutcome::CommitFailed,
                    src: entry.original_path,
                    dst: entry.target_path,
                    parked: Some(entry.temp_path),
                    detail: Some(detail),
                });
            }
        }
    }

    info!(
        "apply finished: {} renamed, {} skipped or failed",
        result.applied, result.skipped
    );
    result
}

/// Decides up front which items may enter quarantine. `None` means stage it.
///
/// A destination that is occupied by the source of another staged item
/// counts as free since that source leaves in phase 1. Skipping one item can
/// take such a source out of the batch, so the check repeats until stable.
fn quarantine_verdicts(items: &[PlanItem]) -> Vec<Option<ApplyOutcome>> {
    let mut verdicts: Vec<Option<ApplyOutcome>> = Vec::with_capacity(items.len());
    let mut claimed = HashSet::<&Path>::new();
    for item in items {
        let verdict = if !item.changed {
            Some(ApplyOutcome::Unchanged)
        } else if !claimed.insert(item.dst.as_path()) {
            Some(ApplyOutcome::DuplicateTarget)
        } else {
            None
        };
        verdicts.push(verdict);
    }

    let occupied: HashMap<usize, bool> = items
        .iter()
        .enumerate()
        .filter(|(idx, _)| verdicts[*idx].is_none())
        .map(|(idx, item)| (idx, path_occupied(&item.dst)))
        .collect();

    loop {
        let leaving: HashSet<&Path> = items
            .iter()
            .zip(&verdicts)
            .filter(|(_, verdict)| verdict.is_none())
            .map(|(item, _)| item.src.as_path())
            .collect();

        let blocked: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(idx, item)| {
                verdicts[*idx].is_none()
                    && occupied.get(idx).copied().unwrap_or(false)
                    && !leaving.contains(item.dst.as_path())
            })
            .map(|(idx, _)| idx)
            .collect();

        if blocked.is_empty() {
            return verdicts;
        }
        for idx in blocked {
            verdicts[idx] = Some(ApplyOutcome::TargetExists);
        }
    }
}

fn commit(entry: &StagedRename) -> Result<(), String> {
    if let Some(parent) = entry.target_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("cannot create {}: {err}", parent.display()))?;
    }
    // A source that failed to leave in phase 1 still holds this name.
    if path_occupied(&entry.target_path) {
        return Err("target is still occupied".to_string());
    }
    fs::rename(&entry.temp_path, &entry.target_path).map_err(|err| err.to_string())
}

fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn temp_tag() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{TEMP_PREFIX}{}__", &token[..8])
}

fn temp_path_for(original_path: &Path, tag: &str) -> PathBuf {
    let parent = original_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = original_path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    parent.join(format!("{tag}{file_name}"))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanReason;
    use tempfile::tempdir;

    fn rename_item(src: &Path, dst: &Path) -> PlanItem {
        PlanItem {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            changed: src != dst,
            reason: PlanReason::Ok,
        }
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).expect("read file")
    }

    fn leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .expect("read dir")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count()
    }

    #[test]
    fn swap_goes_through_temporary_names() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("A.txt");
        let b = temp.path().join("B.txt");
        fs::write(&a, "content of A").expect("write A");
        fs::write(&b, "content of B").expect("write B");

        let result = apply_plan(&[rename_item(&a, &b), rename_item(&b, &a)]);

        assert_eq!(result.applied, 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(read(&b), "content of A");
        assert_eq!(read(&a), "content of B");
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn planned_segment_swap_applies_cleanly() {
        use crate::planner::{generate_plan, PlanOptions};

        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("left-right.txt"), "first").expect("write first");
        fs::write(temp.path().join("right-left.txt"), "second").expect("write second");
        let options = PlanOptions {
            template: "{2}-{1}".to_string(),
            ..PlanOptions::default()
        };

        let plan = generate_plan(temp.path(), &options).expect("plan");
        let result = apply_plan(&plan.changed_items());

        assert_eq!(result.applied, 2);
        assert_eq!(read(&temp.path().join("right-left.txt")), "first");
        assert_eq!(read(&temp.path().join("left-right.txt")), "second");

        let again = generate_plan(temp.path(), &PlanOptions::default()).expect("plan");
        assert!(again.items.iter().all(|item| !item.changed));
    }

    #[test]
    fn three_way_rotation_keeps_every_file() {
        let temp = tempdir().expect("tempdir");
        let paths: Vec<PathBuf> = ["1", "2", "3"]
            .iter()
            .map(|n| temp.path().join(format!("{n}.dat")))
            .collect();
        for (idx, path) in paths.iter().enumerate() {
            fs::write(path, format!("file{idx}")).expect("write");
        }

        let items = vec![
            rename_item(&paths[0], &paths[1]),
            rename_item(&paths[1], &paths[2]),
            rename_item(&paths[2], &paths[0]),
        ];
        let result = apply_plan(&items);

        assert_eq!(result.applied, 3);
        assert_eq!(read(&paths[1]), "file0");
        assert_eq!(read(&paths[2]), "file1");
        assert_eq!(read(&paths[0]), "file2");
    }

    #[test]
    fn existing_unrelated_target_is_skipped() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("new.txt");
        let taken = temp.path().join("taken.txt");
        fs::write(&src, "new").expect("write src");
        fs::write(&taken, "old").expect("write taken");

        let result = apply_plan(&[rename_item(&src, &taken)]);

        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.log[0].outcome, ApplyOutcome::TargetExists);
        assert_eq!(read(&src), "new");
        assert_eq!(read(&taken), "old");
    }

    #[test]
    fn chain_behind_a_blocked_item_is_skipped_too() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let c = temp.path().join("c");
        fs::write(&a, "a").expect("write a");
        fs::write(&b, "b").expect("write b");
        fs::write(&c, "c").expect("write c");

        // b cannot move onto the unrelated c, so a must not move onto b.
        let result = apply_plan(&[rename_item(&a, &b), rename_item(&b, &c)]);

        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped, 2);
        assert_eq!(read(&a), "a");
        assert_eq!(read(&b), "b");
        assert_eq!(read(&c), "c");
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn second_claim_on_same_target_is_skipped() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        let target = temp.path().join("same.txt");
        fs::write(&a, "a").expect("write a");
        fs::write(&b, "b").expect("write b");

        let result = apply_plan(&[rename_item(&a, &target), rename_item(&b, &target)]);

        assert_eq!(result.applied, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.log[0].outcome, ApplyOutcome::DuplicateTarget);
        assert_eq!(read(&target), "a");
        assert_eq!(read(&b), "b");
    }

    #[test]
    fn unchanged_items_are_logged_and_counted() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a.txt");
        fs::write(&a, "a").expect("write a");

        let result = apply_plan(&[rename_item(&a, &a)]);

        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.log[0].to_string(), "[skip] no change: a.txt");
    }

    #[test]
    fn commit_creates_missing_parent_directories() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("clip.mp4");
        let dst = temp.path().join("2024").join("clip.mp4");
        fs::write(&src, "clip").expect("write src");

        let result = apply_plan(&[rename_item(&src, &dst)]);

        assert_eq!(result.applied, 1);
        assert_eq!(read(&dst), "clip");
        assert!(!src.exists());
        assert_eq!(result.log[0].to_string(), "[done] clip.mp4 -> clip.mp4");
    }

    #[test]
    fn failed_commit_leaves_file_parked() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("doc.txt");
        let blocker = temp.path().join("blocker");
        fs::write(&src, "doc").expect("write src");
        fs::write(&blocker, "not a directory").expect("write blocker");

        let result = apply_plan(&[rename_item(&src, &blocker.join("doc.txt"))]);

        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped, 1);
        let entry = &result.log[0];
        assert_eq!(entry.outcome, ApplyOutcome::CommitFailed);
        let parked = entry.parked.as_ref().expect("parked path");
        assert_eq!(read(parked), "doc");
        assert!(!src.exists());
        assert_eq!(leftovers(temp.path()), 1);
    }

    #[test]
    fn missing_source_fails_in_phase_one() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("ghost.txt");
        let dst = temp.path().join("real.txt");

        let result = apply_plan(&[rename_item(&src, &dst)]);

        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.log[0].outcome, ApplyOutcome::StageFailed);
        assert!(result.log[0]
            .to_string()
            .starts_with("[fail] ghost.txt -> real.txt (phase 1)"));
    }

    #[test]
    fn temp_tag_is_prefixed_and_unique() {
        let a = temp_tag();
        let b = temp_tag();
        assert!(a.starts_with(TEMP_PREFIX));
        assert_eq!(a.len(), TEMP_PREFIX.len() + 8 + 2);
        assert_ne!(a, b);
    }
}
