use crate::planner::PlanItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Checkbox state for a displayed plan, including an in-progress paint drag.
///
/// Rows are plan indices. A paint drag starts on one row, flips it, and then
/// writes that same value to every further row the pointer passes over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    checked: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    drag: Option<PaintDrag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PaintDrag {
    value: bool,
    seen: BTreeSet<usize>,
}

impl SelectionState {
    /// Fresh selection for a re-scanned plan: every changed item, plus any
    /// item whose source file name was checked in `previous`.
    pub fn from_plan(
        items: &[PlanItem],
        previous: Option<(&SelectionState, &[PlanItem])>,
    ) -> Self {
        let kept_names: BTreeSet<String> = previous
            .map(|(state, old_items)| {
                state
                    .checked
                    .iter()
                    .filter_map(|idx| old_items.get(*idx))
                    .filter_map(|item| item.src.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        let checked = items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.changed
                    || item
                        .src
                        .file_name()
                        .map(|name| kept_names.contains(name.to_string_lossy().as_ref()))
                        .unwrap_or(false)
            })
            .map(|(idx, _)| idx)
            .collect();

        Self {
            checked,
            drag: None,
        }
    }

    pub fn is_checked(&self, row: usize) -> bool {
        self.checked.contains(&row)
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    pub fn set(&mut self, row: usize, value: bool) {
        if value {
            self.checked.insert(row);
        } else {
            self.checked.remove(&row);
        }
    }

    pub fn toggle(&mut self, row: usize) -> bool {
        let value = !self.is_checked(row);
        self.set(row, value);
        value
    }

    pub fn begin_paint(&mut self, row: usize) {
        let value = self.toggle(row);
        self.drag = Some(PaintDrag {
            value,
            seen: BTreeSet::from([row]),
        });
    }

    /// Paints `row` with the drag value, once per row per drag. Without an
    /// active drag this does nothing.
    pub fn paint_over(&mut self, row: usize) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        if !drag.seen.insert(row) {
            return;
        }
        let value = drag.value;
        self.set(row, value);
    }

    pub fn end_paint(&mut self) {
        self.drag = None;
    }

    pub fn is_painting(&self) -> bool {
        self.drag.is_some()
    }

    pub fn select_all(&mut self, rows: usize) {
        self.checked = (0..rows).collect();
    }

    pub fn select_none(&mut self) {
        self.checked.clear();
    }

    pub fn invert(&mut self, rows: usize) {
        self.checked = (0..rows).filter(|row| !self.checked.contains(row)).collect();
    }

    /// Checked rows that actually rename something, in plan order.
    pub fn selected_items(&self, items: &[PlanItem]) -> Vec<PlanItem> {
        self.checked
            .iter()
            .filter_map(|idx| items.get(*idx))
            .filter(|item| item.changed)
            .cloned()
            .collect()
    }
}
