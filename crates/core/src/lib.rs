mod apply;
mod config;
mod conflict;
mod export;
mod planner;
mod segments;
mod selection;
mod template;

pub use apply::{apply_plan, ApplyLogEntry, ApplyOutcome, ApplyResult, TEMP_PREFIX};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use conflict::{resolve_conflicts, ConflictPolicy};
pub use export::{export_plan, render_csv, render_json, ExportFormat};
pub use planner::{
    build_plan, generate_plan, PlanError, PlanItem, PlanOptions, PlanReason, RenamePlan,
    RenameStats, SortKey, SortOrder,
};
pub use segments::{anchored_regex, capture_named, split_extension, split_segments};
pub use selection::SelectionState;
pub use template::{
    apply_filters, parse_filters, render_template, Filter, Placeholder, Selector, Template,
    TemplatePart,
};
