use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use flexrename_core::{
    app_paths, apply_plan, export_plan, generate_plan, load_config, save_config, AppConfig,
    ConflictPolicy, PlanOptions, RenamePlan, SortKey, SortOrder,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "flexrename")]
#[command(version)]
#[command(about = "Batch-rename files by splitting names into segments and filling a template")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Preview (and with --apply, perform) a batch rename
    Rename(RenameArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Write the built-in defaults to the config file if none exists
    Init,
}

#[derive(Debug, Args)]
struct RenameArgs {
    /// Target directory
    #[arg(default_value = ".")]
    path: PathBuf,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    /// Literal segment delimiter (not a regex)
    #[arg(long)]
    delimiter: Option<String>,
    /// Regex with named groups, matched at the start of the stem
    #[arg(long)]
    regex: Option<String>,
    /// Output template; the original extension is appended unless it contains {ext}
    #[arg(long)]
    template: Option<String>,
    /// Joiner for slice placeholders such as {3+}; defaults to the delimiter
    #[arg(long)]
    slice_joiner: Option<String>,
    #[arg(long, num_args = 0..)]
    include: Vec<String>,
    #[arg(long, num_args = 0..)]
    exclude: Vec<String>,
    /// Extension allow-list, e.g. .jpg .png .tar.gz
    #[arg(long, num_args = 0..)]
    exts: Vec<String>,
    #[arg(long, value_enum)]
    conflict: Option<ConflictArg>,
    #[arg(long)]
    suffix_sep: Option<String>,
    #[arg(long, value_enum)]
    sort_key: Option<SortKeyArg>,
    #[arg(long, value_enum)]
    sort_order: Option<SortOrderArg>,
    #[arg(long, allow_negative_numbers = true)]
    seq_start: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    seq_step: Option<i64>,
    #[arg(long)]
    seq_pad: Option<usize>,
    /// Maximum number of plan items to show and export (0 = no limit)
    #[arg(long, default_value_t = 0)]
    preview_limit: usize,
    /// Perform the renames; without it only the plan is shown
    #[arg(long, default_value_t = false)]
    apply: bool,
    /// Write the plan to a .csv or .json file
    #[arg(long)]
    export_plan: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictArg {
    Skip,
    Suffix,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortKeyArg {
    Name,
    Mtime,
    Ctime,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortOrderArg {
    Asc,
    Desc,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::Skip => ConflictPolicy::Skip,
            ConflictArg::Suffix => ConflictPolicy::Suffix,
        }
    }
}

impl From<SortKeyArg> for SortKey {
    fn from(value: SortKeyArg) -> Self {
        match value {
            SortKeyArg::Name => SortKey::Name,
            SortKeyArg::Mtime => SortKey::Mtime,
            SortKeyArg::Ctime => SortKey::Ctime,
        }
    }
}

impl From<SortOrderArg> for SortOrder {
    fn from(value: SortOrderArg) -> Self {
        match value {
            SortOrderArg::Asc => SortOrder::Asc,
            SortOrderArg::Desc => SortOrder::Desc,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli);

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init => cmd_config_init(),
        },
    }
}

fn setup_logging(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(filter)
        .init();
}

fn plan_options(args: &RenameArgs, config: &AppConfig) -> PlanOptions {
    let base = config.plan_options();
    let delimiter = args.delimiter.clone().unwrap_or(base.delimiter);
    // An explicit delimiter also becomes the slice joiner unless one is given.
    let slice_joiner = match (&args.slice_joiner, &args.delimiter) {
        (Some(joiner), _) => joiner.clone(),
        (None, Some(delimiter)) => delimiter.clone(),
        (None, None) => base.slice_joiner,
    };

    PlanOptions {
        delimiter,
        regex: args.regex.clone().filter(|r| !r.is_empty()),
        recursive: args.recursive || base.recursive,
        include: args.include.clone(),
        exclude: args.exclude.clone(),
        exts: args.exts.clone(),
        template: args.template.clone().unwrap_or(base.template),
        slice_joiner,
        conflict: args.conflict.map(Into::into).unwrap_or(base.conflict),
        suffix_sep: args.suffix_sep.clone().unwrap_or(base.suffix_sep),
        sort_key: args.sort_key.map(Into::into).unwrap_or(base.sort_key),
        sort_order: args.sort_order.map(Into::into).unwrap_or(base.sort_order),
        seq_start: args.seq_start.unwrap_or(base.seq_start),
        seq_step: args.seq_step.unwrap_or(base.seq_step),
        seq_pad: args.seq_pad.unwrap_or(base.seq_pad),
        preview_limit: args.preview_limit,
    }
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let options = plan_options(&args, &config);
    let root = args.path.canonicalize().unwrap_or_else(|_| args.path.clone());

    let plan = generate_plan(&root, &options)?;
    if plan.items.is_empty() {
        println!("No files to process.");
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => print_table(&plan),
    }

    if let Some(target) = &args.export_plan {
        export_plan(&plan.items, target)?;
        info!("plan exported to {}", target.display());
    }

    if !args.apply {
        eprintln!("Dry run: no files were renamed. Pass --apply to rename.");
        return Ok(());
    }

    let result = apply_plan(&plan.changed_items());
    println!("\nResult:");
    for entry in &result.log {
        println!("{entry}");
    }
    println!(
        "\napplied {}, skipped/failed {}",
        result.applied, result.skipped
    );
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() {
        println!("config already exists: {}", paths.config_path.display());
        return Ok(());
    }
    save_config(&AppConfig::default())?;
    println!("wrote {}", paths.config_path.display());
    Ok(())
}

fn print_table(plan: &RenamePlan) {
    println!("Plan:");
    for item in &plan.items {
        let mark = if item.changed { "->" } else { "  " };
        println!(
            "{}  {}  {}  ({})",
            display_relative(&plan.root, &item.src),
            mark,
            display_relative(&plan.root, &item.dst),
            item.reason
        );
    }

    println!(
        "\n{} items, {} will change (scanned={} filtered={} temp_skipped={})",
        plan.stats.planned,
        plan.stats.changed,
        plan.stats.scanned_files,
        plan.stats.filtered_out,
        plan.stats.skipped_temp
    );
}

fn display_relative(root: &std::path::Path, path: &std::path::Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
