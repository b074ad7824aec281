use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the almanac binary.
#[derive(Debug, Parser)]
#[command(name = "almanac", version, about = "Inspect and maintain a flat-file blog content store")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ALMANAC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List entries newest first.
    Entries(EntriesArgs),
    /// Print one entry as JSON.
    Show(ShowArgs),
    /// List categories with entry counts.
    Categories(VisibilityArgs),
    /// List comments for one entry or the whole site.
    Comments(CommentsArgs),
    /// Regenerate the all-comments file from the per-day feedback files.
    Reindex,
    /// List the local dates that have entries.
    Days,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the content directory.
    #[arg(long = "content-dir", global = true, value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub content_dir: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        global = true,
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the site root used for permalinks.
    #[arg(long = "site-root-url", global = true, value_name = "URL")]
    pub site_root_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct VisibilityArgs {
    /// Include non-public items.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub admin: bool,
}

#[derive(Debug, Args, Clone)]
pub struct EntriesArgs {
    #[command(flatten)]
    pub visibility: VisibilityArgs,

    /// Maximum number of day files to inspect.
    #[arg(long, default_value_t = 10)]
    pub days: usize,

    /// Maximum number of titled entries to return.
    #[arg(long = "max", default_value_t = 50)]
    pub max_entries: usize,

    /// Only entries in this category (name or URL-safe name).
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,

    /// Only entries by this author.
    #[arg(long, value_name = "AUTHOR", conflicts_with = "category")]
    pub author: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Entry id or title.
    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub visibility: VisibilityArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CommentsArgs {
    /// Only comments on this entry.
    #[arg(long = "entry", value_name = "ID")]
    pub entry_id: Option<String>,

    /// Include comments awaiting moderation.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub all: bool,
}
