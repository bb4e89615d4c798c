use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify the target project directory (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .ctxpack.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "disable_config_file",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub disable_config_file: bool,

    #[arg(
        long,
        help = "Specify the project name (overrides config/dir name).",
        value_name = "NAME",
        help_heading = "Project Setup"
    )]
    pub project_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct IgnoreOpts {
    #[arg(
        long,
        help = "Do not read .gitignore files.",
        conflicts_with = "enable_gitignore",
        help_heading = "Ignore Rules"
    )]
    pub disable_gitignore: bool,

    #[arg(
        long,
        help = "Read .gitignore files [default].",
        conflicts_with = "disable_gitignore",
        help_heading = "Ignore Rules"
    )]
    pub enable_gitignore: bool,

    #[arg(
        long,
        help = "Do not apply the built-in default ignore patterns.",
        conflicts_with = "enable_builtin_ignore",
        help_heading = "Ignore Rules"
    )]
    pub disable_builtin_ignore: bool,

    #[arg(
        long,
        help = "Apply the built-in default ignore patterns [default].",
        conflicts_with = "disable_builtin_ignore",
        help_heading = "Ignore Rules"
    )]
    pub enable_builtin_ignore: bool,

    #[arg(
        long,
        help = "Extra ignore patterns, comma-separated (e.g. '*.log,tmp/').",
        value_name = "PATTERNS",
        help_heading = "Ignore Rules"
    )]
    pub ignore_pattern: Option<String>,

    #[arg(
        long,
        help = "Extra ignore file to read patterns from (repeatable).",
        value_name = "FILE",
        help_heading = "Ignore Rules"
    )]
    pub ignore_file: Vec<PathBuf>,

    #[arg(
        long,
        help = "Replace the built-in defaults with patterns from this file.",
        value_name = "FILE",
        help_heading = "Ignore Rules"
    )]
    pub default_ignore_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContentOpts {
    #[arg(
        short = 'p',
        long,
        help = "Only include files whose name matches this wildcard (e.g. '*.rs').",
        value_name = "PATTERN",
        help_heading = "Content"
    )]
    pub pattern: Option<String>,

    #[arg(
        long,
        help = "Strip comments from file content using per-extension syntax.",
        help_heading = "Content"
    )]
    pub strip_comments: bool,

    #[arg(
        long,
        help = "Aggressively compress whitespace (all runs become one space).",
        help_heading = "Content"
    )]
    pub compress: bool,

    #[arg(
        long,
        help = "Skip individual files larger than this many KiB.",
        value_name = "KB",
        help_heading = "Content"
    )]
    pub max_file_kb: Option<usize>,

    #[arg(
        long,
        help = "Stop adding content once the total exceeds this many KiB.",
        value_name = "KB",
        help_heading = "Content"
    )]
    pub max_total_kb: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BudgetOpts {
    #[arg(
        long,
        help = "Truncate the final text to roughly this many tokens.",
        value_name = "TOKENS",
        help_heading = "Token Budget"
    )]
    pub max_tokens: Option<usize>,

    #[arg(
        long,
        help = "Where to cut when over budget.",
        value_name = "STRATEGY",
        value_parser = ["start", "end", "middle"],
        help_heading = "Token Budget"
    )]
    pub truncate: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SplitOpts {
    #[arg(
        short = 'c',
        long,
        help = "Split the output into files of at most this size (e.g. '64KB', '1MB').",
        value_name = "SIZE_STRING",
        conflicts_with = "folder_depth",
        help_heading = "Splitting"
    )]
    pub chunk_size: Option<String>,

    #[arg(
        long,
        help = "Emit one output file per directory at this depth (integer or 'all').",
        value_name = "DEPTH",
        help_heading = "Splitting"
    )]
    pub folder_depth: Option<String>,

    #[arg(
        long,
        help = "Filename used inside each folder output directory.",
        value_name = "NAME",
        help_heading = "Splitting"
    )]
    pub output_filename: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputOpts {
    #[arg(
        long,
        help = "Force output to standard output.",
        conflicts_with = "save",
        help_heading = "Output Control"
    )]
    pub stdout: bool,

    #[arg(
        short = 's', long, value_name = "SAVE_DIR",
        num_args = 0..=1,
        help_heading = "Output Control",
        help = "Save output. Optional SAVE_DIR overrides config/default logic.",
    )]
    pub save: Option<Option<PathBuf>>,

    #[arg(
        long,
        help = "Do not prepend the directory layout tree.",
        help_heading = "Output Control"
    )]
    pub no_layout: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Aggregate a project tree into flat text for token-limited AI models.",
    long_about = "ctxpack walks a project directory, filters it through layered ignore rules, \nand flattens the surviving files into a single annotated text stream. \nThe stream can be truncated to a token budget or split into size-bounded \nor per-folder output files.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  ctxpack generate -p '*.rs' --save ./out\n  ctxpack generate --max-tokens 4000 --truncate middle\n  ctxpack generate -c 64KB -s\n  ctxpack show ignore-defaults -f json",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Gather, assemble and emit the project text."
    )]
    Generate(GenerateArgs),

    #[command(visible_alias = "s", about = "Show built-in data (ignore defaults).")]
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub ignore: IgnoreOpts,
    #[clap(flatten)]
    pub content: ContentOpts,
    #[clap(flatten)]
    pub budget: BudgetOpts,
    #[clap(flatten)]
    pub split: SplitOpts,
    #[clap(flatten)]
    pub output: OutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(subcommand)]
    pub item: ShowItem,

    #[arg(short = 'f', long, help = "Output format.", value_name = "FORMAT", value_parser = ["text", "json"], global = true)]
    pub format: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ShowItem {
    #[command(about = "List the built-in default ignore patterns.")]
    IgnoreDefaults {},
}
