use crate::cli_args::GenerateArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use log;
use std::path::PathBuf;
use ctxpack_core::{
    self as core, AppError, Config, FolderDepth, GatherOptions, TruncateStrategy,
};

pub fn handle_generate_command(args: GenerateArgs, quiet: bool, _verbose: u8) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config, Some(&args))
        .context("Failed to load configuration")?;

    // Surface bad split/budget arguments before walking the tree.
    let plan = OutputPlan::from_config(&config, &args)?;

    let rules = core::IgnoreRules::build(&project_root, &config.ignore_options())
        .context("Failed to build ignore rules")?;
    log::debug!("Ignore rules compiled ({} patterns).", rules.pattern_count());

    let gather_options = GatherOptions {
        assemble: core::AssembleOptions {
            strip_comments: config.content.strip_comments,
            aggressive_whitespace: config.content.compress_whitespace,
        },
        limits: config.gather_limits(),
    };
    let outcome = core::gather(&project_root, &config.content.pattern, &rules, &gather_options)
        .context("Failed to gather project files")?;
    log::info!(
        "Gathered {} file(s), {} content bytes.",
        outcome.files.len(),
        outcome.total_bytes
    );
    if outcome.files.is_empty() {
        log::warn!("No files matched the current pattern and ignore rules.");
    }

    let layout = plan.include_layout.then_some(outcome.layout.as_str());

    match plan.mode {
        OutputMode::Folders { depth, rechunk } => {
            let units = core::partition_by_folder(
                &outcome.files,
                depth,
                &plan.folder_filename,
                plan.include_layout,
            );
            if units.is_empty() {
                log::warn!("Folder split produced no output files.");
                return Ok(());
            }
            output::save_folder_units(&units, &plan.save_dir, rechunk, quiet)?;
        }
        OutputMode::Chunks { max_bytes } => {
            let stream = finalize_stream(layout, &outcome.files, &plan)?;
            let chunks = core::split_text_into_chunks(&stream, max_bytes)
                .context("Failed to split output into chunks")?;
            if chunks.is_empty() {
                log::warn!("Nothing to write: the assembled output is empty.");
                return Ok(());
            }
            output::save_chunk_files(
                &chunks,
                &plan.save_dir,
                &plan.filename_base,
                &plan.extension,
                quiet,
            )?;
        }
        OutputMode::Single => {
            let stream = finalize_stream(layout, &outcome.files, &plan)?;
            if plan.save_requested {
                let path = plan
                    .save_dir
                    .join(format!("{}.{}", plan.filename_base, plan.extension));
                output::save_single_artifact(&path, &stream, quiet)?;
            } else {
                output::write_to_stdout(&stream)?;
            }
        }
    }
    Ok(())
}

fn finalize_stream(
    layout: Option<&str>,
    files: &[core::GatheredFile],
    plan: &OutputPlan,
) -> Result<String> {
    let stream = core::assemble_stream(layout, files);
    match plan.budget {
        Some((max_tokens, strategy)) => {
            let estimated = core::estimate_tokens(&stream);
            log::info!(
                "Applying token budget {} (estimated {} tokens, strategy {:?}).",
                max_tokens,
                estimated,
                strategy
            );
            core::truncate_to_budget(&stream, max_tokens, strategy)
                .context("Failed to truncate output to the token budget")
        }
        None => Ok(stream),
    }
}

#[derive(Debug)]
enum OutputMode {
    Single,
    Chunks {
        max_bytes: usize,
    },
    Folders {
        depth: FolderDepth,
        /// Size limit applied per unit after partitioning; units over it are
        /// written as numbered chunk siblings.
        rechunk: Option<usize>,
    },
}

/// Everything about where the output goes, resolved up front so argument
/// errors surface before any filesystem work.
#[derive(Debug)]
struct OutputPlan {
    mode: OutputMode,
    budget: Option<(usize, TruncateStrategy)>,
    include_layout: bool,
    save_requested: bool,
    save_dir: PathBuf,
    filename_base: String,
    extension: String,
    folder_filename: String,
}

impl OutputPlan {
    fn from_config(config: &Config, args: &GenerateArgs) -> Result<Self> {
        let mode = match (&config.split.folder_depth, &config.split.chunk_size) {
            (Some(depth_str), chunk) => {
                let depth = depth_str.parse::<FolderDepth>()?;
                let rechunk = chunk
                    .as_deref()
                    .map(core::parse_chunk_size)
                    .transpose()?;
                OutputMode::Folders { depth, rechunk }
            }
            (None, Some(size_str)) => {
                let max_bytes = core::parse_chunk_size(size_str)?;
                OutputMode::Chunks { max_bytes }
            }
            (None, None) => OutputMode::Single,
        };

        // Folder and chunk modes always write files, so --stdout is a usage error.
        if args.output.stdout && !matches!(mode, OutputMode::Single) {
            return Err(AppError::InvalidArgument(
                "--stdout cannot be combined with --chunk-size or --folder-depth".to_string(),
            )
            .into());
        }

        let budget = match config.budget.max_tokens {
            Some(max_tokens) => {
                let strategy = config.budget.strategy.parse::<TruncateStrategy>()?;
                Some((max_tokens, strategy))
            }
            None => None,
        };
        if budget.is_some() && matches!(mode, OutputMode::Folders { .. }) {
            log::warn!("Folder split is active; the token budget is ignored.");
        }

        let save_requested = args.output.save.is_some();
        let save_dir = resolve_save_dir(config, args.output.save.as_ref());
        let filename_base = config
            .save
            .filename_base
            .clone()
            .or_else(|| config.general.project_name.clone())
            .unwrap_or_else(|| "context".to_string());
        let extension = config.save_extension().to_string();
        let folder_filename = match &config.split.output_filename {
            Some(name) => name.clone(),
            None if matches!(mode, OutputMode::Folders { .. }) => {
                return Err(AppError::InvalidArgument(
                    "Folder output requires --output-filename (split.output_filename)"
                        .to_string(),
                )
                .into());
            }
            None => String::new(),
        };

        Ok(Self {
            mode,
            budget,
            include_layout: config.output.include_layout,
            save_requested,
            save_dir,
            filename_base,
            extension,
            folder_filename,
        })
    }
}

fn resolve_save_dir(config: &Config, save_arg: Option<&Option<PathBuf>>) -> PathBuf {
    match save_arg {
        Some(Some(dir)) => dir.clone(),
        _ => config.save.output_dir.clone(),
    }
}
