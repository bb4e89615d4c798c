mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::process;

use cli_args::{Cli, Commands, GenerateArgs, ProjectConfigOpts};
use ctxpack_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;
    let verbose = cli_args.verbose;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet, verbose) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let core_err = e.downcast_ref::<ctxpack_core::AppError>();
            let exit_code = match core_err {
                Some(AppError::Config(_)) => 1,
                Some(AppError::TomlParse(_)) => 1,
                Some(AppError::TomlSerialize(_)) => 1,
                Some(AppError::Io(_)) => 2,
                Some(AppError::FileRead { .. }) => 2,
                Some(AppError::FileWrite { .. }) => 2,
                Some(AppError::DirCreation { .. }) => 2,
                Some(AppError::InvalidPath(_)) => 2,
                Some(AppError::Ignore(_)) => 2,
                Some(AppError::Glob(_)) => 2,
                Some(AppError::Chunking(_)) => 3,
                Some(AppError::Truncation(_)) => 3,
                Some(AppError::InvalidArgument(_)) => 5,
                Some(AppError::JsonSerialize(_)) => 6,
                Some(AppError::YamlError(_)) => 6,
                Some(_) => 1,
                None => 1,
            };

            // Only print error if not quiet, or if it's a critical config/usage error
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool, verbose: u8) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Generate(args) => {
                log::debug!("Executing 'generate' command...");
                commands::generate::handle_generate_command(args, quiet, verbose)?;
            }
            Commands::Show(args) => {
                log::debug!("Executing 'show' command...");
                commands::show::handle_show_command(args, quiet)?;
            }
        },
    }
    Ok(())
}

fn merge_config_with_cli_overrides(mut config: Config, args: &GenerateArgs) -> Config {
    log::trace!("Applying generate command CLI overrides to config...");

    if let Some(name) = &args.project_config.project_name {
        config.general.project_name = Some(name.clone());
    }

    // Ignore Toggle Overrides
    if args.ignore.disable_gitignore {
        config.general.use_gitignore = false;
    }
    if args.ignore.enable_gitignore {
        config.general.use_gitignore = true;
    }
    if args.ignore.disable_builtin_ignore {
        config.general.enable_builtin_ignore = false;
    }
    if args.ignore.enable_builtin_ignore {
        config.general.enable_builtin_ignore = true;
    }
    if let Some(patterns) = &args.ignore.ignore_pattern {
        config.ignore.patterns = Some(patterns.clone());
    }
    if !args.ignore.ignore_file.is_empty() {
        config.ignore.ignore_files = args.ignore.ignore_file.clone();
    }
    if let Some(override_file) = &args.ignore.default_ignore_file {
        config.ignore.default_override = Some(override_file.clone());
    }

    // Content Overrides
    if let Some(pattern) = &args.content.pattern {
        config.content.pattern = pattern.clone();
    }
    if args.content.strip_comments {
        config.content.strip_comments = true;
    }
    if args.content.compress {
        config.content.compress_whitespace = true;
    }
    if let Some(kb) = args.content.max_file_kb {
        config.content.max_file_kb = kb;
    }
    if let Some(kb) = args.content.max_total_kb {
        config.content.max_total_kb = kb;
    }

    // Budget Overrides
    if let Some(tokens) = args.budget.max_tokens {
        config.budget.max_tokens = Some(tokens);
    }
    if let Some(strategy) = &args.budget.truncate {
        config.budget.strategy = strategy.clone();
    }

    // Split Overrides
    if let Some(size) = &args.split.chunk_size {
        config.split.chunk_size = Some(size.clone());
        // Switching to pure chunking at the CLI retires a configured folder split.
        config.split.folder_depth = None;
    }
    if let Some(depth) = &args.split.folder_depth {
        config.split.folder_depth = Some(depth.clone());
    }
    if let Some(name) = &args.split.output_filename {
        config.split.output_filename = Some(name.clone());
    }

    // Output Overrides
    if args.output.no_layout {
        config.output.include_layout = false;
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    config
}

pub fn load_config_for_command(
    project_root: &std::path::Path,
    project_opts: &ProjectConfigOpts,
    generate_args: Option<&GenerateArgs>,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        project_root,
        project_opts.config_file.as_ref(),
        project_opts.disable_config_file,
    )
    .context("Failed to resolve configuration path")?;

    let mut config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(gen_args) = generate_args {
        config = merge_config_with_cli_overrides(config, gen_args);
    } else if let Some(name) = &project_opts.project_name {
        config.general.project_name = Some(name.clone());
    }

    // Ensure project name is set (fallback to directory name)
    config.general.project_name = Some(config.get_effective_project_name(project_root));

    Ok(config)
}
