use crate::cli_args::{ShowArgs, ShowItem};
use crate::output::write_to_stdout;
use anyhow::{Context, Result};
use serde::Serialize;
use ctxpack_core::default_ignore_patterns;

#[derive(Serialize)]
struct IgnoreDefaultsOutput<'a> {
    patterns: &'a [String],
}

pub fn handle_show_command(args: ShowArgs, _quiet: bool) -> Result<()> {
    match &args.item {
        ShowItem::IgnoreDefaults {} => handle_show_ignore_defaults(args.format.as_deref()),
    }
}

fn handle_show_ignore_defaults(format: Option<&str>) -> Result<()> {
    let patterns = default_ignore_patterns();
    match format.unwrap_or("text") {
        "json" => {
            let wrapper = IgnoreDefaultsOutput { patterns };
            let content = serde_json::to_string_pretty(&wrapper)
                .context("Failed to serialize ignore defaults to JSON")?;
            write_to_stdout(&content)
        }
        _ => write_to_stdout(&patterns.join("\n")),
    }
}
