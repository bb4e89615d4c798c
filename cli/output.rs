use anyhow::{Context, Result, anyhow};
use colored::*;
use ctxpack_core::{FolderOutputUnit, TextChunk, split_text_into_chunks};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

pub fn save_single_artifact(path: &Path, content: &str, quiet: bool) -> Result<()> {
    write_to_file(path, content)?;
    if !quiet {
        println!(
            "{} Output saved to: {}",
            "✅".green(),
            path.display().to_string().blue()
        );
    }
    Ok(())
}

/// Writes one numbered file per chunk as `<base>.<n>.<ext>`, starting at 1.
pub fn save_chunk_files(
    chunks: &[TextChunk],
    save_dir: &Path,
    filename_base: &str,
    extension: &str,
    quiet: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let chunk_path = save_dir.join(format!("{}.{}.{}", filename_base, index + 1, extension));
        write_to_file(&chunk_path, &chunk.text)?;
        if !quiet {
            println!(
                "{} Chunk saved to: {}",
                "📦".blue(),
                chunk_path.display().to_string().dimmed()
            );
        }
        written.push(chunk_path);
    }
    if !quiet && !written.is_empty() {
        println!(
            "{} Wrote {} chunk file(s) to: {}",
            "✅".green(),
            written.len(),
            save_dir.display().to_string().blue()
        );
    }
    Ok(written)
}

/// Writes one file per folder unit as `<save_dir>/<unit dir>/<output filename>`.
/// A unit larger than `rechunk` is split and written as numbered chunk
/// siblings instead. A single failed directory is a warning; the batch fails
/// only when nothing could be written at all.
pub fn save_folder_units(
    units: &[FolderOutputUnit],
    save_dir: &Path,
    rechunk: Option<usize>,
    quiet: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(units.len());
    let mut failures = 0usize;
    for unit in units {
        let unit_dir = if unit.dir == "." {
            save_dir.to_path_buf()
        } else {
            save_dir.join(&unit.dir)
        };
        match save_one_folder_unit(unit, &unit_dir, rechunk, quiet) {
            Ok(paths) => written.extend(paths),
            Err(e) => {
                failures += 1;
                log::warn!(
                    "Skipping folder output under {}: {:#}",
                    unit_dir.display(),
                    e
                );
            }
        }
    }
    if written.is_empty() && failures > 0 {
        return Err(anyhow!(
            "Failed to write any of the {} folder output file(s) under {}",
            failures,
            save_dir.display()
        ));
    }
    if !quiet && !written.is_empty() {
        println!(
            "{} Wrote {} folder output file(s) for {} of {} directories under: {}",
            "✅".green(),
            written.len(),
            units.len() - failures,
            units.len(),
            save_dir.display().to_string().blue()
        );
    }
    Ok(written)
}

fn save_one_folder_unit(
    unit: &FolderOutputUnit,
    unit_dir: &Path,
    rechunk: Option<usize>,
    quiet: bool,
) -> Result<Vec<PathBuf>> {
    if let Some(max_bytes) = rechunk {
        if unit.content.len() > max_bytes {
            let chunks = split_text_into_chunks(&unit.content, max_bytes).with_context(|| {
                format!("Failed to split folder output for '{}'", unit.dir)
            })?;
            let name = Path::new(&unit.output_filename);
            let stem = name
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| unit.output_filename.clone());
            let extension = name
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "txt".to_string());
            return save_chunk_files(&chunks, unit_dir, &stem, &extension, quiet);
        }
    }
    let unit_path = unit_dir.join(&unit.output_filename);
    write_to_file(&unit_path, &unit.content)?;
    if !quiet {
        println!(
            "{} Folder output saved to: {}",
            "📁".blue(),
            unit_path.display().to_string().dimmed()
        );
    }
    Ok(vec![unit_path])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dir: &str) -> FolderOutputUnit {
        FolderOutputUnit {
            dir: dir.to_string(),
            content: format!("// File: {}/x.txt\ncontents\n", dir),
            output_filename: "ctx.txt".to_string(),
        }
    }

    #[test]
    fn folder_batch_survives_a_failed_directory() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the unit needs a directory makes that unit fail.
        fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let units = vec![unit("blocked"), unit("ok")];

        let written = save_folder_units(&units, dir.path(), None, true).unwrap();
        assert_eq!(written, vec![dir.path().join("ok").join("ctx.txt")]);
        assert!(dir.path().join("ok/ctx.txt").exists());
    }

    #[test]
    fn folder_batch_with_no_successes_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let units = vec![unit("blocked")];
        assert!(save_folder_units(&units, dir.path(), None, true).is_err());
    }

    #[test]
    fn oversized_folder_unit_is_written_as_chunk_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let big = FolderOutputUnit {
            dir: ".".to_string(),
            content: "First paragraph here.\n\nSecond paragraph there.".to_string(),
            output_filename: "ctx.txt".to_string(),
        };
        let written = save_folder_units(&[big], dir.path(), Some(24), true).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("ctx.1.txt"), dir.path().join("ctx.2.txt")]
        );
    }
}
