use crate::error::{AppError, Result};
use crate::gather::{GatheredFile, assemble_stream, render_layout_from_paths};
use log;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Directory selector for folder partitioning: one fixed depth, or every
/// ancestor directory that holds accepted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderDepth {
    Depth(usize),
    All,
}

impl FromStr for FolderDepth {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(FolderDepth::All);
        }
        s.parse::<usize>().map(FolderDepth::Depth).map_err(|_| {
            AppError::InvalidArgument(format!(
                "Invalid folder depth '{}'. Use a non-negative integer or 'all'.",
                s
            ))
        })
    }
}

/// One aggregated output scoped to a single directory. `dir` is "." for the
/// project root.
#[derive(Debug, Clone)]
pub struct FolderOutputUnit {
    pub dir: String,
    pub content: String,
    pub output_filename: String,
}

/// Groups the already-gathered files into one output unit per selected
/// directory. Zero matching directories is a soft warning, not an error.
pub fn partition_by_folder(
    files: &[GatheredFile],
    depth: FolderDepth,
    output_filename: &str,
    include_layout: bool,
) -> Vec<FolderOutputUnit> {
    let dirs = select_directories(files, depth);
    if dirs.is_empty() {
        log::warn!("No directories matched folder depth {:?}", depth);
        return Vec::new();
    }
    if let FolderDepth::Depth(d) = depth {
        let shallow = files_above_depth(files, d);
        if !shallow.is_empty() {
            log::warn!(
                "{} file(s) lie above folder depth {} and belong to no output: {}",
                shallow.len(),
                d,
                shallow.join(", ")
            );
        }
    }

    let mut units = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let subset: Vec<&GatheredFile> = files
            .iter()
            .filter(|f| {
                dir == "." || f.rel_path.starts_with(&format!("{}/", dir))
            })
            .collect();
        if subset.is_empty() {
            continue;
        }

        let layout = if include_layout {
            let scoped_paths: Vec<String> = subset
                .iter()
                .map(|f| {
                    if dir == "." {
                        f.rel_path.clone()
                    } else {
                        f.rel_path[dir.len() + 1..].to_string()
                    }
                })
                .collect();
            let mut layout = format!("{}/\n", dir);
            layout.push_str(&render_layout_from_paths(&scoped_paths));
            Some(layout)
        } else {
            None
        };

        let blocks: Vec<GatheredFile> = subset.into_iter().cloned().collect();
        units.push(FolderOutputUnit {
            dir,
            content: assemble_stream(layout.as_deref(), &blocks),
            output_filename: output_filename.to_string(),
        });
    }
    units
}

/// The distinct target directories for a depth spec, sorted. `Depth(0)` is the
/// root alone; `Depth(d)` takes the directory prefix of length `d` of every
/// file deep enough to have one; `All` takes every ancestor, with the root
/// included when it has direct file children.
fn select_directories(files: &[GatheredFile], depth: FolderDepth) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();
    match depth {
        FolderDepth::Depth(0) => {
            if !files.is_empty() {
                dirs.insert(".".to_string());
            }
        }
        FolderDepth::Depth(d) => {
            for file in files {
                let parents: Vec<&str> = parent_components(&file.rel_path);
                if parents.len() >= d {
                    dirs.insert(parents[..d].join("/"));
                }
            }
        }
        FolderDepth::All => {
            for file in files {
                let parents = parent_components(&file.rel_path);
                if parents.is_empty() {
                    dirs.insert(".".to_string());
                }
                for end in 1..=parents.len() {
                    dirs.insert(parents[..end].join("/"));
                }
            }
        }
    }
    dirs
}

/// Files whose directory chain is shorter than `d`, i.e. files no `Depth(d)`
/// unit can claim.
fn files_above_depth(files: &[GatheredFile], d: usize) -> Vec<&str> {
    files
        .iter()
        .filter(|f| parent_components(&f.rel_path).len() < d)
        .map(|f| f.rel_path.as_str())
        .collect()
}

fn parent_components(rel_path: &str) -> Vec<&str> {
    let mut components: Vec<&str> = rel_path.split('/').filter(|c| !c.is_empty()).collect();
    components.pop(); // drop the file name
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str, body: &str) -> GatheredFile {
        let block = format!("// File: {}\n{}\n", rel, body);
        let size = block.len();
        GatheredFile {
            rel_path: rel.to_string(),
            block,
            size,
        }
    }

    fn fixture() -> Vec<GatheredFile> {
        vec![
            file("level1/level1.txt", "level one"),
            file("level1/level2/level2.txt", "level two"),
            file("root.txt", "root contents"),
        ]
    }

    #[test]
    fn depth_spec_parses() {
        assert_eq!(FolderDepth::from_str("all").unwrap(), FolderDepth::All);
        assert_eq!(FolderDepth::from_str("2").unwrap(), FolderDepth::Depth(2));
        assert!(FolderDepth::from_str("-1").is_err());
        assert!(FolderDepth::from_str("deep").is_err());
    }

    #[test]
    fn depth_zero_yields_single_root_unit() {
        let units = partition_by_folder(&fixture(), FolderDepth::Depth(0), "ctx.txt", true);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].dir, ".");
        assert!(units[0].content.contains("root contents"));
        assert!(units[0].content.contains("level two"));
        assert_eq!(units[0].output_filename, "ctx.txt");
    }

    #[test]
    fn depth_one_groups_by_first_segment() {
        let units = partition_by_folder(&fixture(), FolderDepth::Depth(1), "ctx.txt", false);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].dir, "level1");
        assert!(units[0].content.contains("level one"));
        assert!(units[0].content.contains("level two"));
        assert!(!units[0].content.contains("root contents"));
    }

    #[test]
    fn all_covers_every_ancestor_directory() {
        let units = partition_by_folder(&fixture(), FolderDepth::All, "ctx.txt", false);
        let dirs: Vec<&str> = units.iter().map(|u| u.dir.as_str()).collect();
        assert_eq!(dirs, vec![".", "level1", "level1/level2"]);
    }

    #[test]
    fn files_above_the_depth_are_reported_and_left_out() {
        assert_eq!(files_above_depth(&fixture(), 0), Vec::<&str>::new());
        assert_eq!(files_above_depth(&fixture(), 1), vec!["root.txt"]);
        assert_eq!(
            files_above_depth(&fixture(), 2),
            vec!["level1/level1.txt", "root.txt"]
        );

        let units = partition_by_folder(&fixture(), FolderDepth::Depth(2), "ctx.txt", false);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].dir, "level1/level2");
        assert!(!units[0].content.contains("root contents"));
        assert!(!units[0].content.contains("level one"));
    }

    #[test]
    fn unmatched_depth_is_soft_empty() {
        let units = partition_by_folder(&fixture(), FolderDepth::Depth(5), "ctx.txt", false);
        assert!(units.is_empty());
    }

    #[test]
    fn scoped_layout_is_relative_to_the_directory() {
        let units = partition_by_folder(&fixture(), FolderDepth::Depth(1), "ctx.txt", true);
        let content = &units[0].content;
        assert!(content.starts_with("level1/\n"));
        assert!(content.contains("├── level1.txt"));
        assert!(content.contains("└── level2/"));
    }
}
