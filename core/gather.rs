use crate::assemble::{self, AssembleOptions};
use crate::error::{AppError, Result};
use crate::ignore_rules::{DIR_IGNORE_SUFFIX, IgnoreRules, filter_pattern_lines};
use globset::{Glob, GlobMatcher};
use log;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_BYTES: usize = 512 * 1024;
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_LAYOUT_BYTES: usize = 64 * 1024;

pub const LAYOUT_TRUNCATED_MARKER: &str = "[layout truncated]";

#[derive(Debug, Clone)]
pub struct GatherLimits {
    pub max_file_bytes: usize,
    pub max_total_bytes: usize,
    pub max_layout_bytes: usize,
}

impl Default for GatherLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_layout_bytes: DEFAULT_MAX_LAYOUT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatherOptions {
    pub assemble: AssembleOptions,
    pub limits: GatherLimits,
}

/// One assembled content block, in traversal order.
#[derive(Debug, Clone)]
pub struct GatheredFile {
    pub rel_path: String,
    pub block: String,
    pub size: usize,
}

#[derive(Debug, Default)]
pub struct GatherOutcome {
    pub layout: String,
    pub files: Vec<GatheredFile>,
    pub total_bytes: usize,
    pub stopped_at_limit: bool,
    pub layout_truncated: bool,
}

/// Mutable accumulator threaded through the recursion so the global ceilings
/// are enforceable from any depth.
#[derive(Debug)]
struct WalkState {
    total_bytes: usize,
    stopped: bool,
    stop_warned: bool,
    layout: String,
    layout_done: bool,
}

impl WalkState {
    fn new() -> Self {
        Self {
            total_bytes: 0,
            stopped: false,
            stop_warned: false,
            layout: String::new(),
            layout_done: false,
        }
    }

    fn push_layout_line(&mut self, line: &str, max_layout_bytes: usize) {
        if self.layout_done {
            return;
        }
        if self.layout.len() + line.len() + 1 > max_layout_bytes {
            self.layout.push_str(LAYOUT_TRUNCATED_MARKER);
            self.layout.push('\n');
            self.layout_done = true;
            return;
        }
        self.layout.push_str(line);
        self.layout.push('\n');
    }
}

/// Walks `root` depth-first in lexicographic order, consulting the ignore
/// rules and the wildcard file pattern, and assembles one content block per
/// accepted file.
pub fn gather(
    root: &Path,
    file_pattern: &str,
    rules: &IgnoreRules,
    options: &GatherOptions,
) -> Result<GatherOutcome> {
    if !root.exists() {
        return Err(AppError::InvalidPath(format!(
            "invalid path: {}",
            root.display()
        )));
    }
    let matcher = compile_file_pattern(file_pattern)?;
    let limits = options.limits.clone();
    let mut state = WalkState::new();
    let mut files = Vec::<GatheredFile>::new();

    if root.is_file() {
        // An explicitly named file bypasses the pattern and ignore checks.
        let rel = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        if accept_file(root, &rel, options, &limits, &mut state, &mut files) {
            state.push_layout_line(&rel, limits.max_layout_bytes);
        }
    } else {
        if let Some(name) = root.file_name().map(|n| n.to_string_lossy()) {
            state.push_layout_line(&format!("{}/", name), limits.max_layout_bytes);
        }
        walk_dir(
            root,
            Path::new(""),
            "",
            rules,
            matcher.as_ref(),
            options,
            &limits,
            &mut state,
            &mut files,
        )?;
    }

    Ok(GatherOutcome {
        layout: state.layout,
        total_bytes: state.total_bytes,
        stopped_at_limit: state.stopped,
        layout_truncated: state.layout_done,
        files,
    })
}

/// Wildcard inclusion pattern, matched against the file name. `*` alone (or
/// an empty pattern) matches every file, including names without an
/// extension.
fn compile_file_pattern(pattern: &str) -> Result<Option<GlobMatcher>> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok(None);
    }
    let glob = Glob::new(trimmed).map_err(|e| {
        AppError::Glob(format!("Invalid file pattern \"{}\": {}", trimmed, e))
    })?;
    Ok(Some(glob.compile_matcher()))
}

#[derive(Debug)]
struct DirEntryInfo {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

#[allow(clippy::too_many_arguments)]
fn walk_dir(
    dir: &Path,
    rel_prefix: &Path,
    layout_prefix: &str,
    rules: &IgnoreRules,
    matcher: Option<&GlobMatcher>,
    options: &GatherOptions,
    limits: &GatherLimits,
    state: &mut WalkState,
    files: &mut Vec<GatheredFile>,
) -> Result<()> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            log::warn!("Cannot read directory '{}': {}", dir.display(), e);
            return Ok(());
        }
    };

    let mut entries = Vec::<DirEntryInfo>::new();
    for entry_result in read {
        match entry_result {
            Ok(entry) => {
                let path = entry.path();
                let is_dir = match entry.file_type() {
                    Ok(ft) => ft.is_dir(),
                    Err(e) => {
                        log::warn!("Cannot stat '{}': {}", path.display(), e);
                        continue;
                    }
                };
                entries.push(DirEntryInfo {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path,
                    is_dir,
                });
            }
            Err(e) => log::warn!("Error listing '{}': {}", dir.display(), e),
        }
    }
    // Lexicographic order keeps the walk, layout and running totals
    // deterministic.
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    // Per-directory *.ignore files extend the rules for this subtree,
    // re-evaluated at each recursion level.
    let extra_lines = collect_dir_ignore_lines(&entries);
    let extended;
    let active_rules = if extra_lines.is_empty() {
        rules
    } else {
        extended = rules.with_dir_patterns(&extra_lines)?;
        &extended
    };

    let visible: Vec<&DirEntryInfo> = entries
        .iter()
        .filter(|e| {
            let rel = rel_prefix.join(&e.name);
            if active_rules.is_ignored(&rel, e.is_dir) {
                log::trace!("Ignored: {}", rel.display());
                return false;
            }
            if !e.is_dir && e.name.ends_with(DIR_IGNORE_SUFFIX) {
                // Rule carriers are consumed above, never emitted as content.
                return false;
            }
            e.is_dir || matcher.is_none_or(|m| m.is_match(&e.name))
        })
        .collect();

    // A file's layout line is deferred until the next sibling emits one, so
    // its connector reflects acceptance, not position: a trailing run of
    // skipped files cannot leave the branch open on "├── ". Directories keep
    // their positional connector (they always emit).
    let count = visible.len();
    let mut deferred_file: Option<&str> = None;
    for (idx, entry) in visible.into_iter().enumerate() {
        let rel = rel_prefix.join(&entry.name);
        let rel_str = rel.to_string_lossy().into_owned();

        if entry.is_dir {
            if let Some(name) = deferred_file.take() {
                state.push_layout_line(
                    &format!("{}├── {}", layout_prefix, name),
                    limits.max_layout_bytes,
                );
            }
            let is_last = idx + 1 == count;
            let connector = if is_last { "└── " } else { "├── " };
            state.push_layout_line(
                &format!("{}{}{}/", layout_prefix, connector, entry.name),
                limits.max_layout_bytes,
            );
            let child_prefix = format!(
                "{}{}",
                layout_prefix,
                if is_last { "    " } else { "│   " }
            );
            walk_dir(
                &entry.path,
                &rel,
                &child_prefix,
                active_rules,
                matcher,
                options,
                limits,
                state,
                files,
            )?;
        } else if accept_file(&entry.path, &rel_str, options, limits, state, files) {
            if let Some(name) = deferred_file.take() {
                state.push_layout_line(
                    &format!("{}├── {}", layout_prefix, name),
                    limits.max_layout_bytes,
                );
            }
            deferred_file = Some(entry.name.as_str());
        }
    }
    if let Some(name) = deferred_file {
        state.push_layout_line(
            &format!("{}└── {}", layout_prefix, name),
            limits.max_layout_bytes,
        );
    }
    Ok(())
}

/// Reads one candidate file, assembles its block and charges it against the
/// shared ceilings. Skips are warnings, never errors. Returns whether the
/// file was taken.
fn accept_file(
    path: &Path,
    rel_str: &str,
    options: &GatherOptions,
    limits: &GatherLimits,
    state: &mut WalkState,
    files: &mut Vec<GatheredFile>,
) -> bool {
    if state.stopped {
        return false;
    }
    match fs::metadata(path) {
        Ok(meta) if meta.len() as usize > limits.max_file_bytes => {
            log::warn!(
                "Skipping '{}': {} bytes exceeds the per-file limit of {} bytes",
                rel_str,
                meta.len(),
                limits.max_file_bytes
            );
            return false;
        }
        Ok(_) => {}
        Err(e) => {
            log::warn!("Cannot stat '{}': {}", rel_str, e);
            return false;
        }
    }
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Cannot read '{}': {}", rel_str, e);
            return false;
        }
    };
    let Some(block) = assemble::assemble(rel_str, &bytes, &options.assemble) else {
        return false;
    };

    let size = block.len();
    if state.total_bytes + size > limits.max_total_bytes {
        state.stopped = true;
        if !state.stop_warned {
            state.stop_warned = true;
            log::warn!(
                "Total size limit of {} bytes reached at '{}'; no further files will be included",
                limits.max_total_bytes,
                rel_str
            );
        }
        return false;
    }

    state.total_bytes += size;
    files.push(GatheredFile {
        rel_path: rel_str.to_string(),
        block,
        size,
    });
    true
}

fn collect_dir_ignore_lines(entries: &[DirEntryInfo]) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        if entry.is_dir
            || !entry.name.ends_with(DIR_IGNORE_SUFFIX)
            || entry.name == DIR_IGNORE_SUFFIX
        {
            continue;
        }
        match fs::read_to_string(&entry.path) {
            Ok(content) => {
                let file_lines = filter_pattern_lines(&content);
                log::debug!(
                    "Applying {} patterns from '{}'",
                    file_lines.len(),
                    entry.path.display()
                );
                lines.extend(file_lines);
            }
            Err(e) => log::warn!("Cannot read '{}': {}", entry.path.display(), e),
        }
    }
    lines
}

/// Joins the layout and the assembled blocks into the single logical stream.
/// Blocks end with a newline, so a `\n` separator yields a blank line between
/// them (a paragraph boundary the chunker can split on).
pub fn assemble_stream(layout: Option<&str>, files: &[GatheredFile]) -> String {
    let mut parts = Vec::<&str>::new();
    if let Some(layout) = layout {
        if !layout.is_empty() {
            parts.push(layout);
        }
    }
    for file in files {
        parts.push(&file.block);
    }
    parts.join("\n")
}

/// Renders the same ASCII layout from an already-known set of relative paths.
/// Used by the folder partitioner for per-directory scoped layouts.
pub fn render_layout_from_paths(rel_paths: &[String]) -> String {
    #[derive(Default)]
    struct Node {
        children: BTreeMap<String, Node>,
        is_file: bool,
    }

    let mut root = Node::default();
    for rel in rel_paths {
        let mut cursor = &mut root;
        let components: Vec<&str> = rel.split('/').filter(|c| !c.is_empty()).collect();
        for (idx, comp) in components.iter().enumerate() {
            cursor = cursor.children.entry(comp.to_string()).or_default();
            if idx + 1 == components.len() {
                cursor.is_file = true;
            }
        }
    }

    fn render(node: &Node, prefix: &str, out: &mut String) {
        let count = node.children.len();
        for (idx, (name, child)) in node.children.iter().enumerate() {
            let is_last = idx + 1 == count;
            let connector = if is_last { "└── " } else { "├── " };
            let suffix = if child.is_file { "" } else { "/" };
            out.push_str(prefix);
            out.push_str(connector);
            out.push_str(name);
            out.push_str(suffix);
            out.push('\n');
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            render(child, &child_prefix, out);
        }
    }

    let mut out = String::new();
    render(&root, "", &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore_rules::IgnoreOptions;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("root.txt"), "root contents\n").unwrap();
        fs::create_dir_all(dir.path().join("level1/level2")).unwrap();
        fs::write(dir.path().join("level1/level1.txt"), "level one\n").unwrap();
        fs::write(
            dir.path().join("level1/level2/level2.txt"),
            "level two\n",
        )
        .unwrap();
        dir
    }

    fn no_rules(root: &Path) -> IgnoreRules {
        IgnoreRules::build(root, &IgnoreOptions::default()).unwrap()
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = gather(
            Path::new("/definitely/not/here"),
            "*",
            &no_rules(Path::new("/tmp")),
            &GatherOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidPath(_)));
    }

    #[test]
    fn walk_is_deterministic_and_sorted() {
        let dir = fixture();
        let rules = no_rules(dir.path());
        let outcome = gather(dir.path(), "*.txt", &rules, &GatherOptions::default()).unwrap();
        let paths: Vec<&str> = outcome.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["level1/level1.txt", "level1/level2/level2.txt", "root.txt"]
        );
        assert_eq!(
            outcome.total_bytes,
            outcome.files.iter().map(|f| f.size).sum::<usize>()
        );
    }

    #[test]
    fn layout_uses_branch_bookkeeping() {
        let dir = fixture();
        let rules = no_rules(dir.path());
        let outcome = gather(dir.path(), "*", &rules, &GatherOptions::default()).unwrap();
        let layout = &outcome.layout;
        assert!(layout.contains("├── level1/"));
        assert!(layout.contains("│   ├── level1.txt"));
        assert!(layout.contains("│   └── level2/"));
        assert!(layout.contains("│       └── level2.txt"));
        assert!(layout.contains("└── root.txt"));
    }

    #[test]
    fn skipped_trailing_file_still_closes_the_branch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "ok\n").unwrap();
        fs::write(dir.path().join("z.txt"), "x".repeat(4096)).unwrap();
        let rules = no_rules(dir.path());
        let options = GatherOptions {
            limits: GatherLimits {
                max_file_bytes: 1024,
                ..GatherLimits::default()
            },
            ..GatherOptions::default()
        };
        let outcome = gather(dir.path(), "*", &rules, &options).unwrap();
        assert!(outcome.layout.contains("└── a.txt"));
        assert!(!outcome.layout.contains("├── "));
        assert!(!outcome.layout.contains("z.txt"));
    }

    #[test]
    fn star_matches_extensionless_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Makefile"), "all:\n\ttrue\n").unwrap();
        let rules = no_rules(dir.path());
        let outcome = gather(dir.path(), "*", &rules, &GatherOptions::default()).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].rel_path, "Makefile");
    }

    #[test]
    fn pattern_filters_files_but_not_directories() {
        let dir = fixture();
        fs::write(dir.path().join("notes.md"), "# notes\n").unwrap();
        let rules = no_rules(dir.path());
        let outcome = gather(dir.path(), "*.txt", &rules, &GatherOptions::default()).unwrap();
        assert!(outcome.files.iter().all(|f| f.rel_path.ends_with(".txt")));
        assert!(!outcome.layout.contains("notes.md"));
        assert!(outcome.layout.contains("level2/"));
    }

    #[test]
    fn ignored_entries_are_excluded() {
        let dir = fixture();
        let options = IgnoreOptions {
            custom_patterns: Some("level1/".to_string()),
            ..IgnoreOptions::default()
        };
        let rules = IgnoreRules::build(dir.path(), &options).unwrap();
        let outcome = gather(dir.path(), "*", &rules, &GatherOptions::default()).unwrap();
        let paths: Vec<&str> = outcome.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["root.txt"]);
        assert!(!outcome.layout.contains("level1"));
    }

    #[test]
    fn per_directory_ignore_file_is_additive() {
        let dir = fixture();
        fs::write(dir.path().join("level1/local.ignore"), "level2/\n").unwrap();
        let rules = no_rules(dir.path());
        let outcome = gather(dir.path(), "*.txt", &rules, &GatherOptions::default()).unwrap();
        let paths: Vec<&str> = outcome.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["level1/level1.txt", "root.txt"]);
    }

    #[test]
    fn per_file_ceiling_skips_large_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(4096)).unwrap();
        fs::write(dir.path().join("small.txt"), "ok\n").unwrap();
        let rules = no_rules(dir.path());
        let options = GatherOptions {
            limits: GatherLimits {
                max_file_bytes: 1024,
                ..GatherLimits::default()
            },
            ..GatherOptions::default()
        };
        let outcome = gather(dir.path(), "*", &rules, &options).unwrap();
        let paths: Vec<&str> = outcome.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["small.txt"]);
    }

    #[test]
    fn total_ceiling_soft_stops_but_keeps_accepted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), "y".repeat(200)).unwrap();
        }
        let rules = no_rules(dir.path());
        let options = GatherOptions {
            limits: GatherLimits {
                max_total_bytes: 500,
                ..GatherLimits::default()
            },
            ..GatherOptions::default()
        };
        let outcome = gather(dir.path(), "*", &rules, &options).unwrap();
        assert!(outcome.stopped_at_limit);
        assert!(!outcome.files.is_empty());
        assert!(outcome.total_bytes <= 500);
    }

    #[test]
    fn layout_ceiling_is_independent_of_content() {
        let dir = fixture();
        let rules = no_rules(dir.path());
        let options = GatherOptions {
            limits: GatherLimits {
                max_layout_bytes: 24,
                ..GatherLimits::default()
            },
            ..GatherOptions::default()
        };
        let outcome = gather(dir.path(), "*.txt", &rules, &options).unwrap();
        assert!(outcome.layout_truncated);
        assert!(outcome.layout.contains(LAYOUT_TRUNCATED_MARKER));
        // Content gathering keeps going.
        assert_eq!(outcome.files.len(), 3);
    }

    #[test]
    fn single_file_root_is_accepted_directly() {
        let dir = fixture();
        let file = dir.path().join("root.txt");
        let rules = no_rules(dir.path());
        let outcome = gather(&file, "*.md", &rules, &GatherOptions::default()).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].rel_path, "root.txt");
    }

    #[test]
    fn rendered_layout_matches_path_structure() {
        let paths = vec![
            "a/one.txt".to_string(),
            "a/two.txt".to_string(),
            "b.txt".to_string(),
        ];
        let layout = render_layout_from_paths(&paths);
        assert_eq!(
            layout,
            "├── a/\n│   ├── one.txt\n│   └── two.txt\n└── b.txt\n"
        );
    }

    #[test]
    fn stream_concatenates_layout_and_blocks() {
        let files = vec![
            GatheredFile {
                rel_path: "a.txt".into(),
                block: "// File: a.txt\nA\n".into(),
                size: 17,
            },
            GatheredFile {
                rel_path: "b.txt".into(),
                block: "// File: b.txt\nB\n".into(),
                size: 17,
            },
        ];
        let stream = assemble_stream(Some("└── a.txt\n"), &files);
        assert!(stream.starts_with("└── a.txt\n\n// File: a.txt"));
        assert!(stream.contains("A\n\n// File: b.txt"));
    }
}
