use crate::error::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const GITIGNORE_FILENAME: &str = ".gitignore";
pub const DIR_IGNORE_SUFFIX: &str = ".ignore";

#[derive(Debug, Deserialize)]
struct BuiltinIgnores {
    patterns: Vec<String>,
}

static BUILTIN_IGNORE_PATTERNS: Lazy<BuiltinIgnores> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/builtin_ignores.yaml"
    ));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/builtin_ignores.yaml")
});

/// The built-in default patterns, as shipped. Exposed for the
/// `show ignore-defaults` command.
pub fn default_ignore_patterns() -> &'static [String] {
    &BUILTIN_IGNORE_PATTERNS.patterns
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreOptions {
    pub use_gitignore: bool,
    pub use_defaults: bool,
    /// Extra ignore files whose patterns are appended after `.gitignore`.
    pub custom_ignore_files: Vec<PathBuf>,
    /// Inline comma-separated patterns, appended last (highest precedence).
    pub custom_patterns: Option<String>,
    /// Replaces (never merges with) the built-in defaults.
    pub default_override_file: Option<PathBuf>,
}

impl IgnoreOptions {
    pub fn with_defaults() -> Self {
        Self {
            use_gitignore: true,
            use_defaults: true,
            ..Self::default()
        }
    }
}

/// Layered exclusion rules with gitignore semantics: later patterns win,
/// `!pattern` re-includes.
#[derive(Debug)]
pub struct IgnoreRules {
    root: PathBuf,
    lines: Vec<String>,
    matcher: Gitignore,
}

impl IgnoreRules {
    pub fn build(root: &Path, options: &IgnoreOptions) -> Result<Self> {
        let mut lines = Vec::<String>::new();

        if let Some(override_path) = &options.default_override_file {
            match read_pattern_lines(override_path) {
                Some(override_lines) => {
                    log::debug!(
                        "Default ignore patterns replaced by {} ({} patterns)",
                        override_path.display(),
                        override_lines.len()
                    );
                    lines.extend(override_lines);
                }
                None => {
                    log::warn!(
                        "Could not read default-ignore override '{}', keeping built-in defaults",
                        override_path.display()
                    );
                    if options.use_defaults {
                        lines.extend(default_ignore_patterns().iter().cloned());
                    }
                }
            }
        } else if options.use_defaults {
            lines.extend(default_ignore_patterns().iter().cloned());
        }

        if options.use_gitignore {
            let gitignore_path = root.join(GITIGNORE_FILENAME);
            if gitignore_path.is_file() {
                match read_pattern_lines(&gitignore_path) {
                    Some(git_lines) => {
                        log::debug!(
                            "Loaded {} patterns from {}",
                            git_lines.len(),
                            gitignore_path.display()
                        );
                        lines.extend(git_lines);
                    }
                    None => log::warn!(
                        "Could not read '{}', continuing without it",
                        gitignore_path.display()
                    ),
                }
            }
        }

        for file in &options.custom_ignore_files {
            match read_pattern_lines(file) {
                Some(file_lines) => lines.extend(file_lines),
                None => log::warn!(
                    "Could not read ignore file '{}', continuing without it",
                    file.display()
                ),
            }
        }

        if let Some(inline) = &options.custom_patterns {
            for pattern in inline.split(',') {
                let trimmed = pattern.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    lines.push(trimmed.to_string());
                }
            }
        }

        Self::compile(root.to_path_buf(), lines)
    }

    /// Returns a new rule set with per-directory patterns appended. Strictly
    /// additive: earlier layers keep their patterns, the extra lines take
    /// precedence per gitignore ordering.
    pub fn with_dir_patterns(&self, extra_lines: &[String]) -> Result<Self> {
        let mut lines = self.lines.clone();
        for line in extra_lines {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                lines.push(trimmed.to_string());
            }
        }
        Self::compile(self.root.clone(), lines)
    }

    fn compile(root: PathBuf, lines: Vec<String>) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(&root);
        for line in &lines {
            if let Err(e) = builder.add_line(None, line) {
                // Soft failure: a malformed pattern never aborts the run.
                log::warn!("Skipping invalid ignore pattern \"{}\": {}", line, e);
            }
        }
        let matcher = builder.build()?;
        Ok(Self {
            root,
            lines,
            matcher,
        })
    }

    /// True means the relative path is excluded from traversal.
    pub fn is_ignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }

    pub fn pattern_count(&self) -> usize {
        self.lines.len()
    }
}

/// Reads a pattern file, dropping blank lines and `#` comments.
/// None on any read failure (callers log and continue).
fn read_pattern_lines(path: &Path) -> Option<Vec<String>> {
    let content = fs::read_to_string(path).ok()?;
    Some(filter_pattern_lines(&content))
}

pub fn filter_pattern_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rules_from_inline(root: &Path, patterns: &str) -> IgnoreRules {
        let options = IgnoreOptions {
            custom_patterns: Some(patterns.to_string()),
            ..IgnoreOptions::default()
        };
        IgnoreRules::build(root, &options).unwrap()
    }

    #[test]
    fn negation_reincludes_later_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let rules = rules_from_inline(dir.path(), "node_modules, !node_modules/keep.txt");

        assert!(rules.is_ignored(Path::new("node_modules/other.js"), false));
        assert!(!rules.is_ignored(Path::new("node_modules/keep.txt"), false));
    }

    #[test]
    fn blank_and_comment_lines_are_dropped() {
        let filtered = filter_pattern_lines("foo\n\n# comment\n  \nbar\n");
        assert_eq!(filtered, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn gitignore_patterns_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join(".gitignore")).unwrap();
        writeln!(f, "*.log").unwrap();

        let options = IgnoreOptions {
            use_gitignore: true,
            ..IgnoreOptions::default()
        };
        let rules = IgnoreRules::build(dir.path(), &options).unwrap();
        assert!(rules.is_ignored(Path::new("debug.log"), false));
        assert!(!rules.is_ignored(Path::new("debug.txt"), false));
    }

    #[test]
    fn disabled_gitignore_is_not_consulted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();

        let rules = IgnoreRules::build(dir.path(), &IgnoreOptions::default()).unwrap();
        assert!(!rules.is_ignored(Path::new("debug.log"), false));
    }

    #[test]
    fn override_file_replaces_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let override_path = dir.path().join("my.defaults");
        fs::write(&override_path, "*.custom\n").unwrap();

        let options = IgnoreOptions {
            use_defaults: true,
            default_override_file: Some(override_path),
            ..IgnoreOptions::default()
        };
        let rules = IgnoreRules::build(dir.path(), &options).unwrap();
        assert!(rules.is_ignored(Path::new("a.custom"), false));
        // Built-in defaults no longer apply.
        assert!(!rules.is_ignored(Path::new("node_modules/x.js"), false));
    }

    #[test]
    fn unreadable_ignore_file_is_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let options = IgnoreOptions {
            custom_ignore_files: vec![dir.path().join("missing.ignore")],
            custom_patterns: Some("*.tmp".to_string()),
            ..IgnoreOptions::default()
        };
        let rules = IgnoreRules::build(dir.path(), &options).unwrap();
        assert!(rules.is_ignored(Path::new("scratch.tmp"), false));
    }

    #[test]
    fn dir_patterns_are_additive() {
        let dir = tempfile::tempdir().unwrap();
        let base = rules_from_inline(dir.path(), "*.log");
        let extended = base
            .with_dir_patterns(&["*.bak".to_string(), "# note".to_string()])
            .unwrap();

        assert!(extended.is_ignored(Path::new("a.log"), false));
        assert!(extended.is_ignored(Path::new("a.bak"), false));
        assert!(!base.is_ignored(Path::new("a.bak"), false));
    }

    #[test]
    fn defaults_cover_common_noise() {
        let dir = tempfile::tempdir().unwrap();
        let rules = IgnoreRules::build(dir.path(), &IgnoreOptions::with_defaults()).unwrap();
        assert!(rules.is_ignored(Path::new(".git/config"), false));
        assert!(rules.is_ignored(Path::new("target/debug/app"), false));
        assert!(rules.is_ignored(Path::new("logo.png"), false));
        assert!(!rules.is_ignored(Path::new("src/main.rs"), false));
    }
}
