use crate::error::{AppError, Result};
use crate::gather::GatherLimits;
use crate::ignore_rules::IgnoreOptions;
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILENAME: &str = ".ctxpack.toml";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "txt";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub save: SaveConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default = "default_true")]
    pub use_gitignore: bool,
    #[serde(default = "default_true")]
    pub enable_builtin_ignore: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub strip_comments: bool,
    #[serde(default)]
    pub compress_whitespace: bool,
    #[serde(default = "default_max_file_kb")]
    pub max_file_kb: usize,
    #[serde(default = "default_max_total_kb")]
    pub max_total_kb: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct IgnoreConfig {
    /// Inline comma-separated patterns, highest precedence.
    #[serde(default)]
    pub patterns: Option<String>,
    #[serde(default)]
    pub ignore_files: Vec<PathBuf>,
    /// Replaces the built-in defaults wholesale.
    #[serde(default)]
    pub default_override: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    /// Human size string, e.g. "64KB".
    #[serde(default)]
    pub chunk_size: Option<String>,
    /// Non-negative integer or "all".
    #[serde(default)]
    pub folder_depth: Option<String>,
    #[serde(default)]
    pub output_filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub include_layout: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SaveConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub filename_base: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_pattern() -> String {
    "*".to_string()
}
fn default_strategy() -> String {
    "end".to_string()
}
fn default_max_file_kb() -> usize {
    512
}
fn default_max_total_kb() -> usize {
    10 * 1024
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            use_gitignore: default_true(),
            enable_builtin_ignore: default_true(),
        }
    }
}
impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            strip_comments: false,
            compress_whitespace: false,
            max_file_kb: default_max_file_kb(),
            max_total_kb: default_max_total_kb(),
        }
    }
}
impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            strategy: default_strategy(),
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_layout: default_true(),
        }
    }
}
impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            filename_base: None,
            extension: None,
        }
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve.canonicalize().map_err(|_| {
            AppError::InvalidPath(format!(
                "invalid path: {}",
                path_to_resolve.display()
            ))
        })
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }
        match cli_config_file {
            Some(p_str) => {
                let expanded = shellexpand::tilde(p_str);
                let path = PathBuf::from(expanded.as_ref());
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root.join(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn get_effective_project_name(&self, project_root: &Path) -> String {
        self.general.project_name.clone().unwrap_or_else(|| {
            project_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "context".to_string())
        })
    }

    pub fn ignore_options(&self) -> IgnoreOptions {
        IgnoreOptions {
            use_gitignore: self.general.use_gitignore,
            use_defaults: self.general.enable_builtin_ignore,
            custom_ignore_files: self.ignore.ignore_files.clone(),
            custom_patterns: self.ignore.patterns.clone(),
            default_override_file: self.ignore.default_override.clone(),
        }
    }

    pub fn gather_limits(&self) -> GatherLimits {
        GatherLimits {
            max_file_bytes: self.content.max_file_kb * 1024,
            max_total_bytes: self.content.max_total_kb * 1024,
            ..GatherLimits::default()
        }
    }

    pub fn save_extension(&self) -> &str {
        self.save
            .extension
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [content]
            pattern = "*.rs"
            strip_comments = true

            [budget]
            max_tokens = 4000
            "#,
        )
        .unwrap();
        assert_eq!(config.content.pattern, "*.rs");
        assert!(config.content.strip_comments);
        assert_eq!(config.budget.max_tokens, Some(4000));
        assert_eq!(config.budget.strategy, "end");
        assert!(config.general.use_gitignore);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = toml::from_str::<Config>("[general]\nnonsense = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::resolve_config_path(
            dir.path(),
            Some(&"/no/such/file.toml".to_string()),
            false,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn default_config_path_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = Config::resolve_config_path(dir.path(), None, false).unwrap();
        assert!(resolved.is_none());

        fs::write(dir.path().join(DEFAULT_CONFIG_FILENAME), "[general]\n").unwrap();
        let resolved = Config::resolve_config_path(dir.path(), None, false).unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn gather_limits_scale_from_kb() {
        let config: Config = toml::from_str(
            "[content]\nmax_file_kb = 2\nmax_total_kb = 8\n",
        )
        .unwrap();
        let limits = config.gather_limits();
        assert_eq!(limits.max_file_bytes, 2048);
        assert_eq!(limits.max_total_bytes, 8192);
    }
}
