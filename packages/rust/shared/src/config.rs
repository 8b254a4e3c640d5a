//! Application configuration for confluence-export.
//!
//! Config files are looked up in the working directory, then the home
//! directory. CLI flags override environment variables, which override
//! config file values, which override defaults. The API token never lives
//! in a config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// File names probed, in order, in each search directory.
pub const CONFIG_FILE_NAMES: [&str; 3] = [
    ".confluence-export.toml",
    "confluence-export.toml",
    ".confluence-exportrc",
];

/// Where `--save-config` writes when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".confluence-export.toml";

/// Default export directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./confluence-exports";

/// Default number of concurrent body fetches.
pub const DEFAULT_WORKERS: usize = 4;

// ---------------------------------------------------------------------------
// Config structs (matching the TOML schema)
// ---------------------------------------------------------------------------

/// Top-level config file, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub auth: AuthSection,

    #[serde(default)]
    pub pages: PagesSection,

    #[serde(default)]
    pub export: ExportSection,

    #[serde(default)]
    pub advanced: AdvancedSection,
}

/// `[auth]` section. Deliberately has no token field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `[pages]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagesSection {
    /// Page IDs or URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,

    /// File listing page IDs or URLs, one per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Export every page of this space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    #[serde(default)]
    pub flat: bool,

    #[serde(default)]
    pub include_children: bool,

    #[serde(default)]
    pub manifest: bool,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            output: default_output(),
            formats: default_formats(),
            flat: false,
            include_children: false,
            manifest: false,
        }
    }
}

fn default_output() -> String {
    DEFAULT_OUTPUT_DIR.into()
}
fn default_formats() -> Vec<String> {
    vec!["markdown".into()]
}

/// `[advanced]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSection {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_true")]
    pub skip_errors: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub quiet: bool,
}

impl Default for AdvancedSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            skip_errors: true,
            verbose: false,
            quiet: false,
        }
    }
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Export settings (runtime, merged from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime export settings. Built from a config file, then overridden by
/// the CLI layer.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub pages: Vec<String>,
    pub pages_file: Option<PathBuf>,
    pub space: Option<String>,
    pub output: PathBuf,
    pub formats: Vec<String>,
    pub flat: bool,
    pub include_children: bool,
    pub manifest: bool,
    pub workers: usize,
    pub skip_errors: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExportSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.auth.base_url.clone(),
            email: config.auth.email.clone(),
            pages: config.pages.ids.clone(),
            pages_file: config.pages.file.as_ref().map(PathBuf::from),
            space: config.pages.space.clone(),
            output: PathBuf::from(&config.export.output),
            formats: config.export.formats.clone(),
            flat: config.export.flat,
            include_children: config.export.include_children,
            manifest: config.export.manifest,
            workers: config.advanced.workers,
            skip_errors: config.advanced.skip_errors,
            verbose: config.advanced.verbose,
            quiet: config.advanced.quiet,
        }
    }
}

impl From<&ExportSettings> for AppConfig {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            auth: AuthSection {
                base_url: settings.base_url.clone(),
                email: settings.email.clone(),
            },
            pages: PagesSection {
                ids: settings.pages.clone(),
                file: settings
                    .pages_file
                    .as_ref()
                    .map(|p| p.display().to_string()),
                space: settings.space.clone(),
            },
            export: ExportSection {
                output: settings.output.display().to_string(),
                formats: settings.formats.clone(),
                flat: settings.flat,
                include_children: settings.include_children,
                manifest: settings.manifest,
            },
            advanced: AdvancedSection {
                workers: settings.workers,
                skip_errors: settings.skip_errors,
                verbose: settings.verbose,
                quiet: settings.quiet,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Find the first config file in `cwd`, then in `home`.
pub fn find_config_file(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    std::iter::once(cwd)
        .chain(home)
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Load the config file. An explicit path must exist; otherwise the usual
/// locations are searched and `None` is returned when nothing is found.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<(PathBuf, AppConfig)>> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(ExportError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| ExportError::io(".", e))?;
            let home = dirs::home_dir();
            match find_config_file(&cwd, home.as_deref()) {
                Some(path) => path,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    return Ok(None);
                }
            }
        }
    };

    let config = load_config_from(&path)?;
    tracing::debug!(?path, "loaded config file");
    Ok(Some((path, config)))
}

/// Load the config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ExportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write `config` to `path` (or [`DEFAULT_CONFIG_FILE`]). Returns the path written.
pub fn save_config(config: &AppConfig, path: Option<&Path>) -> Result<PathBuf> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ExportError::config(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| ExportError::io(&path, e))?;
    tracing::info!(?path, "saved config file");

    Ok(path)
}
