//! Resolving runtime settings: config file, then environment and flags.
//!
//! Flags and their environment fallbacks are merged by clap; whatever they
//! leave unset comes from the config file, then from built-in defaults.

use std::path::{Path, PathBuf};

use confluence_export_shared::{ExportError, ExportSettings, Result, load_config};

use crate::commands::Cli;

/// Load the config file (unless disabled) and apply command-line overrides.
/// Returns the settings and the config file that was used, if any.
pub(crate) fn resolve_settings(cli: &Cli) -> Result<(ExportSettings, Option<PathBuf>)> {
    let loaded = if cli.no_config {
        None
    } else {
        load_config(cli.config.as_deref())?
    };

    let (mut settings, source) = match loaded {
        Some((path, config)) => (ExportSettings::from(&config), Some(path)),
        None => (ExportSettings::default(), None),
    };
    apply_overrides(&mut settings, cli);

    if settings.workers == 0 {
        return Err(ExportError::validation("workers must be at least 1"));
    }
    Ok((settings, source))
}

/// Apply every flag the user actually passed.
pub(crate) fn apply_overrides(settings: &mut ExportSettings, cli: &Cli) {
    if let Some(base_url) = &cli.base_url {
        settings.base_url = Some(base_url.clone());
    }
    if let Some(email) = &cli.email {
        settings.email = Some(email.clone());
    }
    if !cli.pages.is_empty() {
        settings.pages = cli.pages.clone();
    }
    if let Some(file) = &cli.pages_file {
        settings.pages_file = Some(file.clone());
    }
    if let Some(space) = &cli.space {
        settings.space = Some(space.clone());
    }
    if let Some(output) = &cli.output {
        settings.output = output.clone();
    }
    if !cli.formats.is_empty() {
        settings.formats = cli.formats.clone();
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }

    settings.flat |= cli.flat;
    settings.include_children |= cli.include_children;
    settings.manifest |= cli.manifest;
    settings.verbose |= cli.verbose > 0;
    settings.quiet |= cli.quiet;

    if cli.no_skip_errors {
        settings.skip_errors = false;
    } else if cli.skip_errors {
        settings.skip_errors = true;
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

pub(crate) struct Credentials {
    pub base_url: String,
    pub email: String,
    pub token: String,
}

/// All three credentials, or a config error naming every missing one.
pub(crate) fn require_credentials(
    settings: &ExportSettings,
    token: Option<&str>,
) -> Result<Credentials> {
    fn present(value: Option<&str>) -> Option<String> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    let base_url = present(settings.base_url.as_deref());
    let email = present(settings.email.as_deref());
    let token = present(token);

    match (base_url, email, token) {
        (Some(base_url), Some(email), Some(token)) => Ok(Credentials {
            base_url,
            email,
            token,
        }),
        (base_url, email, token) => {
            let mut missing = Vec::new();
            if base_url.is_none() {
                missing.push("--base-url or CONFLUENCE_BASE_URL");
            }
            if email.is_none() {
                missing.push("--email or CONFLUENCE_EMAIL");
            }
            if token.is_none() {
                missing.push("--token or CONFLUENCE_API_TOKEN");
            }
            Err(ExportError::config(format!(
                "missing required authentication parameters: {}",
                missing.join(", ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Page inputs
// ---------------------------------------------------------------------------

/// Entries of a pages file: one per line or comma-separated, skipping
/// blank lines and `#` comments.
pub(crate) fn parse_page_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn read_pages_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
    Ok(parse_page_list(&content))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use confluence_export_shared::{AppConfig, save_config};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["confluence-export"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn pages_file_skips_comments_and_splits_commas() {
        let content = "# exported weekly\n123\n\n  https://x.atlassian.net/wiki/spaces/D/pages/456/T \n789, 1011 ,\n#999\n";
        assert_eq!(
            parse_page_list(content),
            [
                "123",
                "https://x.atlassian.net/wiki/spaces/D/pages/456/T",
                "789",
                "1011"
            ]
        );
    }

    #[test]
    fn missing_pages_file_is_an_io_error() {
        let err = read_pages_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn flags_override_config_values() {
        let mut config = AppConfig::default();
        config.export.formats = vec!["html".into()];
        config.export.output = "from-config".into();
        config.advanced.workers = 2;
        let mut settings = ExportSettings::from(&config);

        apply_overrides(
            &mut settings,
            &cli(&["--format", "md,txt", "--workers", "8", "--flat", "--no-skip-errors"]),
        );

        assert_eq!(settings.formats, ["md", "txt"]);
        assert_eq!(settings.output, PathBuf::from("from-config"));
        assert_eq!(settings.workers, 8);
        assert!(settings.flat);
        assert!(!settings.skip_errors);
    }

    #[test]
    fn config_file_is_used_when_flags_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.pages.ids = vec!["42".into()];
        config.export.include_children = true;
        let path = save_config(&config, Some(&dir.path().join("custom.toml"))).unwrap();

        let cli = cli(&["--config", path.to_str().unwrap()]);
        let (settings, source) = resolve_settings(&cli).unwrap();

        assert_eq!(source.as_deref(), Some(path.as_path()));
        assert_eq!(settings.pages, ["42"]);
        assert!(settings.include_children);
        assert!(settings.skip_errors);
    }

    #[test]
    fn zero_workers_are_rejected() {
        let err = resolve_settings(&cli(&["--no-config", "--workers", "0"])).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn missing_credentials_are_all_named() {
        let settings = ExportSettings {
            email: Some("me@example.com".into()),
            ..ExportSettings::default()
        };
        let err = require_credentials(&settings, Some("  "))
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("--base-url or CONFLUENCE_BASE_URL"));
        assert!(err.contains("--token or CONFLUENCE_API_TOKEN"));
        assert!(!err.contains("CONFLUENCE_EMAIL"));
    }

    #[test]
    fn complete_credentials_are_returned() {
        let settings = ExportSettings {
            base_url: Some("https://x.atlassian.net".into()),
            email: Some("me@example.com".into()),
            ..ExportSettings::default()
        };
        let creds = require_credentials(&settings, Some("secret")).unwrap();
        assert_eq!(creds.base_url, "https://x.atlassian.net");
        assert_eq!(creds.token, "secret");
    }
}
