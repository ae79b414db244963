//! Configuration file discovery and loading.
//!
//! A project configures its template environment through an optional
//! `twig.config.json` (or `.yaml`/`.yml`) file in its working directory:
//!
//! ```yaml
//! templatePath: views
//! namespaces:
//!   admin: admin/views
//! autoescape: true
//! strictVariables: false
//! ```
//!
//! [`retrieve_options`] never fails. A missing file means "no configuration";
//! an unreadable or malformed file is logged and replaced by defaults. Use
//! [`load_options_file`] when the error should reach the caller instead.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration file names, in lookup order. The first existing file wins.
pub const CONFIG_FILE_NAMES: &[&str] = &["twig.config.json", "twig.config.yaml", "twig.config.yml"];

/// Options read from a `twig.config.*` file.
///
/// Every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TwigOptions {
    /// Directory added to the main namespace.
    pub template_path: Option<PathBuf>,
    /// Namespace name to directory, added as `@name/...` search paths.
    pub namespaces: BTreeMap<String, PathBuf>,
    /// HTML autoescaping; the environment's default applies when unset.
    pub autoescape: Option<bool>,
    /// Fail on undefined variables instead of rendering them empty.
    pub strict_variables: Option<bool>,
}

impl TwigOptions {
    /// True when the options carry nothing to apply.
    pub fn is_empty(&self) -> bool {
        *self == TwigOptions::default()
    }

    /// Makes every relative path absolute with respect to `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        if let Some(path) = self.template_path.take() {
            self.template_path = Some(join_relative(base, path));
        }
        self.namespaces = self
            .namespaces
            .into_iter()
            .map(|(name, path)| (name, join_relative(base, path)))
            .collect();
        self
    }
}

fn join_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Retrieves options from the process working directory.
///
/// See [`retrieve_options_in`] for the lookup rules.
pub async fn retrieve_options() -> TwigOptions {
    match std::env::current_dir() {
        Ok(cwd) => retrieve_options_in(&cwd).await,
        Err(err) => {
            tracing::error!("Unable to resolve current directory: {}", err);
            TwigOptions::default()
        }
    }
}

/// Retrieves options from the first configuration file found in `dir`.
///
/// The lookup is fully awaited before returning, so the result always
/// reflects the file on disk. Relative paths in the file are resolved
/// against `dir`.
pub async fn retrieve_options_in(dir: &Path) -> TwigOptions {
    for file_name in CONFIG_FILE_NAMES {
        let path = dir.join(file_name);
        match load_options_file(&path).await {
            Ok(options) => {
                tracing::debug!("Loaded template options from {}", path.display());
                return options.resolve_relative_to(dir);
            }
            Err(err) if err.is_not_found() => continue,
            Err(err @ ConfigError::Parse { .. }) => {
                tracing::error!("Loading {} failed: {}", path.display(), err);
                return TwigOptions::default();
            }
            Err(err) => {
                tracing::error!("File system error: {}", err);
                return TwigOptions::default();
            }
        }
    }

    tracing::debug!("No configuration file in {}, using defaults", dir.display());
    TwigOptions::default()
}

/// Reads and parses a single options file.
///
/// The format follows the extension: `.json` is JSON, `.yaml` and `.yml`
/// are YAML. An empty file yields default options.
pub async fn load_options_file(path: &Path) -> Result<TwigOptions, ConfigError> {
    let format = Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| read_error(path, source))?;

    parse_options(&content, format).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn read_error(path: &Path, source: io::Error) -> ConfigError {
    ConfigError::Read {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

fn parse_options(content: &str, format: Format) -> Result<TwigOptions, String> {
    if content.trim().is_empty() {
        return Ok(TwigOptions::default());
    }
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    }
}
