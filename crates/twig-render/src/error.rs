//! Error types for configuration, template loading and rendering.
//!
//! [`RenderError`] is what every render call resolves to on failure. It
//! abstracts over minijinja's error so callers never depend on the engine's
//! error type directly. [`ConfigError`] and [`LoaderError`] cover the two
//! filesystem-facing pieces: the options file and the template search paths.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Error type for template rendering operations.
#[derive(Debug)]
pub enum RenderError {
    /// The template failed to compile, or used an unregistered filter or
    /// function, or touched an undefined variable with `strictVariables` on.
    TemplateError(String),

    /// No search path of the template's namespace holds the file.
    TemplateNotFound(String),

    /// The context could not be serialized to JSON.
    SerializationError(String),

    /// Reading a template file failed.
    IoError(io::Error),

    /// A filter or function returned an error, a template name was rejected
    /// by the loader, or the render task panicked.
    OperationError(String),

    /// The render context is not a map.
    ContextError(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::TemplateError(msg) => write!(f, "template error: {}", msg),
            RenderError::TemplateNotFound(name) => write!(f, "template not found: {}", name),
            RenderError::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            RenderError::IoError(err) => write!(f, "I/O error: {}", err),
            RenderError::OperationError(msg) => write!(f, "render failed: {}", msg),
            RenderError::ContextError(msg) => write!(f, "invalid render context: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        RenderError::IoError(err)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::SyntaxError
            | ErrorKind::BadEscape
            | ErrorKind::UndefinedError
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFunction
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownMethod => RenderError::TemplateError(err.to_string()),
            ErrorKind::BadSerialization => RenderError::SerializationError(err.to_string()),
            _ => RenderError::OperationError(err.to_string()),
        }
    }
}

/// Errors raised while reading a `twig.config.*` file.
///
/// Only [`load_options_file`](crate::load_options_file) returns these; the
/// lenient retrieval path logs them and falls back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was read but is not valid JSON or YAML for the options schema.
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// The file extension is neither `.json`, `.yaml` nor `.yml`.
    #[error("Unsupported configuration format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },
}

impl ConfigError {
    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Errors raised by the [`FilesystemLoader`](crate::FilesystemLoader).
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The namespace has no search path at all.
    #[error("There are no registered paths for namespace \"{namespace}\".")]
    NoNamespacePaths { namespace: String },

    /// None of the namespace's search paths contains the template.
    #[error("Unable to find template \"{name}\" (looked into: {}).", display_paths(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },

    /// The template name is malformed or escapes its search root.
    #[error("Invalid template name \"{name}\": {reason}")]
    InvalidName { name: String, reason: String },

    /// The template file exists but could not be read.
    #[error("Failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoaderError {
    /// True for the variants that mean "this loader does not have it".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LoaderError::NoNamespacePaths { .. } | LoaderError::NotFound { .. }
        )
    }

    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        LoaderError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
