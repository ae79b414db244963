//! Namespaced filesystem template loader.
//!
//! [`FilesystemLoader`] resolves template names to files using Twig's
//! conventions:
//!
//! - Search paths are grouped by namespace. Paths added without a namespace
//!   belong to [`MAIN_NAMESPACE`].
//! - A name written `@admin/users/list.twig` is looked up in the `admin`
//!   namespace as `users/list.twig`; any other name is looked up in the main
//!   namespace.
//! - Within a namespace, paths are searched in order and the first directory
//!   containing the file wins.
//!
//! Paths are only recorded when added; whether a directory exists is checked
//! at lookup time.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut loader = FilesystemLoader::new();
//! loader.add_path("views", MAIN_NAMESPACE);
//! loader.add_path("/srv/admin/views", "admin");
//!
//! loader.find_template("home.twig")?;         // views/home.twig
//! loader.find_template("@admin/index.twig")?; // /srv/admin/views/index.twig
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::LoaderError;

/// Namespace used by names without an `@namespace/` prefix.
pub const MAIN_NAMESPACE: &str = "__main__";

/// Resolves template names against namespaced search directories.
#[derive(Debug, Clone, Default)]
pub struct FilesystemLoader {
    paths: BTreeMap<String, Vec<PathBuf>>,
}

impl FilesystemLoader {
    /// Creates a loader with no search paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a search path to `namespace`.
    ///
    /// Adding a path already present in the namespace is a no-op.
    pub fn add_path(&mut self, path: impl Into<PathBuf>, namespace: &str) {
        let path = path.into();
        let paths = self.paths.entry(namespace.to_string()).or_default();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    /// Inserts a search path in front of the existing ones for `namespace`.
    ///
    /// If the path was already registered it moves to the front.
    pub fn prepend_path(&mut self, path: impl Into<PathBuf>, namespace: &str) {
        let path = path.into();
        let paths = self.paths.entry(namespace.to_string()).or_default();
        paths.retain(|p| *p != path);
        paths.insert(0, path);
    }

    /// Replaces all search paths of `namespace`.
    pub fn set_paths<I, P>(&mut self, paths: I, namespace: &str)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut unique: Vec<PathBuf> = Vec::new();
        for path in paths.into_iter().map(Into::into) {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        self.paths.insert(namespace.to_string(), unique);
    }

    /// Returns the search paths of `namespace`, in lookup order.
    pub fn paths(&self, namespace: &str) -> &[PathBuf] {
        self.paths.get(namespace).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns every namespace that has at least one search path.
    pub fn namespaces(&self) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Finds the file backing `name`.
    pub fn find_template(&self, name: &str) -> Result<PathBuf, LoaderError> {
        let normalized = normalize_name(name);
        let (namespace, shortname) = parse_name(&normalized)?;
        validate_name(name, shortname)?;

        let paths = self.paths(namespace);
        if paths.is_empty() {
            return Err(LoaderError::NoNamespacePaths {
                namespace: namespace.to_string(),
            });
        }

        paths
            .iter()
            .map(|dir| dir.join(shortname))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
                searched: paths.to_vec(),
            })
    }

    /// True when `name` resolves to an existing file.
    pub fn exists(&self, name: &str) -> bool {
        self.find_template(name).is_ok()
    }

    /// Reads the source of `name`.
    pub fn source(&self, name: &str) -> Result<String, LoaderError> {
        let path = self.find_template(name)?;
        read_source(&path)
    }

    /// Loader entry point for a minijinja environment.
    ///
    /// Missing templates map to `Ok(None)` so the engine reports them as
    /// `TemplateNotFound`; every other failure becomes an engine error.
    pub(crate) fn load(&self, name: &str) -> Result<Option<String>, minijinja::Error> {
        match self.source(name) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.is_not_found() => {
                tracing::debug!("{}", err);
                Ok(None)
            }
            Err(err) => Err(minijinja::Error::new(
                minijinja::ErrorKind::InvalidOperation,
                err.to_string(),
            )
            .with_source(err)),
        }
    }
}

fn read_source(path: &Path) -> Result<String, LoaderError> {
    std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn normalize_name(name: &str) -> String {
    let replaced = name.replace('\\', "/");
    let mut normalized = String::with_capacity(replaced.len());
    let mut previous_slash = false;
    for ch in replaced.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(ch);
    }
    normalized.trim_start_matches('/').to_string()
}

/// Splits a normalized name into `(namespace, shortname)`.
fn parse_name(name: &str) -> Result<(&str, &str), LoaderError> {
    if let Some(rest) = name.strip_prefix('@') {
        let Some((namespace, shortname)) = rest.split_once('/') else {
            return Err(LoaderError::invalid_name(
                name,
                "malformed namespaced template name (expecting \"@namespace/template_name\")",
            ));
        };
        if namespace.is_empty() || shortname.is_empty() {
            return Err(LoaderError::invalid_name(
                name,
                "malformed namespaced template name (expecting \"@namespace/template_name\")",
            ));
        }
        return Ok((namespace, shortname));
    }

    Ok((MAIN_NAMESPACE, name))
}

/// Rejects names that contain NUL bytes or climb above their search root.
fn validate_name(name: &str, shortname: &str) -> Result<(), LoaderError> {
    if shortname.contains('\0') {
        return Err(LoaderError::invalid_name(name, "a template name cannot contain NUL bytes"));
    }
    if shortname.is_empty() {
        return Err(LoaderError::invalid_name(name, "a template name cannot be empty"));
    }

    let mut level: i32 = 0;
    for part in shortname.split('/') {
        match part {
            ".." => level -= 1,
            "." | "" => {}
            _ => level += 1,
        }
        if level < 0 {
            return Err(LoaderError::invalid_name(
                name,
                "looks like you try to load a template outside configured directories",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_name_main_namespace() {
        assert_eq!(parse_name("page.twig").unwrap(), (MAIN_NAMESPACE, "page.twig"));
    }

    #[test]
    fn test_parse_name_namespaced() {
        assert_eq!(
            parse_name("@admin/users/list.twig").unwrap(),
            ("admin", "users/list.twig")
        );
    }

    #[test]
    fn test_parse_name_malformed_namespace() {
        assert!(parse_name("@admin").is_err());
        assert!(parse_name("@/page.twig").is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("/partials//nav.twig"), "partials/nav.twig");
        assert_eq!(normalize_name("partials\\nav.twig"), "partials/nav.twig");
    }

    #[test]
    fn test_validate_name_rejects_escape() {
        assert!(validate_name("../secret", "../secret").is_err());
        assert!(validate_name("a/../../secret", "a/../../secret").is_err());
        assert!(validate_name("a/../b.twig", "a/../b.twig").is_ok());
        assert!(validate_name("a\0b", "a\0b").is_err());
    }

    #[test]
    fn test_add_path_deduplicates() {
        let mut loader = FilesystemLoader::new();
        loader.add_path("views", MAIN_NAMESPACE);
        loader.add_path("views", MAIN_NAMESPACE);
        loader.add_path("other", MAIN_NAMESPACE);
        assert_eq!(
            loader.paths(MAIN_NAMESPACE),
            &[PathBuf::from("views"), PathBuf::from("other")]
        );
    }

    #[test]
    fn test_add_path_does_not_require_directory() {
        let mut loader = FilesystemLoader::new();
        loader.add_path("/admin/views", "admin");
        assert_eq!(loader.paths("admin"), &[PathBuf::from("/admin/views")]);
        assert_eq!(loader.namespaces(), vec!["admin"]);
    }

    #[test]
    fn test_prepend_path_moves_to_front() {
        let mut loader = FilesystemLoader::new();
        loader.add_path("a", MAIN_NAMESPACE);
        loader.add_path("b", MAIN_NAMESPACE);
        loader.prepend_path("b", MAIN_NAMESPACE);
        assert_eq!(
            loader.paths(MAIN_NAMESPACE),
            &[PathBuf::from("b"), PathBuf::from("a")]
        );
    }

    #[test]
    fn test_set_paths_replaces() {
        let mut loader = FilesystemLoader::new();
        loader.add_path("a", "mail");
        loader.set_paths(["b", "c", "b"], "mail");
        assert_eq!(loader.paths("mail"), &[PathBuf::from("b"), PathBuf::from("c")]);
    }

    #[test]
    fn test_find_template_first_path_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "page.twig", "first");
        write(second.path(), "page.twig", "second");
        write(second.path(), "only.twig", "only");

        let mut loader = FilesystemLoader::new();
        loader.add_path(first.path(), MAIN_NAMESPACE);
        loader.add_path(second.path(), MAIN_NAMESPACE);

        assert_eq!(loader.source("page.twig").unwrap(), "first");
        assert_eq!(loader.source("only.twig").unwrap(), "only");
    }

    #[test]
    fn test_find_template_namespaced() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users/list.twig", "users");

        let mut loader = FilesystemLoader::new();
        loader.add_path(dir.path(), "admin");

        assert_eq!(loader.source("@admin/users/list.twig").unwrap(), "users");
        assert!(loader.exists("@admin/users/list.twig"));
        assert!(!loader.exists("users/list.twig"));
    }

    #[test]
    fn test_find_template_errors() {
        let dir = TempDir::new().unwrap();
        let mut loader = FilesystemLoader::new();

        let err = loader.find_template("page.twig").unwrap_err();
        assert!(matches!(err, LoaderError::NoNamespacePaths { .. }));

        loader.add_path(dir.path(), MAIN_NAMESPACE);
        let err = loader.find_template("page.twig").unwrap_err();
        assert!(matches!(err, LoaderError::NotFound { .. }));
        assert!(err.is_not_found());

        let err = loader.find_template("../page.twig").unwrap_err();
        assert!(matches!(err, LoaderError::InvalidName { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_directory_is_not_a_template() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();

        let mut loader = FilesystemLoader::new();
        loader.add_path(dir.path(), MAIN_NAMESPACE);
        assert!(!loader.exists("partials"));
    }

    #[test]
    fn test_load_unreadable_template_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("binary.twig"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let mut loader = FilesystemLoader::new();
        loader.add_path(dir.path(), MAIN_NAMESPACE);

        let err = loader.source("binary.twig").unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }), "{err:?}");
        assert!(!err.is_not_found());

        let err = loader.load("binary.twig").unwrap_err();
        assert_eq!(err.kind(), minijinja::ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_load_maps_not_found_to_none() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.twig", "hello");

        let mut loader = FilesystemLoader::new();
        loader.add_path(dir.path(), MAIN_NAMESPACE);

        assert_eq!(loader.load("page.twig").unwrap().as_deref(), Some("hello"));
        assert!(loader.load("missing.twig").unwrap().is_none());
        assert!(loader.load("@nowhere/page.twig").unwrap().is_none());
        assert!(loader.load("../../etc/passwd").is_err());
    }
}
