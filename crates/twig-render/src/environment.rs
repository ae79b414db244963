//! The [`Twig`] handle: one configured template environment.
//!
//! A `Twig` owns a minijinja [`Environment`] wired to a [`FilesystemLoader`].
//! It is cheap to clone; clones share the same engine and loader, so the
//! handle can be passed to every component that renders.
//!
//! Configuration and rendering may run concurrently. The engine and the loader
//! each sit behind a `RwLock`: renders take read locks, configuration takes
//! write locks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use crate::extension::{Extensions, TwigFilter, TwigFunction};
use crate::loader::{FilesystemLoader, MAIN_NAMESPACE};
use crate::options::{self, TwigOptions};

/// A shared, configurable template environment.
///
/// # Example
///
/// ```rust,no_run
/// use twig_render::{Extensions, Twig, Value};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), twig_render::RenderError> {
/// let twig = Twig::new();
/// twig.configure(
///     Extensions::new().filter("shout", |args| {
///         Ok(Value::from(args[0].to_string().to_uppercase()))
///     }),
/// )
/// .await;
///
/// let html = twig.render("hello.twig", &json!({ "name": "World" })).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Twig {
    pub(crate) env: Arc<RwLock<Environment<'static>>>,
    loader: Arc<RwLock<FilesystemLoader>>,
}

impl Twig {
    /// Creates an environment with an empty loader.
    ///
    /// Defaults: HTML autoescaping on, undefined variables render empty.
    pub fn new() -> Self {
        Self::from_loader(FilesystemLoader::new())
    }

    /// Creates an environment around an existing loader.
    pub fn from_loader(loader: FilesystemLoader) -> Self {
        let loader = Arc::new(RwLock::new(loader));

        let mut env = Environment::new();
        let shared = Arc::clone(&loader);
        env.set_loader(move |name| read_lock(&shared).load(name));
        set_autoescape(&mut env, true);
        env.set_undefined_behavior(UndefinedBehavior::Lenient);

        Self {
            env: Arc::new(RwLock::new(env)),
            loader,
        }
    }

    /// Reads the configuration file in the working directory, then applies
    /// it together with `extensions`.
    ///
    /// Configuration problems are logged, never returned; see
    /// [`retrieve_options`](crate::retrieve_options).
    pub async fn configure(&self, extensions: Extensions) {
        let options = options::retrieve_options().await;
        self.apply(&options, &extensions);
    }

    /// Like [`configure`](Self::configure), reading the configuration from `dir`.
    pub async fn configure_in(&self, dir: &Path, extensions: Extensions) {
        let options = options::retrieve_options_in(dir).await;
        self.apply(&options, &extensions);
    }

    /// Applies loaded options and registers every filter and function.
    ///
    /// Registrations replace earlier ones with the same name.
    pub fn apply(&self, options: &TwigOptions, extensions: &Extensions) {
        self.with_loader_mut(|loader| {
            if let Some(path) = &options.template_path {
                tracing::debug!("Adding template path {}", path.display());
                loader.add_path(path, MAIN_NAMESPACE);
            }
            for (namespace, path) in &options.namespaces {
                tracing::debug!("Adding template path {} to @{}", path.display(), namespace);
                loader.add_path(path, namespace);
            }
        });

        self.with_environment_mut(|env| {
            if let Some(enabled) = options.autoescape {
                set_autoescape(env, enabled);
            }
            if let Some(strict) = options.strict_variables {
                env.set_undefined_behavior(undefined_behavior(strict));
            }
            for filter in extensions.filters() {
                tracing::debug!("Registering filter {}", filter.name());
                filter.register(env);
            }
            for function in extensions.functions() {
                tracing::debug!("Registering function {}", function.name());
                function.register(env);
            }
            env.clear_templates();
        });
    }

    pub fn add_filter(&self, filter: TwigFilter) {
        self.with_environment_mut(|env| filter.register(env));
    }

    pub fn add_function(&self, function: TwigFunction) {
        self.with_environment_mut(|env| function.register(env));
    }

    /// Appends a search path to `namespace` (use [`MAIN_NAMESPACE`] for
    /// names without an `@namespace/` prefix).
    pub fn add_path(&self, path: impl Into<PathBuf>, namespace: &str) {
        let path = path.into();
        self.with_loader_mut(|loader| loader.add_path(path, namespace));
    }

    /// Puts a search path in front of the existing ones for `namespace`.
    pub fn prepend_path(&self, path: impl Into<PathBuf>, namespace: &str) {
        let path = path.into();
        self.with_loader_mut(|loader| loader.prepend_path(path, namespace));
    }

    pub fn set_autoescape(&self, enabled: bool) {
        self.with_environment_mut(|env| {
            set_autoescape(env, enabled);
            env.clear_templates();
        });
    }

    pub fn set_strict_variables(&self, strict: bool) {
        self.with_environment_mut(|env| env.set_undefined_behavior(undefined_behavior(strict)));
    }

    /// Runs `f` with read access to the loader.
    pub fn with_loader<R>(&self, f: impl FnOnce(&FilesystemLoader) -> R) -> R {
        f(&read_lock(&self.loader))
    }

    /// Runs `f` with write access to the loader.
    ///
    /// Templates cached by the engine are dropped afterwards so changed
    /// search paths take effect on the next render.
    pub fn with_loader_mut<R>(&self, f: impl FnOnce(&mut FilesystemLoader) -> R) -> R {
        let result = {
            let mut loader = write_lock(&self.loader);
            f(&mut loader)
        };
        write_lock(&self.env).clear_templates();
        result
    }

    /// Runs `f` with write access to the underlying minijinja environment.
    ///
    /// The loader is already installed; replacing it detaches this handle's
    /// [`FilesystemLoader`].
    pub fn with_environment_mut<R>(&self, f: impl FnOnce(&mut Environment<'static>) -> R) -> R {
        f(&mut write_lock(&self.env))
    }
}

impl Default for Twig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Twig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Twig")
            .field("loader", &*read_lock(&self.loader))
            .finish_non_exhaustive()
    }
}

fn set_autoescape(env: &mut Environment<'static>, enabled: bool) {
    if enabled {
        env.set_auto_escape_callback(|_| AutoEscape::Html);
    } else {
        env.set_auto_escape_callback(|_| AutoEscape::None);
    }
}

fn undefined_behavior(strict: bool) -> UndefinedBehavior {
    if strict {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Lenient
    }
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
