//! # Twig Render - configured template environments
//!
//! `twig-render` sets up a [minijinja] environment the way Twig projects
//! expect it: template search paths and `@namespace` paths come from an
//! optional `twig.config.*` file in the working directory, user filters and
//! functions are registered by name, and templates render asynchronously.
//!
//! ## Core Concepts
//!
//! - [`Twig`]: Shared handle to one configured environment; clone it freely
//! - [`TwigOptions`]: What a `twig.config.json`/`.yaml`/`.yml` file may set
//! - [`FilesystemLoader`]: Resolves `page.twig` and `@admin/page.twig` to files
//! - [`Extensions`]: Named filters and functions to register
//! - [`RenderError`]: Every way a render can fail
//!
//! ## Quick Start
//!
//! ```rust
//! use twig_render::{Extensions, Twig, TwigOptions, Value};
//! use serde_json::json;
//!
//! # let dir = tempfile::tempdir().unwrap();
//! # std::fs::write(dir.path().join("hello.twig"), "Hello {{ name | shout }}!").unwrap();
//! # let views = dir.path().to_path_buf();
//! # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # runtime.block_on(async {
//! let twig = Twig::new();
//! let options = TwigOptions {
//!     template_path: Some(views),
//!     ..Default::default()
//! };
//! let extensions = Extensions::new().filter("shout", |args| {
//!     Ok(Value::from(args[0].to_string().to_uppercase()))
//! });
//! twig.apply(&options, &extensions);
//!
//! let html = twig.render("hello.twig", &json!({ "name": "World" })).await.unwrap();
//! assert_eq!(html, "Hello WORLD!");
//! # });
//! ```
//!
//! In an application, [`Twig::configure`] replaces the explicit
//! [`Twig::apply`] call: it reads `twig.config.*` from the working directory
//! first. A missing or broken file leaves the environment unconfigured and
//! is reported through `tracing`, never as an error.

mod environment;
mod error;
mod extension;
pub mod loader;
pub mod options;
mod render;

pub use environment::Twig;
pub use error::{ConfigError, LoaderError, RenderError};
pub use extension::{Callable, Extensions, TwigFilter, TwigFunction};
pub use loader::{FilesystemLoader, MAIN_NAMESPACE};
pub use options::{
    load_options_file, retrieve_options, retrieve_options_in, TwigOptions, CONFIG_FILE_NAMES,
};
pub use render::Settings;

// Re-export the engine types that appear in public signatures.
pub use minijinja::{Environment, Error, ErrorKind, Value};
