//! User-defined filters and functions.
//!
//! Both are backed by a [`Callable`] taking the call's arguments as a slice
//! of minijinja values. For a filter, `args[0]` is the piped value and the
//! explicit arguments follow:
//!
//! ```text
//! {{ title | shout("!") }}   ->  args == [title, "!"]
//! {{ asset("app.css") }}     ->  args == ["app.css"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::Rest;
use minijinja::{Environment, Error, Value};

/// Shared implementation of a filter or function.
pub type Callable = Arc<dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static>;

/// A named filter, invoked as `{{ value | name(args...) }}`.
#[derive(Clone)]
pub struct TwigFilter {
    name: String,
    callable: Callable,
}

impl TwigFilter {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callable: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the filter, replacing any filter of the same name.
    pub(crate) fn register(&self, env: &mut Environment<'static>) {
        let callable = Arc::clone(&self.callable);
        env.add_filter(
            self.name.clone(),
            move |value: Value, rest: Rest<Value>| -> Result<Value, Error> {
                let mut args = Vec::with_capacity(rest.len() + 1);
                args.push(value);
                args.extend(rest.iter().cloned());
                callable(args.as_slice())
            },
        );
    }
}

impl fmt::Debug for TwigFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwigFilter").field("name", &self.name).finish()
    }
}

/// A named function, invoked as `{{ name(args...) }}`.
#[derive(Clone)]
pub struct TwigFunction {
    name: String,
    callable: Callable,
}

impl TwigFunction {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callable: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the function, replacing any function of the same name.
    pub(crate) fn register(&self, env: &mut Environment<'static>) {
        let callable = Arc::clone(&self.callable);
        env.add_function(
            self.name.clone(),
            move |args: Rest<Value>| -> Result<Value, Error> { callable(args.as_slice()) },
        );
    }
}

impl fmt::Debug for TwigFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwigFunction").field("name", &self.name).finish()
    }
}

/// Filters and functions to register on an environment, keyed by name.
///
/// Adding a name twice keeps the last callable.
///
/// ```rust
/// use twig_render::{Extensions, Value};
///
/// let extensions = Extensions::new()
///     .filter("shout", |args| {
///         Ok(Value::from(args[0].to_string().to_uppercase()))
///     })
///     .function("year", |_| Ok(Value::from(2024)));
///
/// assert_eq!(extensions.filter_names(), vec!["shout"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    filters: BTreeMap<String, TwigFilter>,
    functions: BTreeMap<String, TwigFunction>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter under `name`.
    pub fn filter<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.with_filter(TwigFilter::new(name, f))
    }

    /// Adds a function under `name`.
    pub fn function<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.with_function(TwigFunction::new(name, f))
    }

    pub fn with_filter(mut self, filter: TwigFilter) -> Self {
        self.filters.insert(filter.name.clone(), filter);
        self
    }

    pub fn with_function(mut self, function: TwigFunction) -> Self {
        self.functions.insert(function.name.clone(), function);
        self
    }

    pub fn filters(&self) -> impl Iterator<Item = &TwigFilter> {
        self.filters.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &TwigFunction> {
        self.functions.values()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(env: &Environment<'static>, source: &str) -> Result<String, Error> {
        env.render_str(source, minijinja::context! { name => "world" })
    }

    #[test]
    fn test_filter_receives_value_then_arguments() {
        let mut env = Environment::new();
        TwigFilter::new("wrap", |args| {
            let value = args[0].to_string();
            let mark = args.get(1).map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::from(format!("{mark}{value}{mark}")))
        })
        .register(&mut env);

        assert_eq!(render(&env, "{{ name | wrap('*') }}").unwrap(), "*world*");
        assert_eq!(render(&env, "{{ name | wrap }}").unwrap(), "world");
    }

    #[test]
    fn test_function_receives_arguments() {
        let mut env = Environment::new();
        TwigFunction::new("count_args", |args| Ok(Value::from(args.len())))
            .register(&mut env);

        assert_eq!(render(&env, "{{ count_args() }}").unwrap(), "0");
        assert_eq!(render(&env, "{{ count_args(1, name, 3) }}").unwrap(), "3");
    }

    #[test]
    fn test_callable_error_propagates() {
        let mut env = Environment::new();
        TwigFunction::new("fail", |_| {
            Err(Error::new(minijinja::ErrorKind::InvalidOperation, "boom"))
        })
        .register(&mut env);

        let err = render(&env, "{{ fail() }}").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_register_overwrites_same_name() {
        let mut env = Environment::new();
        TwigFilter::new("tag", |_| Ok(Value::from("first"))).register(&mut env);
        TwigFilter::new("tag", |_| Ok(Value::from("second"))).register(&mut env);

        assert_eq!(render(&env, "{{ name | tag }}").unwrap(), "second");
    }

    #[test]
    fn test_extensions_last_insert_wins() {
        let extensions = Extensions::new()
            .function("a", |_| Ok(Value::from(1)))
            .function("a", |_| Ok(Value::from(2)))
            .filter("b", |args| Ok(args[0].clone()));

        assert_eq!(extensions.function_names(), vec!["a"]);
        assert_eq!(extensions.filter_names(), vec!["b"]);
        assert!(!extensions.is_empty());
        assert!(Extensions::new().is_empty());

        let mut env = Environment::new();
        for function in extensions.functions() {
            function.register(&mut env);
        }
        assert_eq!(render(&env, "{{ a() }}").unwrap(), "2");
    }
}
