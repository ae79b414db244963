//! Asynchronous rendering on a [`Twig`] handle.
//!
//! The render context is any serializable map. Before it reaches the engine
//! a `settings` entry is added to it, holding the settings passed to
//! [`Twig::render_with_settings`] (an empty map for [`Twig::render`]):
//!
//! ```text
//! context  { "name": "World" }
//! settings { "locale": "fr" }
//! engine   { "name": "World", "settings": { "locale": "fr" } }
//! ```
//!
//! Rendering itself is synchronous inside minijinja, so it runs on tokio's
//! blocking pool. The returned future always completes: with the rendered
//! text, or with the [`RenderError`] that stopped it.

use std::sync::Arc;

use minijinja::Value;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::environment::{read_lock, Twig};
use crate::error::RenderError;

/// Engine settings exposed to templates as `settings`.
pub type Settings = Map<String, JsonValue>;

impl Twig {
    /// Renders `template` against `context` with empty settings.
    ///
    /// `context` must serialize to a map; `()` is accepted as "no variables".
    pub async fn render<C>(&self, template: &str, context: &C) -> Result<String, RenderError>
    where
        C: Serialize + ?Sized,
    {
        self.render_with_settings(template, context, Settings::new())
            .await
    }

    /// Renders `template` against `context`, exposing `settings` to the template.
    ///
    /// A `settings` key already present in `context` is replaced.
    pub async fn render_with_settings<C>(
        &self,
        template: &str,
        context: &C,
        settings: Settings,
    ) -> Result<String, RenderError>
    where
        C: Serialize + ?Sized,
    {
        let vars = build_context(context, settings)?;
        let env = Arc::clone(&self.env);
        let name = template.to_string();

        tokio::task::spawn_blocking(move || -> Result<String, RenderError> {
            let env = read_lock(&env);
            let tmpl = env.get_template(&name)?;
            Ok(tmpl.render(Value::from_serialize(&vars))?)
        })
        .await
        .map_err(|err| RenderError::OperationError(err.to_string()))?
    }
}

/// Serializes `context` into a variable map and adds `settings` to it.
pub(crate) fn build_context<C>(context: &C, settings: Settings) -> Result<Settings, RenderError>
where
    C: Serialize + ?Sized,
{
    let mut vars = match serde_json::to_value(context)? {
        JsonValue::Object(map) => map,
        JsonValue::Null => Map::new(),
        other => {
            return Err(RenderError::ContextError(format!(
                "render context must be a map, got {}",
                json_kind(&other)
            )))
        }
    };
    vars.insert("settings".to_string(), JsonValue::Object(settings));
    Ok(vars)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_context_adds_settings() {
        let mut settings = Settings::new();
        settings.insert("locale".into(), json!("fr"));

        let vars = build_context(&json!({ "name": "World" }), settings).unwrap();
        assert_eq!(
            JsonValue::Object(vars),
            json!({ "name": "World", "settings": { "locale": "fr" } })
        );
    }

    #[test]
    fn test_build_context_settings_always_present() {
        let vars = build_context(&(), Settings::new()).unwrap();
        assert_eq!(JsonValue::Object(vars), json!({ "settings": {} }));
    }

    #[test]
    fn test_build_context_settings_override_context() {
        let vars = build_context(&json!({ "settings": "shadowed" }), Settings::new()).unwrap();
        assert_eq!(vars["settings"], json!({}));
    }

    #[test]
    fn test_build_context_rejects_non_map() {
        let err = build_context(&vec![1, 2, 3], Settings::new()).unwrap_err();
        assert!(matches!(err, RenderError::ContextError(_)));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_build_context_accepts_structs() {
        #[derive(Serialize)]
        struct Page {
            title: String,
        }

        let vars = build_context(&Page { title: "Home".into() }, Settings::new()).unwrap();
        assert_eq!(vars["title"], json!("Home"));
    }
}
