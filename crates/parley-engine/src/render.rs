use std::sync::OnceLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;

use parley_core::{ParleyError, RenderScope, Renderer, Result};

/// Renderer backed by a JSON view tree.
///
/// View paths are dot-separated keys (`"Launch.Welcome"`). Strings inside
/// the resolved view may reference `{variable}` placeholders, looked up in
/// the session model first and the event's params second (or in the
/// explicit data for [`RenderScope::Data`]). Dotted variable names walk
/// nested objects.
pub struct JsonViews {
    views: Value,
}

impl JsonViews {
    pub fn new(views: Value) -> Self {
        Self { views }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ParleyError::Config(format!("cannot read views file {path}: {e}")))?;
        let views: Value = serde_json::from_str(&raw)?;
        if !views.is_object() {
            return Err(ParleyError::Config(format!(
                "views file {path} must contain a JSON object"
            )));
        }
        Ok(Self::new(views))
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        walk(&self.views, path)
    }
}

fn walk<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(root, |node, key| node.as_object()?.get(key))
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\}")
            .unwrap_or_else(|e| unreachable!("placeholder pattern is valid: {e}"))
    })
}

fn variable<'a>(scope: &RenderScope<'a>, name: &str) -> Option<&'a Value> {
    match *scope {
        RenderScope::Turn { event, model } => {
            let (head, rest) = match name.split_once('.') {
                Some((h, r)) => (h, Some(r)),
                None => (name, None),
            };
            let root = model.get(head).or_else(|| event.param(head))?;
            match rest {
                Some(r) => walk(root, r),
                None => Some(root),
            }
        }
        RenderScope::Data(data) => walk(data, name),
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn interpolate(path: &str, view: &Value, scope: &RenderScope<'_>) -> Result<Value> {
    match view {
        Value::String(s) => {
            let mut missing: Option<String> = None;
            let out = placeholder().replace_all(s, |caps: &Captures<'_>| {
                let name = &caps[1];
                match variable(scope, name) {
                    Some(v) => display(v),
                    None => {
                        missing.get_or_insert_with(|| name.to_string());
                        String::new()
                    }
                }
            });
            match missing {
                Some(name) => Err(ParleyError::render(path, format!("unknown variable {name}"))),
                None => Ok(Value::String(out.into_owned())),
            }
        }
        Value::Array(items) => items
            .iter()
            .map(|i| interpolate(path, i, scope))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), interpolate(path, v, scope)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[async_trait]
impl Renderer for JsonViews {
    async fn render(&self, path: &str, scope: RenderScope<'_>) -> Result<Value> {
        let view = self
            .lookup(path)
            .ok_or_else(|| ParleyError::render(path, "view not found"))?;
        interpolate(path, view, &scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{DialogEvent, SessionModel};
    use serde_json::json;

    fn views() -> JsonViews {
        JsonViews::new(json!({
            "Launch": {
                "Welcome": "Hello {name}! Welcome back.",
                "Card": { "title": "Hi {name}", "plays": "{stats.plays}" }
            },
            "Weather": { "Report": "It is sunny in {city}." }
        }))
    }

    #[tokio::test]
    async fn model_fields_and_params_fill_placeholders() {
        let mut model = SessionModel::new("launch");
        model.set("name", "Ann");
        model.set("stats", json!({ "plays": 7 }));
        let event = DialogEvent::new("test", "WeatherIntent").with_param("city", "Lisbon");
        let scope = RenderScope::Turn {
            event: &event,
            model: &model,
        };

        let r = views();
        assert_eq!(
            r.render_text("Launch.Welcome", scope).await.unwrap(),
            "Hello Ann! Welcome back."
        );
        assert_eq!(
            r.render_text("Weather.Report", scope).await.unwrap(),
            "It is sunny in Lisbon."
        );
        let card = r.render("Launch.Card", scope).await.unwrap();
        assert_eq!(card, json!({ "title": "Hi Ann", "plays": "7" }));
    }

    #[tokio::test]
    async fn explicit_data_scope() {
        let data = json!({ "name": "Bo" });
        let out = views()
            .render_text("Launch.Welcome", RenderScope::Data(&data))
            .await
            .unwrap();
        assert_eq!(out, "Hello Bo! Welcome back.");
    }

    #[tokio::test]
    async fn missing_view_and_variable_are_render_errors() {
        let data = json!({});
        let r = views();
        let err = r.render("Nope.Missing", RenderScope::Data(&data)).await.unwrap_err();
        assert_eq!(err.code(), "RENDER_ERROR");

        let err = r.render("Launch.Welcome", RenderScope::Data(&data)).await.unwrap_err();
        assert!(err.to_string().contains("unknown variable name"));

        let err = r.render_text("Launch.Card", RenderScope::Data(&json!({"name": "x", "stats": {"plays": 1}}))).await.unwrap_err();
        assert!(err.to_string().contains("expected text"));
    }
}
