//! Channel-agnostic content directives.
//!
//! `Transition::reply` and `Transition::reprompt` are applied through these
//! before any channel directive runs, so channel directives that need prior
//! content (media responses, suggestions) always find it.

use async_trait::async_trait;
use serde_json::Value;

use parley_core::directive::ANY_PLATFORM;
use parley_core::render::json_kind;
use parley_core::{ContentSource, Directive, DirectiveContext, ParleyError, Reply, Result};

/// Statement content: a view path or literal text.
pub struct Say {
    content: ContentSource<String>,
    plain: bool,
}

impl Say {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
            plain: false,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ContentSource::Literal(text.into()),
            plain: true,
        }
    }
}

#[async_trait]
impl Directive for Say {
    fn key(&self) -> &'static str {
        "say"
    }

    fn platform(&self) -> &'static str {
        ANY_PLATFORM
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let rendered = self.content.resolve(ctx).await?;
        let path = match &self.content {
            ContentSource::View(p) => p.as_str(),
            ContentSource::Literal(_) => "<literal>",
        };
        write_view(reply, path, rendered, self.plain)
    }
}

/// Reprompt content: a view path or literal text.
pub struct Reprompt {
    content: ContentSource<String>,
    plain: bool,
}

impl Reprompt {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
            plain: false,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ContentSource::Literal(text.into()),
            plain: true,
        }
    }
}

#[async_trait]
impl Directive for Reprompt {
    fn key(&self) -> &'static str {
        "reprompt"
    }

    fn platform(&self) -> &'static str {
        ANY_PLATFORM
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        match self.content.resolve(ctx).await? {
            Value::String(s) => {
                reply.add_reprompt(&s, self.plain);
                Ok(())
            }
            other => Err(ParleyError::render(
                self.view_path(),
                format!("reprompt must render to text, got {}", json_kind(&other)),
            )),
        }
    }
}

impl Reprompt {
    fn view_path(&self) -> &str {
        match &self.content {
            ContentSource::View(p) => p,
            ContentSource::Literal(_) => "<literal>",
        }
    }
}

/// Write a rendered view into the reply.
///
/// A string is one statement. An object may carry `say`, `ask` and `tell`
/// (string or list of strings) as statements, and `reprompt`.
fn write_view(reply: &mut dyn Reply, path: &str, rendered: Value, plain: bool) -> Result<()> {
    match rendered {
        Value::String(s) => {
            reply.add_statement(&s, plain);
            Ok(())
        }
        Value::Object(map) => {
            let mut wrote = false;
            for key in ["say", "ask", "tell"] {
                if let Some(v) = map.get(key) {
                    for line in text_lines(path, key, v)? {
                        reply.add_statement(line, plain);
                        wrote = true;
                    }
                }
            }
            if let Some(v) = map.get("reprompt") {
                for line in text_lines(path, "reprompt", v)? {
                    reply.add_reprompt(line, plain);
                    wrote = true;
                }
            }
            if wrote {
                Ok(())
            } else {
                Err(ParleyError::render(
                    path,
                    "view object has none of say/ask/tell/reprompt",
                ))
            }
        }
        other => Err(ParleyError::render(
            path,
            format!("expected text or object, got {}", json_kind(&other)),
        )),
    }
}

fn text_lines<'v>(path: &str, key: &str, v: &'v Value) -> Result<Vec<&'v str>> {
    match v {
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|i| {
                i.as_str().ok_or_else(|| {
                    ParleyError::render(path, format!("{key} entries must be text"))
                })
            })
            .collect(),
        other => Err(ParleyError::render(
            path,
            format!("{key} must be text, got {}", json_kind(other)),
        )),
    }
}
