//! Append-only speech accumulation shared by every reply type.
//!
//! Plain and markup statements are kept as separate fragments in arrival
//! order and only merged when a reply is serialized.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Fragment {
    text: String,
    plain: bool,
}

/// Final form of accumulated speech, ready for a channel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speech {
    Plain(String),
    Ssml(String),
}

impl Speech {
    pub fn as_str(&self) -> &str {
        match self {
            Speech::Plain(s) | Speech::Ssml(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechBuffer {
    fragments: Vec<Fragment>,
}

impl SpeechBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement. Empty statements are ignored.
    pub fn push(&mut self, text: &str, plain: bool) {
        let text = if plain { text.trim() } else { strip_speak(text) };
        if text.is_empty() {
            return;
        }
        self.fragments.push(Fragment {
            text: text.to_string(),
            plain,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn has_markup(&self) -> bool {
        self.fragments.iter().any(|f| !f.plain)
    }

    /// All fragments as display text: markup tags stripped, joined by spaces.
    pub fn plain_text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| {
                if f.plain {
                    f.text.clone()
                } else {
                    strip_tags(&f.text)
                }
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// All fragments wrapped in a single `<speak>` document. Plain fragments
    /// are escaped so they cannot inject markup; markup fragments keep their
    /// tags and entities but get bare ampersands escaped, since view values
    /// such as user names are interpolated into them verbatim.
    pub fn ssml(&self) -> String {
        let body = self
            .fragments
            .iter()
            .map(|f| {
                if f.plain {
                    escape_xml(&f.text)
                } else {
                    escape_bare_ampersands(&f.text)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("<speak>{body}</speak>")
    }

    /// Merge: SSML as soon as one markup fragment exists, plain text otherwise.
    pub fn render(&self) -> Option<Speech> {
        if self.is_empty() {
            None
        } else if self.has_markup() {
            Some(Speech::Ssml(self.ssml()))
        } else {
            Some(Speech::Plain(self.plain_text()))
        }
    }
}

fn strip_speak(text: &str) -> &str {
    let t = text.trim();
    let t = t.strip_prefix("<speak>").unwrap_or(t);
    let t = t.strip_suffix("</speak>").unwrap_or(t);
    t.trim()
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#x[0-9A-Fa-f]+);")
            .unwrap_or_else(|e| unreachable!("entity pattern is valid: {e}"))
    })
}

fn escape_bare_ampersands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if entity().is_match(after) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
