//! Turning a free-form LLM answer into a description and a picture URL.
//!
//! Models asked for JSON often wrap it in prose or code fences, so the first
//! brace-delimited snippet is pulled out and parsed. Anything unparseable
//! falls back to the raw text as the description.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// How the biography was recovered from the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    RawText,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBiography {
    pub description: String,
    /// Empty when the model gave none
    pub picture_url: String,
    pub format: ResponseFormat,
}

#[derive(Deserialize)]
struct BiographyPayload {
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    picture_url: Option<serde_json::Value>,
}

fn json_snippet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[\s\S]*?\}").expect("regex for JSON snippet"))
}

/// First non-greedy `{...}` snippet in `text`, if any.
pub fn extract_json_snippet(text: &str) -> Option<&str> {
    json_snippet_regex().find(text).map(|m| m.as_str())
}

fn value_as_text(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn parse_biography(text: &str) -> ParsedBiography {
    let parsed = extract_json_snippet(text)
        .and_then(|snippet| serde_json::from_str::<BiographyPayload>(snippet).ok());

    match parsed {
        Some(payload) => ParsedBiography {
            description: value_as_text(payload.description),
            picture_url: value_as_text(payload.picture_url),
            format: ResponseFormat::Json,
        },
        None => ParsedBiography {
            description: text.to_string(),
            picture_url: String::new(),
            format: ResponseFormat::RawText,
        },
    }
}
