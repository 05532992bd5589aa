//! Routing-signal extraction
//!
//! Classification only needs the user's intent, not the whole request:
//! the latest user message plus a bounded hint of earlier conversation,
//! with large code blocks collapsed so they don't drown the classifier's
//! context window.

use crate::core::types::ProxyRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Earlier user messages carried into the history hint
const MAX_HISTORY_MESSAGES: usize = 3;

/// Per-message cap within the history hint
const MAX_HISTORY_CHARS: usize = 500;

/// Code blocks at or above this line count are collapsed
const CODE_BLOCK_KEEP_LINES: usize = 10;

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(\w*)\n(.*?)```").expect("valid code block regex"));

/// What the classifier sees
#[derive(Debug, Clone, Default)]
pub struct RoutingSignal {
    /// The latest user message, denoised
    pub intent_text: String,
    /// Bounded earlier conversation, when any exists
    pub history_hint: Option<String>,
}

impl RoutingSignal {
    pub fn is_empty(&self) -> bool {
        self.intent_text.trim().is_empty()
    }
}

/// Extract the routing signal from a chat-completions or responses-API body
pub fn build_routing_signal(request: &ProxyRequest) -> RoutingSignal {
    let body = &request.body;

    // Responses API: `input` (string or item array) or bare `text`
    if body.get("input").is_some() || body.get("text").map(Value::is_string) == Some(true) {
        let input = body.get("input").unwrap_or_else(|| &body["text"]);
        return RoutingSignal {
            intent_text: denoise(&extract_responses_input(input)),
            history_hint: None,
        };
    }

    // Chat completions API: `messages`
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut user_texts: Vec<String> = messages
        .iter()
        .filter(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .map(|m| extract_message_content(m.get("content").unwrap_or(&Value::Null)))
        .filter(|text| !text.trim().is_empty())
        .collect();

    let intent = user_texts.pop().unwrap_or_default();
    let history_hint = build_history_hint(&user_texts);

    RoutingSignal {
        intent_text: denoise(&intent),
        history_hint,
    }
}

/// Flatten a message `content` field: plain string, or an array of parts
/// carrying `text`
fn extract_message_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Flatten a responses-API `input` value
fn extract_responses_input(input: &Value) -> String {
    match input {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let mut texts = Vec::new();
            for item in items {
                if item.get("type").and_then(Value::as_str) == Some("message") {
                    if let Some(parts) = item.get("content").and_then(Value::as_array) {
                        for part in parts {
                            if let Some(text) = part.get("text").and_then(Value::as_str) {
                                texts.push(text.to_string());
                            } else if let Some(text) = part.get("content").and_then(Value::as_str) {
                                texts.push(text.to_string());
                            }
                        }
                    }
                } else if let Some(text) = item.get("text").and_then(Value::as_str) {
                    texts.push(text.to_string());
                }
            }
            let joined = texts.join("\n").trim().to_string();
            if joined.is_empty() {
                input.to_string()
            } else {
                joined
            }
        }
        _ => input.to_string(),
    }
}

/// Join the last few earlier user messages into a compact hint
fn build_history_hint(earlier: &[String]) -> Option<String> {
    if earlier.is_empty() {
        return None;
    }

    let recent = earlier
        .iter()
        .rev()
        .take(MAX_HISTORY_MESSAGES)
        .rev()
        .map(|text| {
            let trimmed = text.trim();
            if trimmed.chars().count() > MAX_HISTORY_CHARS {
                let clipped: String = trimmed.chars().take(MAX_HISTORY_CHARS).collect();
                format!("{}…", clipped)
            } else {
                trimmed.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!(
        "Earlier conversation (oldest first):\n{}",
        recent
    ))
}

/// Collapse long fenced code blocks to a placeholder
fn denoise(text: &str) -> String {
    CODE_BLOCK_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let lang = &caps[1];
            let code = &caps[2];
            let lines = code.lines().count();
            if lines < CODE_BLOCK_KEEP_LINES {
                caps[0].to_string()
            } else {
                format!("```{}\n[code omitted: {} lines]\n```", lang, lines)
            }
        })
        .trim()
        .to_string()
}
