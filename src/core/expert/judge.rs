//! LLM-judge classification
//!
//! Builds the classification prompt (template split, ignored-tag filtering,
//! expert-boundary injection), invokes the classifier under an explicit
//! timeout, and parses the reply into a category. Every failure along the
//! way collapses into the single `ClassificationFailed` mode so the caller
//! has exactly one recovery decision to make.

use super::config::{ClassifierConfig, ExpertTarget};
use super::preprocess::RoutingSignal;
use crate::config::ClassifierSettings;
use crate::core::types::ProviderRecord;
use crate::services::classifier::{Classifier, ClassifierRequest};
use crate::utils::error::{GatewayError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Accepted as a bare category when structured output is off
const MAX_BARE_CATEGORY_LEN: usize = 50;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```$").expect("valid fence regex"));

/// Markers a prompt template may use to mark the user-prompt position
const USER_PROMPT_MARKERS: &[&str] = &[
    "---\nUser Prompt:\n{{USER_PROMPT}}\n---",
    "---\nUser Prompt:\n{{user_prompt}}\n---",
    "{{USER_PROMPT}}",
    "{{user_prompt}}",
];

/// Outcome of one classification
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub category: String,
    /// "provider-name/model" label for the decision log
    pub classifier_model: String,
    /// Raw classifier reply, kept for the decision log
    pub raw_response: String,
    pub latency_ms: u64,
}

/// Classify a routing signal against the configured experts.
///
/// `provider` and `model` are the already-resolved classifier backend; any
/// transport, timeout, or parse failure maps to `ClassificationFailed`.
pub async fn classify(
    classifier: &dyn Classifier,
    provider: &ProviderRecord,
    model: &str,
    config: &ClassifierConfig,
    defaults: &ClassifierSettings,
    signal: &RoutingSignal,
    experts: &[ExpertTarget],
) -> Result<RouteDecision> {
    let started = Instant::now();

    let mut user_prompt = signal.intent_text.clone();
    if !config.ignored_tags.is_empty() {
        user_prompt = filter_ignored_tags(&user_prompt, &config.ignored_tags);
    }

    let (template_system, user_prompt) = match &config.system_prompt {
        Some(system) => {
            let (_, user) = process_prompt_template(
                config.prompt_template.as_deref().unwrap_or("{{USER_PROMPT}}"),
                &user_prompt,
            );
            (system.clone(), user)
        }
        None => process_prompt_template(
            config.prompt_template.as_deref().unwrap_or_default(),
            &user_prompt,
        ),
    };

    let user_prompt = match &signal.history_hint {
        Some(hint) => format!("{}\n\n---\nLatest User Prompt:\n{}", hint, user_prompt),
        None => user_prompt,
    };

    let system_prompt = build_system_prompt(&template_system, experts);

    let timeout = config
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| defaults.timeout());

    let request = ClassifierRequest {
        provider: provider.clone(),
        model: model.to_string(),
        system_prompt,
        user_prompt,
        temperature: config.temperature.unwrap_or(defaults.temperature),
        max_tokens: config.max_tokens.unwrap_or(defaults.max_tokens),
        timeout,
        structured_output: config.enable_structured_output,
    };

    // The transport sets its own timeout, but a misbehaving implementation
    // must not be able to hold the request open past the budget
    let content = tokio::time::timeout(timeout, classifier.complete(request))
        .await
        .map_err(|_| {
            GatewayError::ClassificationFailed(format!("classifier timed out after {:?}", timeout))
        })?
        .map_err(|e| GatewayError::ClassificationFailed(e.to_string()))?;

    let category = parse_classification(&content, config.enable_structured_output)
        .map_err(GatewayError::ClassificationFailed)?;

    let latency_ms = started.elapsed().as_millis() as u64;
    debug!(category = %category, latency_ms, "classifier decision");

    Ok(RouteDecision {
        category,
        classifier_model: format!("{}/{}", provider.name, model),
        raw_response: content,
        latency_ms,
    })
}

/// Split a prompt template on the user-prompt marker into (system, user)
/// parts; a template without a marker is all system.
pub fn process_prompt_template(template: &str, user_prompt: &str) -> (String, String) {
    for marker in USER_PROMPT_MARKERS {
        if template.contains(marker) {
            let parts: Vec<&str> = template.splitn(2, marker).collect();
            if parts.len() == 2 {
                return (parts[0].trim().to_string(), user_prompt.to_string());
            }
        }
    }
    (template.trim().to_string(), user_prompt.to_string())
}

/// Remove `<tag>...</tag>` blocks for each configured ignored tag
pub fn filter_ignored_tags(text: &str, ignored_tags: &[String]) -> String {
    let mut filtered = text.to_string();
    for tag in ignored_tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        let pattern = format!(
            "(?s){}.*?{}",
            regex::escape(&format!("<{}>", tag)),
            regex::escape(&format!("</{}>", tag))
        );
        if let Ok(re) = Regex::new(&pattern) {
            filtered = re.replace_all(&filtered, "").trim().to_string();
        }
    }
    filtered.trim().to_string()
}

/// Compose the classifier system prompt: base identity, task definition,
/// expert boundaries, and the strict JSON output contract.
pub fn build_system_prompt(base: &str, experts: &[ExpertTarget]) -> String {
    if experts.is_empty() {
        return base.trim().to_string();
    }

    let mut sections: Vec<String> = Vec::new();

    if base.trim().is_empty() {
        sections.push(
            "You are an intelligent router for an LLM gateway. Analyze the user's request and \
             route it to the most suitable expert model based on their capabilities and boundaries."
                .to_string(),
        );
    } else {
        sections.push(base.trim().to_string());
    }

    sections.push(
        "### Task\nAnalyze the user request and classify it into ONE of the available expert \
         categories. Select the expert whose capabilities and boundaries best match the intent \
         and complexity of the request."
            .to_string(),
    );

    sections.push("### Available Experts & Boundaries".to_string());
    for (index, expert) in experts.iter().enumerate() {
        let category = expert.category.trim();
        if category.is_empty() {
            continue;
        }
        let boundary = expert
            .boundary_text()
            .unwrap_or("General purpose handling for this category.");
        sections.push(format!(
            "{}. Category: {:?}\n   Boundary/Capabilities: {}",
            index + 1,
            category,
            boundary
        ));
    }

    sections.push(
        "### Output Format\nReturn a strictly valid JSON object with no markdown formatting or \
         explanation outside the JSON:\n{\n  \"type\": \"the exact category name from the list \
         above\"\n}"
            .to_string(),
    );

    sections.join("\n\n")
}

/// Strip a surrounding markdown code fence, if any
pub fn clean_markdown_fence(content: &str) -> String {
    let trimmed = content.trim();
    match FENCE_RE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Parse the classifier reply into a category.
///
/// JSON with a `type` (or `category`) field is the contract; single quotes
/// are normalized first. When structured output is off, a short plain-text
/// reply is accepted as a bare category.
pub fn parse_classification(
    content: &str,
    structured_output: bool,
) -> std::result::Result<String, String> {
    let cleaned = clean_markdown_fence(content);
    let normalized = cleaned.replace('\'', "\"");

    if let Ok(json) = serde_json::from_str::<Value>(&normalized) {
        let category = json
            .get("type")
            .or_else(|| json.get("category"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return match category {
            Some(category) if !category.is_empty() => Ok(category),
            _ => Err(format!(
                "classifier reply is missing a \"type\" field: {}",
                truncate(&cleaned, 100)
            )),
        };
    }

    if !structured_output && cleaned.len() < MAX_BARE_CATEGORY_LEN && !cleaned.contains('{') {
        return Ok(cleaned);
    }

    Err(format!(
        "failed to parse classification result: {}",
        truncate(&cleaned, 100)
    ))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
