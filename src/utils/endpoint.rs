//! Provider endpoint construction
//!
//! Providers are configured with a base URL that may or may not carry a
//! trailing slash; endpoints are built against the normalized form.

use url::Url;

/// Strip trailing slashes from a provider base URL
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path
pub fn build_endpoint_url(base_url: &str, endpoint: &str) -> String {
    let base = normalize_base_url(base_url);
    let endpoint = endpoint.trim().trim_start_matches('/');
    format!("{}/{}", base, endpoint)
}

/// Chat-completions endpoint for an OpenAI-compatible provider
pub fn build_chat_completions_endpoint(base_url: &str) -> String {
    build_endpoint_url(base_url, "chat/completions")
}

/// Validate that a provider base URL is a well-formed absolute URL
pub fn validate_base_url(base_url: &str) -> Result<(), String> {
    Url::parse(base_url.trim()).map_err(|e| format!("invalid base URL {:?}: {}", base_url, e))?;
    Ok(())
}
