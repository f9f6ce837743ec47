//! HTTP plumbing shared by the provider clients.

use std::time::Duration;

use reqwest::{Client, Response};
use rivalscope_shared::{Result, RivalscopeError};
use url::Url;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("rivalscope/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body echoed back into an error message.
const MAX_ERROR_BODY: usize = 500;

/// Build a reqwest client with appropriate settings.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RivalscopeError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join an API path onto a configured base URL without dropping its own path.
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Turn a non-2xx response into a provider error carrying (part of) the body.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    Err(RivalscopeError::provider(
        provider,
        format!("HTTP {status}: {excerpt}"),
    ))
}
