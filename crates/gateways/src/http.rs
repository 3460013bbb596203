use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::GatewayError;

/// Shared outbound client. Every processor call is bounded by `timeout`.
pub fn build_http_client(timeout: Duration) -> Result<Client, GatewayError> {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Read the whole body as text, keeping the status for the caller to judge.
pub(crate) async fn read_body(response: Response) -> Result<(reqwest::StatusCode, String), GatewayError> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

/// Parse a JSON body, naming the processor when it is not JSON at all.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    processor: &str,
    body: &str,
) -> Result<T, GatewayError> {
    serde_json::from_str(body)
        .map_err(|e| GatewayError::Malformed(format!("{processor} returned invalid JSON: {e}")))
}

/// Strip a trailing slash so paths can be appended with `format!`.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
