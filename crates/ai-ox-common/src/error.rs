use thiserror::Error;

/// Common errors that can occur while talking to an upstream over HTTP
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

/// Parse error response from HTTP status and body
pub fn parse_error_response(status: reqwest::StatusCode, body: &bytes::Bytes) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    CommonRequestError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract an error message from the JSON error shapes upstreams use
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "..."}}
    if let Some(msg) = json
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(msg.to_string());
    }

    // {"error": "..."}
    if let Some(msg) = json.get("error").and_then(serde_json::Value::as_str) {
        return Some(msg.to_string());
    }

    // Generic message field
    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
