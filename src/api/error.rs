use serde_json::Value;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response. `body` holds the parsed JSON payload when the
    /// server sent one, a JSON string of the raw text otherwise.
    #[error("HTTP {status}: {}", truncate_body(.body))]
    Status { status: u16, body: Value },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &Value) -> String {
    let text = body.to_string();
    if text.len() <= MAX_ERROR_BODY_LENGTH {
        text
    } else {
        format!(
            "{}... (truncated, {} total bytes)",
            &text[..MAX_ERROR_BODY_LENGTH],
            text.len()
        )
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Best human-readable message for an error response. FastAPI puts
    /// validation output under `detail`, which may be a string or a list
    /// of objects with a `msg` field.
    pub fn message(&self) -> String {
        if let ApiError::Status { body, .. } = self {
            for key in ["detail", "message", "error"] {
                match body.get(key) {
                    Some(Value::String(s)) => return s.clone(),
                    Some(Value::Array(items)) => {
                        if let Some(msg) = items
                            .iter()
                            .find_map(|item| item.get("msg").and_then(Value::as_str))
                        {
                            return msg.to_string();
                        }
                    }
                    _ => {}
                }
            }
        }
        self.to_string()
    }
}
