use crate::ApiError;
use anyhow::Result;
use reqwest::{Response, StatusCode};
use tracing::warn;

/// Check the response status and turn failures into an [`ApiError`].
/// Returns Ok(Response) if successful.
pub async fn check_response_error(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let response_text = response
        .text()
        .await
        .map_err(|e| ApiError::NetworkError(e.to_string()))?;

    warn!("Upstream API error: {} - {}", status, response_text);

    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication(response_text),
        _ => ApiError::Status {
            status: status.as_u16(),
            body: response_text,
        },
    };

    Err(error.into())
}

/// Map a transport error from reqwest onto the shared error type
pub fn classify_request_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::NetworkError(error.to_string())
    }
}
