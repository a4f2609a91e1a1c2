//! Inbound frame validation.

use callhub_core::error::AppError;
use callhub_core::protocol::{ClientRequest, decode_request};
use validator::Validate;

/// Check size and shape of a raw inbound frame and decode it.
pub fn validate_inbound(raw: &str, max_bytes: usize) -> Result<ClientRequest, AppError> {
    if raw.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_bytes} bytes"
        )));
    }
    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    let request = decode_request(raw)
        .map_err(|e| AppError::validation(format!("Failed to parse message: {e}")))?;
    if let ClientRequest::InitiateCall(body) = &request {
        body.validate()?;
    }
    Ok(request)
}
