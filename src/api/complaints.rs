//! Public complaint submission.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::notifications::Complaint;
use crate::AppState;

use super::auth::StatusResponse;
use super::error::ApiError;

const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct ComplaintRequest {
    pub subject: Option<String>,
    pub message: String,
    pub contact: Option<String>,
}

/// Accept a complaint and forward it by email
///
/// POST /api/complaints
pub async fn submit_complaint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComplaintRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::validation_field("message", "Message is required"));
    }
    if request.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::validation_field(
            "message",
            format!("Message is too long (max {} characters)", MAX_MESSAGE_CHARS),
        ));
    }

    let complaint = Complaint {
        subject: request.subject,
        message: request.message,
        contact: request.contact,
    };

    // The sender already degrades to a logged no-op when SMTP is not
    // configured; a transport failure should not leak SMTP details
    state
        .email
        .send_complaint(&complaint)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Failed to send complaint email");
            ApiError::service_unavailable("Complaint could not be delivered")
        })?;

    Ok((StatusCode::ACCEPTED, Json(StatusResponse { ok: true })))
}
