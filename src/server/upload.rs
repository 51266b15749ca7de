//! ULog upload and summary endpoint

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, info};

use super::AppState;
use crate::TelemetryError;
use crate::ulog::{self, LogSummary};

/// Successful upload response
#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    pub data: LogSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Upload failures, split by who is at fault
#[derive(Debug)]
pub enum UploadError {
    /// Malformed request or wrong file type (400)
    BadRequest(String),
    /// The file was accepted but could not be parsed (500)
    Parse(TelemetryError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            UploadError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            UploadError::Parse(err) => {
                error!("Error parsing ULOG file: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, failure_message(&err))
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// User-facing explanation of a parse failure
pub fn failure_message(err: &TelemetryError) -> String {
    let detail = match err {
        TelemetryError::InvalidLog { .. } => "This file does not appear to be a valid ULOG file. \
             Please ensure you are uploading a PX4 ULOG (.ulg) file."
            .to_string(),
        TelemetryError::Corrupted { .. } => {
            "The ULOG file appears to be corrupted or incomplete.".to_string()
        }
        other => other.to_string(),
    };
    format!("Error parsing ULOG file. {detail}")
}

/// Parse an uploaded `.ulg` file (multipart field `file`)
pub async fn parse_ulog(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ParseResponse>, UploadError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::BadRequest(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::BadRequest(format!("Failed to read file: {e}")))?;
        upload = Some((file_name, data));
        break;
    }

    let Some((file_name, data)) = upload else {
        return Err(UploadError::BadRequest("No file provided".to_string()));
    };

    if ulog::check_file_name(&file_name).is_err() {
        return Err(UploadError::BadRequest("File must be a ULOG file (.ulg)".to_string()));
    }

    info!(%file_name, size = data.len(), "Parsing uploaded ULog file");

    let max_samples = state.config.max_samples_per_message;
    let summary = tokio::task::spawn_blocking(move || LogSummary::from_bytes(data.to_vec(), max_samples))
        .await
        .map_err(|e| UploadError::Parse(TelemetryError::parse_error("ULog upload", e.to_string())))?
        .map_err(UploadError::Parse)?;

    Ok(Json(ParseResponse { success: true, data: summary }))
}
