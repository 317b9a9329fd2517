use axum::http::StatusCode;
use axum::Json;
use pulse_core::OriginError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
}

pub fn map_origin_error(err: &OriginError) -> (StatusCode, Json<ErrorEnvelope>) {
    let code = match err {
        OriginError::Request { .. } => "origin_unreachable",
        OriginError::Status { .. } => "origin_error",
        OriginError::Decode { .. } => "origin_invalid_response",
    };
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorEnvelope {
            code,
            message: err.to_string(),
        }),
    )
}
