//! Maps the shared `ErrorKind` taxonomy onto HTTP status codes (§7) without
//! leaking internals into the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use ingest_core::ErrorKind;
use ingest_pipelines::IngestError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(pub ErrorKind, pub String);

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        ApiError(err.kind, err.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { error: self.1 })).into_response()
    }
}

pub fn kind_status(kind: ErrorKind) -> StatusCode {
    StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
