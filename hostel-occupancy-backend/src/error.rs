use bytes::Bytes;
use hostel_occupancy_config::ConfigError;
use hostel_occupancy_database::DatabaseError;
use hostel_occupancy_ledger::LedgerError;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    File(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid form: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
    #[error("failed to read request body: {0}")]
    Body(BoxError),
    #[error("webserver error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("failed to set up logging: {0}")]
    Tracing(BoxError),
    #[error("missing or invalid caller identity")]
    MissingIdentity,
    #[error("expected an application/x-www-form-urlencoded body")]
    UnsupportedMediaType,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::Form(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Ledger(error) => match error {
                LedgerError::Unauthorized => StatusCode::FORBIDDEN,
                LedgerError::RoomNotFound(_)
                | LedgerError::StudentNotFound(_)
                | LedgerError::RequestNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::RoomFull { .. }
                | LedgerError::RequestNotPending { .. }
                | LedgerError::CapacityBelowOccupancy { .. } => StatusCode::CONFLICT,
                LedgerError::EmptyReason
                | LedgerError::InvalidAmount
                | LedgerError::InvalidCapacity => StatusCode::BAD_REQUEST,
                LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::File(_)
            | Self::Json(_)
            | Self::Hyper(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::Tracing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server faults are logged but not shown to the caller.
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let message = if status.is_server_error() {
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        let body = serde_json::to_vec(&ErrorBody { error: &message })
            .unwrap_or_else(|_| br#"{"error":"internal server error"}"#.to_vec());
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

#[cfg(test)]
mod tests {
    use hostel_occupancy_ledger::model::{RequestId, RequestStatus};

    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let cases = [
            (LedgerError::Unauthorized, StatusCode::FORBIDDEN),
            (
                LedgerError::RequestNotFound(RequestId(4)),
                StatusCode::NOT_FOUND,
            ),
            (
                LedgerError::RoomFull {
                    room: "A-101".to_owned(),
                    capacity: 2,
                },
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::RequestNotPending {
                    request: RequestId(4),
                    status: RequestStatus::Approved,
                },
                StatusCode::CONFLICT,
            ),
            (LedgerError::EmptyReason, StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }

    #[test]
    fn response_encoding_failure_is_a_server_fault() {
        let json_error = serde_json::from_str::<u32>("\"not a number\"").unwrap_err();
        let app_error = AppError::from(json_error);
        assert_eq!(app_error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = app_error.into_response();
        assert!(!format!("{:?}", response.body()).contains("not a number"));
    }

    #[test]
    fn store_faults_are_not_leaked() {
        let response =
            AppError::from(LedgerError::store("connection reset by peer")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = format!("{:?}", response.body());
        assert!(!body.contains("connection reset"));
    }
}
