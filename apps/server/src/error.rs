use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use vnmarket_core::errors::Error as CoreError;
use vnmarket_core::ServiceErrorKind;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    kind: ServiceErrorKind,
    message: String,
}

impl ApiError {
    fn kind(&self) -> ServiceErrorKind {
        match self {
            ApiError::Core(e) => e.kind(),
            ApiError::BadRequest(_) => ServiceErrorKind::Invalid,
        }
    }
}

pub fn status_for(kind: ServiceErrorKind) -> StatusCode {
    match kind {
        ServiceErrorKind::NotFound | ServiceErrorKind::NoData => StatusCode::NOT_FOUND,
        ServiceErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
        ServiceErrorKind::Unavailable | ServiceErrorKind::StoreUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ServiceErrorKind::Conflict => StatusCode::CONFLICT,
        ServiceErrorKind::Invalid => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        let retry_after = match &self {
            ApiError::Core(CoreError::UpstreamThrottled {
                retry_after: Some(wait),
                ..
            }) => Some(wait.as_secs().max(1)),
            _ => None,
        };

        let body = Json(ErrorBody {
            code: status.as_u16(),
            kind,
            message: self.to_string(),
        });
        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
