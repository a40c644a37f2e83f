use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paperdesk_core::{CollectionError, RetrievalError, SubscriptionError};

/// Every failure a handler can return, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    InvalidPayload(String),
    Collection(CollectionError),
    Retrieval(RetrievalError),
    Subscription(SubscriptionError),
}

impl From<CollectionError> for ApiError {
    fn from(e: CollectionError) -> Self {
        ApiError::Collection(e)
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        ApiError::Retrieval(e)
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(e: SubscriptionError) -> Self {
        ApiError::Subscription(e)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            ApiError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Collection(e) => match e {
                CollectionError::CapacityExceeded { .. } | CollectionError::InvalidItemId(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                CollectionError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
                CollectionError::Store(_) => internal(e),
            },
            ApiError::Retrieval(e) => match e {
                RetrievalError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                RetrievalError::Catalog(_) => {
                    tracing::warn!(error = %e, "upstream catalog failure");
                    (StatusCode::BAD_GATEWAY, e.to_string())
                }
            },
            ApiError::Subscription(e) => match e {
                SubscriptionError::InvalidCategory(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                SubscriptionError::Store(_) => internal(e),
            },
        }
    }
}

fn internal(e: &dyn std::error::Error) -> (StatusCode, String) {
    tracing::error!(error = %e, "storage failure");
    (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".into())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
