use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use storebot_engine::StorefrontError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request could not be processed. {0}")]
    UnprocessableRequest(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::UnprocessableRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StorefrontError> for ServerError {
    fn from(e: StorefrontError) -> Self {
        match &e {
            StorefrontError::ProductNotFound(_) |
            StorefrontError::OrderNotFound(_) |
            StorefrontError::TopupNotFound(_) |
            StorefrontError::NoMatchingPayment(_) => Self::NoRecordFound(e.to_string()),
            StorefrontError::InvalidNotification(_) => Self::InvalidRequestBody(e.to_string()),
            StorefrontError::ProductNotPurchasable(_) |
            StorefrontError::OutOfStock { .. } |
            StorefrontError::OrderAlreadyExists(_) |
            StorefrontError::OrderNotPending { .. } |
            StorefrontError::OrderModificationNoOp |
            StorefrontError::TopupNotPending { .. } |
            StorefrontError::InsufficientFunds { .. } |
            StorefrontError::Voucher(_) => Self::UnprocessableRequest(e.to_string()),
            StorefrontError::DatabaseError(_) | StorefrontError::Gateway(_) => Self::BackendError(e.to_string()),
        }
    }
}
