use crate::application::{
    ErrorKind, borrow::BorrowApplicationError, catalog::CatalogApplicationError,
};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Borrow(BorrowApplicationError),
    Catalog(CatalogApplicationError),
    /// 利用者IDのヘッダーが無い、または不正
    Unauthorized,
    /// 管理者専用、または他人の記録
    Forbidden,
    /// リクエストの形式が不正（JSON、パス、クエリ）
    BadRequest(String),
}

impl From<BorrowApplicationError> for ApiError {
    fn from(err: BorrowApplicationError) -> Self {
        ApiError::Borrow(err)
    }
}

impl From<CatalogApplicationError> for ApiError {
    fn from(err: CatalogApplicationError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// 分類に応じたレスポンスを組み立てる
///
/// ストアのエラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す。
fn classified(
    kind: ErrorKind,
    err: &(dyn std::error::Error + 'static),
) -> (StatusCode, &'static str, String) {
    match kind {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string()),
        ErrorKind::StorageFailure => {
            match err.source() {
                Some(source) => tracing::error!("Storage failure: {}", source),
                None => tracing::error!("Storage failure: {}", err),
            }
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An unexpected error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Borrow(ref err) => classified(err.kind(), err),
            ApiError::Catalog(ref err) => classified(err.kind(), err),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid user identity".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You are not allowed to access this resource".to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
