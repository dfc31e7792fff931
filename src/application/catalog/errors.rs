use crate::application::ErrorKind;
use crate::domain::{AuthorId, BookId, CatalogValidationError};
use thiserror::Error;

/// カタログ管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum CatalogApplicationError {
    #[error("Author with id {0} not found")]
    AuthorNotFound(AuthorId),

    #[error("Book with id {0} not found")]
    BookNotFound(BookId),

    /// 入力値が不正
    #[error("{0}")]
    Validation(CatalogValidationError),

    /// 貸出中の記録がある書籍は削除できない
    #[error("Book has active borrows")]
    BookHasActiveBorrows(BookId),

    #[error("Storage failure")]
    StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CatalogApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogApplicationError::AuthorNotFound(_)
            | CatalogApplicationError::BookNotFound(_) => ErrorKind::NotFound,
            CatalogApplicationError::Validation(_) => ErrorKind::Validation,
            CatalogApplicationError::BookHasActiveBorrows(_) => ErrorKind::Conflict,
            CatalogApplicationError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }
}

impl From<CatalogValidationError> for CatalogApplicationError {
    fn from(err: CatalogValidationError) -> Self {
        CatalogApplicationError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, CatalogApplicationError>;
