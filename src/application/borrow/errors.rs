use crate::application::ErrorKind;
use crate::domain::BookId;
use thiserror::Error;

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum BorrowApplicationError {
    /// 書籍が存在しない
    #[error("Book with id {0} not found")]
    BookNotFound(BookId),

    /// 貸出可能な冊数がない
    #[error("Book is out of stock")]
    OutOfStock,

    /// 同じ書籍を既に借りている
    #[error("You already have an active borrow for this book")]
    AlreadyBorrowed,

    /// 返却対象の貸出がない
    #[error("You do not have an active borrow for this book")]
    NoActiveBorrow,

    /// ドメイン層のエラー
    #[error("Domain error: {0}")]
    DomainError(String),

    /// ストアのエラー（接続断、直列化失敗など）
    ///
    /// 失敗したトランザクションの書き込みは一切残らない。
    #[error("Storage failure")]
    StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BorrowApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BorrowApplicationError::BookNotFound(_) => ErrorKind::NotFound,
            BorrowApplicationError::OutOfStock
            | BorrowApplicationError::AlreadyBorrowed
            | BorrowApplicationError::NoActiveBorrow
            | BorrowApplicationError::DomainError(_) => ErrorKind::Conflict,
            BorrowApplicationError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, BorrowApplicationError>;
