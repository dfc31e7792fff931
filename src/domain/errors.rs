use super::StockError;

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowBookError {
    /// 貸出可能な冊数が残っていない
    OutOfStock,
}

impl From<StockError> for BorrowBookError {
    fn from(err: StockError) -> Self {
        match err {
            // take_one は OutOfStock 以外を返さない
            StockError::OutOfStock | StockError::Negative(_) | StockError::Overflow => {
                BorrowBookError::OutOfStock
            }
        }
    }
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 貸出記録が別の書籍を指している
    BookMismatch,
    /// 在庫数が上限を超える
    StockOverflow,
}

/// カタログ入力のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    AuthorNameTooShort,
    EmptyTitle,
    NegativeAvailableCount,
}

impl std::fmt::Display for CatalogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogValidationError::AuthorNameTooShort => {
                write!(f, "name must be at least 2 characters long")
            }
            CatalogValidationError::EmptyTitle => write!(f, "title must not be empty"),
            CatalogValidationError::NegativeAvailableCount => {
                write!(f, "availablecount must not be less than 0")
            }
        }
    }
}
