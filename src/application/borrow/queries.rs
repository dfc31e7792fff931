use crate::application::ServiceDependencies;
use crate::domain::UserId;
use crate::ports::BorrowView;

use super::errors::{BorrowApplicationError, Result};

/// 利用者の貸出中の記録（書籍・著者を含む、新しい順）
#[tracing::instrument(skip(deps))]
pub async fn active_borrows_for_user(
    deps: &ServiceDependencies,
    user_id: UserId,
) -> Result<Vec<BorrowView>> {
    deps.borrow_read_model
        .find_active_by_user(user_id)
        .await
        .map_err(BorrowApplicationError::StorageFailure)
}

/// 利用者の全貸出履歴（書籍を含む、新しい順）
#[tracing::instrument(skip(deps))]
pub async fn borrow_history_for_user(
    deps: &ServiceDependencies,
    user_id: UserId,
) -> Result<Vec<BorrowView>> {
    deps.borrow_read_model
        .find_history_by_user(user_id)
        .await
        .map_err(BorrowApplicationError::StorageFailure)
}
