use crate::application::ServiceDependencies;
use crate::domain::{
    self, Book, Borrow, BorrowBookError, ReturnBookError,
    commands::{BorrowBook, ReturnBook},
};

use super::errors::{BorrowApplicationError, Result};

/// 貸出・返却の結果
///
/// 更新後の貸出記録と、在庫数を反映した書籍。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowOutcome {
    pub borrow: Borrow,
    pub book: Book,
}

/// 書籍を借りる
///
/// ビジネスルール：
/// - 書籍が存在すること
/// - 利用者が同じ書籍を借りたままでないこと
/// - 貸出可能冊数が1以上であること
///
/// # 一貫性保証
///
/// 貸出記録の追加と在庫数の減算は単一のトランザクションで行う。
/// 書籍の行ロックを検証前に取得するため、同じ書籍への並行した貸出は直列化され、
/// 最後の1冊を2人が同時に借りることはない。
/// 検証で失敗した場合、およびストアのエラーで中断した場合は何も書き込まれない。
///
/// # 冪等性
///
/// 冪等ではない。再試行の方針は呼び出し側が決める。
#[tracing::instrument(skip_all, fields(user_id = %cmd.user_id, book_id = %cmd.book_id))]
pub async fn borrow_book(deps: &ServiceDependencies, cmd: BorrowBook) -> Result<BorrowOutcome> {
    let mut tx = deps
        .inventory_store
        .begin()
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    // 1. 書籍を行ロック付きで取得
    let book = tx
        .lock_book(cmd.book_id)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?
        .ok_or(BorrowApplicationError::BookNotFound(cmd.book_id))?;

    // 2. 二重貸出の確認
    let existing = tx
        .find_active_borrow(cmd.user_id, cmd.book_id)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    if existing.is_some() {
        tracing::warn!("rejected borrow: user already holds this book");
        return Err(BorrowApplicationError::AlreadyBorrowed);
    }

    // 3. ドメイン層の純粋関数を呼び出し
    let (updated_book, new_borrow) =
        domain::borrow::borrow_book(&book, cmd.user_id, cmd.borrowed_at).map_err(|e| match e {
            BorrowBookError::OutOfStock => {
                tracing::warn!("rejected borrow: out of stock");
                BorrowApplicationError::OutOfStock
            }
        })?;

    // 4. 貸出台帳に追加してから在庫数を更新
    let active = tx
        .insert_borrow(&new_borrow)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    tx.update_available_count(&updated_book)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    // 5. 確定
    tx.commit()
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    tracing::info!(
        borrow_id = %active.borrow_id,
        available_count = updated_book.available_count.value(),
        "book borrowed"
    );

    Ok(BorrowOutcome {
        borrow: Borrow::Active(active),
        book: updated_book,
    })
}

/// 書籍を返す
///
/// ビジネスルール：
/// - 書籍が存在すること
/// - この利用者とこの書籍の組に貸出中の記録があること
/// - 複数ある場合は最も新しい記録を返却済みにする
///
/// # 一貫性保証
///
/// 記録の返却済み化と在庫数の加算は単一のトランザクションで行う。
/// 詳細は`borrow_book()`を参照。
#[tracing::instrument(skip_all, fields(user_id = %cmd.user_id, book_id = %cmd.book_id))]
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<BorrowOutcome> {
    let mut tx = deps
        .inventory_store
        .begin()
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    // 1. 書籍を行ロック付きで取得
    let book = tx
        .lock_book(cmd.book_id)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?
        .ok_or(BorrowApplicationError::BookNotFound(cmd.book_id))?;

    // 2. 貸出中の記録を取得
    let active = tx
        .find_active_borrow(cmd.user_id, cmd.book_id)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?
        .ok_or_else(|| {
            tracing::warn!("rejected return: no active borrow");
            BorrowApplicationError::NoActiveBorrow
        })?;

    // 3. ドメイン層の純粋関数を呼び出し
    let (updated_book, returned) = domain::borrow::return_book(&book, active, cmd.returned_at)
        .map_err(|e| match e {
            ReturnBookError::BookMismatch | ReturnBookError::StockOverflow => {
                BorrowApplicationError::DomainError(format!("{:?}", e))
            }
        })?;

    // 4. 貸出台帳を更新してから在庫数を更新
    tx.mark_returned(&returned)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    tx.update_available_count(&updated_book)
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    // 5. 確定
    tx.commit()
        .await
        .map_err(BorrowApplicationError::StorageFailure)?;

    tracing::info!(
        borrow_id = %returned.borrow_id,
        available_count = updated_book.available_count.value(),
        "book returned"
    );

    Ok(BorrowOutcome {
        borrow: Borrow::Returned(returned),
        book: updated_book,
    })
}
