use super::rows::{
    AUTHOR_COLUMNS, BOOK_COLUMNS, BORROW_COLUMNS, map_row_to_author, map_row_to_book,
    map_row_to_borrow,
};
use crate::domain::{BorrowStatus, UserId};
use crate::ports::borrow_read_model::{BorrowReadModel, BorrowView, Result};
use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use sqlx::PgPool;

/// PostgreSQL implementation of BorrowReadModel
///
/// Reads straight from the ledger joined with the catalog. Each query is a
/// single statement, so it sees one consistent snapshot.
pub struct PgBorrowReadModel {
    pool: PgPool,
}

impl PgBorrowReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowReadModel for PgBorrowReadModel {
    async fn find_active_by_user(&self, user_id: UserId) -> Result<Vec<BorrowView>> {
        let sql = format!(
            r#"
            SELECT {BORROW_COLUMNS}, {BOOK_COLUMNS}, {AUTHOR_COLUMNS}
            FROM borrows br
            JOIN books b ON b.id = br.book_id
            JOIN authors a ON a.id = b.author_id
            WHERE br.user_id = $1 AND br.status = $2
            ORDER BY br.borrowed_at DESC, br.id DESC
            "#
        );

        sqlx::query(&sql)
            .bind(user_id.value())
            .bind(BorrowStatus::Borrowed.as_str())
            .fetch(&self.pool)
            .map(|row_result| -> Result<BorrowView> {
                let row = row_result?;
                Ok(BorrowView {
                    borrow: map_row_to_borrow(&row)?,
                    book: map_row_to_book(&row)?,
                    author: Some(map_row_to_author(&row)?),
                })
            })
            .try_collect()
            .await
    }

    async fn find_history_by_user(&self, user_id: UserId) -> Result<Vec<BorrowView>> {
        let sql = format!(
            r#"
            SELECT {BORROW_COLUMNS}, {BOOK_COLUMNS}
            FROM borrows br
            JOIN books b ON b.id = br.book_id
            WHERE br.user_id = $1
            ORDER BY br.borrowed_at DESC, br.id DESC
            "#
        );

        sqlx::query(&sql)
            .bind(user_id.value())
            .fetch(&self.pool)
            .map(|row_result| -> Result<BorrowView> {
                let row = row_result?;
                Ok(BorrowView {
                    borrow: map_row_to_borrow(&row)?,
                    book: map_row_to_book(&row)?,
                    author: None,
                })
            })
            .try_collect()
            .await
    }
}
