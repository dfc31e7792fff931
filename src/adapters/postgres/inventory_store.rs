use super::rows::{
    BOOK_COLUMNS, BORROW_COLUMNS, invalid_data, map_row_to_active_borrow, map_row_to_book,
};
use crate::domain::{ActiveBorrow, Book, BookId, BorrowStatus, NewBorrow, ReturnedBorrow, UserId};
use crate::ports::inventory_store::{InventoryStore, InventoryTransaction, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

/// PostgreSQL implementation of InventoryStore
///
/// Each unit of work is a read-committed transaction. The book row is locked
/// with `SELECT ... FOR UPDATE`, so borrows and returns on the same book are
/// serialized until commit or rollback.
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgInventoryTransaction { tx }))
    }
}

/// Open transaction; dropping it without `commit` rolls back.
struct PgInventoryTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryTransaction for PgInventoryTransaction {
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(book_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn find_active_borrow(
        &mut self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<ActiveBorrow>> {
        let sql = format!(
            r#"
            SELECT {BORROW_COLUMNS}
            FROM borrows br
            WHERE br.user_id = $1 AND br.book_id = $2 AND br.status = $3
            ORDER BY br.borrowed_at DESC, br.id DESC
            LIMIT 1
            FOR UPDATE
            "#
        );
        let row = sqlx::query(&sql)
            .bind(user_id.value())
            .bind(book_id.value())
            .bind(BorrowStatus::Borrowed.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(map_row_to_active_borrow).transpose()
    }

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> Result<ActiveBorrow> {
        let sql = format!(
            r#"
            INSERT INTO borrows AS br (user_id, book_id, status, borrowed_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {BORROW_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(borrow.user_id.value())
            .bind(borrow.book_id.value())
            .bind(BorrowStatus::Borrowed.as_str())
            .bind(borrow.borrowed_at)
            .fetch_one(&mut *self.tx)
            .await?;

        map_row_to_active_borrow(&row)
    }

    async fn mark_returned(&mut self, borrow: &ReturnedBorrow) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE borrows
            SET status = $1, returned_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(BorrowStatus::Returned.as_str())
        .bind(borrow.returned_at)
        .bind(borrow.borrow_id.value())
        .bind(BorrowStatus::Borrowed.as_str())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(invalid_data(format!(
                "borrow {} is no longer active",
                borrow.borrow_id
            )));
        }
        Ok(())
    }

    async fn update_available_count(&mut self, book: &Book) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_count = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(i32::from(book.available_count))
        .bind(book.updated_at)
        .bind(book.book_id.value())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(invalid_data(format!("book {} not found", book.book_id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
