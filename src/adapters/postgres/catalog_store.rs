use super::rows::{
    AUTHOR_COLUMNS, BOOK_COLUMNS, BORROW_COLUMNS, contains_pattern, map_row_to_author,
    map_row_to_book, map_row_to_borrow,
};
use crate::domain::{
    Author, AuthorChanges, AuthorId, Book, BookChanges, BookFilter, BookId, BorrowStatus,
    NewAuthor, NewBook,
};
use crate::ports::catalog_store::{
    AuthorDeletion, AuthorWithBooks, BookDeletion, BookDetails, BookWithAuthor, CatalogStore,
    Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

/// PostgreSQL implementation of CatalogStore
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn books_by_author(&self, author_id: AuthorId) -> Result<Vec<Book>> {
        let sql = format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books b
            WHERE b.author_id = $1
            ORDER BY b.created_at DESC, b.id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(author_id.value())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_row_to_book).collect()
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn create_author(&self, author: &NewAuthor, now: DateTime<Utc>) -> Result<Author> {
        let sql = format!(
            r#"
            INSERT INTO authors AS a (name, bio, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING {AUTHOR_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(author.name.as_str())
            .bind(author.bio.as_deref())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        map_row_to_author(&row)
    }

    /// List authors newest first, each with their books
    ///
    /// Two statements: authors, then every book grouped by author.
    async fn list_authors(&self) -> Result<Vec<AuthorWithBooks>> {
        let authors_sql = format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors a ORDER BY a.created_at DESC, a.id DESC"
        );
        let author_rows = sqlx::query(&authors_sql).fetch_all(&self.pool).await?;

        let books_sql =
            format!("SELECT {BOOK_COLUMNS} FROM books b ORDER BY b.created_at DESC, b.id DESC");
        let book_rows = sqlx::query(&books_sql).fetch_all(&self.pool).await?;

        let mut books_by_author: HashMap<AuthorId, Vec<Book>> = HashMap::new();
        for row in &book_rows {
            let book = map_row_to_book(row)?;
            books_by_author.entry(book.author_id).or_default().push(book);
        }

        author_rows
            .iter()
            .map(|row| -> Result<AuthorWithBooks> {
                let author = map_row_to_author(row)?;
                let books = books_by_author
                    .remove(&author.author_id)
                    .unwrap_or_default();
                Ok(AuthorWithBooks { author, books })
            })
            .collect()
    }

    async fn find_author(&self, author_id: AuthorId) -> Result<Option<AuthorWithBooks>> {
        let sql = format!("SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.id = $1");
        let Some(row) = sqlx::query(&sql)
            .bind(author_id.value())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let author = map_row_to_author(&row)?;
        let books = self.books_by_author(author_id).await?;
        Ok(Some(AuthorWithBooks { author, books }))
    }

    async fn author_exists(&self, author_id: AuthorId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE id = $1)")
            .bind(author_id.value())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn update_author(
        &self,
        author_id: AuthorId,
        changes: &AuthorChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Author>> {
        let sql = format!(
            r#"
            UPDATE authors AS a
            SET name = COALESCE($1, a.name),
                bio = COALESCE($2, a.bio),
                updated_at = $3
            WHERE a.id = $4
            RETURNING {AUTHOR_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(changes.name.as_ref().map(|name| name.as_str()))
            .bind(changes.bio.as_deref())
            .bind(now)
            .bind(author_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_author).transpose()
    }

    /// Delete an author together with their books and every borrow record
    /// that references those books, in one transaction.
    async fn delete_author(&self, author_id: AuthorId) -> Result<Option<AuthorDeletion>> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM authors WHERE id = $1 FOR UPDATE")
                .bind(author_id.value())
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
            DELETE FROM borrows
            WHERE book_id IN (SELECT id FROM books WHERE author_id = $1)
            "#,
        )
        .bind(author_id.value())
        .execute(&mut *tx)
        .await?;

        let deleted_books = sqlx::query("DELETE FROM books WHERE author_id = $1")
            .bind(author_id.value())
            .execute(&mut *tx)
            .await?;

        let sql = format!("DELETE FROM authors AS a WHERE a.id = $1 RETURNING {AUTHOR_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(author_id.value())
            .fetch_one(&mut *tx)
            .await?;
        let author = map_row_to_author(&row)?;

        tx.commit().await?;

        Ok(Some(AuthorDeletion {
            author,
            deleted_book_count: deleted_books.rows_affected() as usize,
        }))
    }

    async fn create_book(&self, book: &NewBook, now: DateTime<Utc>) -> Result<Book> {
        let sql = format!(
            r#"
            INSERT INTO books AS b (
                title,
                description,
                published_year,
                isbn,
                available_count,
                author_id,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {BOOK_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(book.title.as_str())
            .bind(book.description.as_deref())
            .bind(book.published_year)
            .bind(book.isbn.as_deref())
            .bind(i32::from(book.available_count))
            .bind(book.author_id.value())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        map_row_to_book(&row)
    }

    /// List books with their author, newest first
    ///
    /// Unset filter fields are bound as NULL and match every row.
    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookWithAuthor>> {
        let sql = format!(
            r#"
            SELECT {BOOK_COLUMNS}, {AUTHOR_COLUMNS}
            FROM books b
            JOIN authors a ON a.id = b.author_id
            WHERE ($1::INTEGER IS NULL OR b.author_id = $1)
              AND ($2::BOOLEAN IS NULL OR (b.available_count = 0) = $2)
              AND ($3::TEXT IS NULL OR b.title ILIKE $3)
            ORDER BY b.created_at DESC, b.id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.author_id.map(|id| id.value()))
            .bind(filter.is_borrowed)
            .bind(filter.search.as_deref().map(contains_pattern))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<BookWithAuthor> {
                Ok(BookWithAuthor {
                    book: map_row_to_book(row)?,
                    author: map_row_to_author(row)?,
                })
            })
            .collect()
    }

    async fn find_book(&self, book_id: BookId) -> Result<Option<BookDetails>> {
        let sql = format!(
            r#"
            SELECT {BOOK_COLUMNS}, {AUTHOR_COLUMNS}
            FROM books b
            JOIN authors a ON a.id = b.author_id
            WHERE b.id = $1
            "#
        );
        let Some(row) = sqlx::query(&sql)
            .bind(book_id.value())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let book = map_row_to_book(&row)?;
        let author = map_row_to_author(&row)?;

        let borrows_sql = format!(
            r#"
            SELECT {BORROW_COLUMNS}
            FROM borrows br
            WHERE br.book_id = $1
            ORDER BY br.borrowed_at DESC, br.id DESC
            "#
        );
        let borrow_rows = sqlx::query(&borrows_sql)
            .bind(book_id.value())
            .fetch_all(&self.pool)
            .await?;
        let borrows = borrow_rows
            .iter()
            .map(map_row_to_borrow)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(BookDetails {
            book,
            author,
            borrows,
        }))
    }

    /// Partially update a book in a single statement
    ///
    /// Every column falls back to its current value, so a concurrent borrow's
    /// counter change is never overwritten unless a new count is given.
    async fn update_book(
        &self,
        book_id: BookId,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Book>> {
        let sql = format!(
            r#"
            UPDATE books AS b
            SET author_id = COALESCE($1, b.author_id),
                title = COALESCE($2, b.title),
                description = COALESCE($3, b.description),
                published_year = COALESCE($4, b.published_year),
                isbn = COALESCE($5, b.isbn),
                available_count = COALESCE($6, b.available_count),
                updated_at = $7
            WHERE b.id = $8
            RETURNING {BOOK_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(changes.author_id.map(|id| id.value()))
            .bind(changes.title.as_ref().map(|title| title.as_str()))
            .bind(changes.description.as_deref())
            .bind(changes.published_year)
            .bind(changes.isbn.as_deref())
            .bind(changes.available_count.map(i32::from))
            .bind(now)
            .bind(book_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    /// Delete a book and its returned borrow records
    ///
    /// The book row is locked first so no borrow can start while the
    /// active-borrow check and the deletes run.
    async fn delete_book(&self, book_id: BookId) -> Result<BookDeletion> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id.value())
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(BookDeletion::NotFound);
        }

        let has_active_borrows: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrows WHERE book_id = $1 AND status = $2)",
        )
        .bind(book_id.value())
        .bind(BorrowStatus::Borrowed.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if has_active_borrows {
            return Ok(BookDeletion::HasActiveBorrows);
        }

        sqlx::query("DELETE FROM borrows WHERE book_id = $1")
            .bind(book_id.value())
            .execute(&mut *tx)
            .await?;

        let sql = format!("DELETE FROM books AS b WHERE b.id = $1 RETURNING {BOOK_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(book_id.value())
            .fetch_one(&mut *tx)
            .await?;
        let book = map_row_to_book(&row)?;

        tx.commit().await?;
        Ok(BookDeletion::Deleted(book))
    }
}
