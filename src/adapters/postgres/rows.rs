use crate::domain::{
    ActiveBorrow, Author, AuthorId, AuthorName, AvailableCount, Book, BookId, BookTitle, Borrow,
    BorrowCore, BorrowId, BorrowStatus, UserId,
};
use sqlx::{Row, postgres::PgRow};
use std::str::FromStr;

pub(super) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Column list for `authors a`, aliased so it can be joined with other tables.
pub(super) const AUTHOR_COLUMNS: &str = "a.id AS author_id, a.name AS author_name, \
     a.bio AS author_bio, a.created_at AS author_created_at, a.updated_at AS author_updated_at";

/// Column list for `books b`.
pub(super) const BOOK_COLUMNS: &str = "b.id AS book_id, b.author_id AS book_author_id, \
     b.title AS book_title, b.description AS book_description, \
     b.published_year AS book_published_year, b.isbn AS book_isbn, \
     b.available_count AS book_available_count, b.created_at AS book_created_at, \
     b.updated_at AS book_updated_at";

/// Column list for `borrows br`.
pub(super) const BORROW_COLUMNS: &str = "br.id AS borrow_id, br.user_id AS borrow_user_id, \
     br.book_id AS borrow_book_id, br.status AS borrow_status, \
     br.borrowed_at AS borrow_borrowed_at, br.returned_at AS borrow_returned_at";

pub(super) fn invalid_data(message: impl Into<String>) -> BoxError {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message.into(),
    ))
}

pub(super) fn map_row_to_author(row: &PgRow) -> Result<Author, BoxError> {
    let name: String = row.try_get("author_name")?;
    let name = AuthorName::parse(name).map_err(|e| invalid_data(e.to_string()))?;

    Ok(Author {
        author_id: AuthorId::new(row.try_get("author_id")?),
        name,
        bio: row.try_get("author_bio")?,
        created_at: row.try_get("author_created_at")?,
        updated_at: row.try_get("author_updated_at")?,
    })
}

/// Map a row to a Book
///
/// `available_count` is stored as INTEGER with a CHECK (>= 0); a negative
/// value here means the constraint was bypassed and is reported as invalid data.
pub(super) fn map_row_to_book(row: &PgRow) -> Result<Book, BoxError> {
    let title: String = row.try_get("book_title")?;
    let title = BookTitle::parse(title).map_err(|e| invalid_data(e.to_string()))?;

    let available_count: i32 = row.try_get("book_available_count")?;
    let available_count =
        AvailableCount::try_from(available_count).map_err(|e| invalid_data(e.to_string()))?;

    Ok(Book {
        book_id: BookId::new(row.try_get("book_id")?),
        author_id: AuthorId::new(row.try_get("book_author_id")?),
        title,
        description: row.try_get("book_description")?,
        published_year: row.try_get("book_published_year")?,
        isbn: row.try_get("book_isbn")?,
        available_count,
        created_at: row.try_get("book_created_at")?,
        updated_at: row.try_get("book_updated_at")?,
    })
}

pub(super) fn map_row_to_borrow(row: &PgRow) -> Result<Borrow, BoxError> {
    let status: &str = row.try_get("borrow_status")?;
    let status = BorrowStatus::from_str(status).map_err(invalid_data)?;

    let core = BorrowCore {
        borrow_id: BorrowId::new(row.try_get("borrow_id")?),
        user_id: UserId::new(row.try_get("borrow_user_id")?),
        book_id: BookId::new(row.try_get("borrow_book_id")?),
        borrowed_at: row.try_get("borrow_borrowed_at")?,
    };

    Ok(Borrow::from_parts(
        core,
        status,
        row.try_get("borrow_returned_at")?,
    )?)
}

/// Map a row that must hold a BORROWED record
pub(super) fn map_row_to_active_borrow(row: &PgRow) -> Result<ActiveBorrow, BoxError> {
    match map_row_to_borrow(row)? {
        Borrow::Active(active) => Ok(active),
        Borrow::Returned(returned) => Err(invalid_data(format!(
            "borrow {} is not active",
            returned.borrow_id
        ))),
    }
}

/// Build an ILIKE pattern matching `search` as a literal substring.
pub(super) fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("rust"), "%rust%");
        assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
