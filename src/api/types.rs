use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::borrow::BorrowOutcome;
use crate::domain::{Author, Book, Borrow, BorrowStatus};
use crate::ports::{AuthorDeletion, AuthorWithBooks, BookDetails, BookWithAuthor, BorrowView};

pub const BORROWED_MESSAGE: &str = "Book borrowed successfully";
pub const RETURNED_MESSAGE: &str = "Book returned successfully";
pub const AUTHOR_DELETED_MESSAGE: &str =
    "Author and related books (and their borrow records) deleted successfully";

// ============================================================================
// Requests
// ============================================================================

/// 貸出・返却リクエスト（POST /borrow, POST /borrow/return）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowBookRequest {
    pub book_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateAuthorRequest {
    pub name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAuthorRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
}

/// 書籍登録リクエスト
///
/// 在庫数は`availableCount`と`availablecount`のどちらのキーでも受け付ける。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: String,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub author_id: i32,
    #[serde(alias = "availablecount")]
    pub available_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub author_id: Option<i32>,
    #[serde(alias = "availablecount")]
    pub available_count: Option<i64>,
}

/// 書籍一覧のクエリパラメータ（GET /books?authorId&isBorrowed&search）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBooksQuery {
    pub author_id: Option<i32>,
    pub is_borrowed: Option<bool>,
    pub search: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorResponse {
    pub id: i32,
    pub name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<BookResponse>>,
}

impl From<Author> for AuthorResponse {
    fn from(author: Author) -> Self {
        Self {
            id: author.author_id.value(),
            name: author.name.as_str().to_string(),
            bio: author.bio,
            created_at: author.created_at,
            updated_at: author.updated_at,
            books: None,
        }
    }
}

impl From<AuthorWithBooks> for AuthorResponse {
    fn from(AuthorWithBooks { author, books }: AuthorWithBooks) -> Self {
        Self {
            books: Some(books.into_iter().map(BookResponse::from).collect()),
            ..Self::from(author)
        }
    }
}

/// 書籍レスポンス
///
/// 在庫数のキーは既存のフロントエンドに合わせて`availablecount`。
/// `isBorrowed`は在庫数から導出する。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub author_id: i32,
    #[serde(rename = "availablecount")]
    pub available_count: u32,
    pub is_borrowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrows: Option<Vec<BorrowRecordResponse>>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            is_borrowed: book.is_borrowed(),
            available_count: book.available_count.value(),
            title: book.title.as_str().to_string(),
            description: book.description,
            published_year: book.published_year,
            isbn: book.isbn,
            author_id: book.author_id.value(),
            created_at: book.created_at,
            updated_at: book.updated_at,
            author: None,
            borrows: None,
        }
    }
}

impl From<BookWithAuthor> for BookResponse {
    fn from(BookWithAuthor { book, author }: BookWithAuthor) -> Self {
        Self {
            author: Some(author.into()),
            ..Self::from(book)
        }
    }
}

impl From<BookDetails> for BookResponse {
    fn from(details: BookDetails) -> Self {
        Self {
            author: Some(details.author.into()),
            borrows: Some(
                details
                    .borrows
                    .into_iter()
                    .map(BorrowRecordResponse::from)
                    .collect(),
            ),
            ..Self::from(details.book)
        }
    }
}

/// 貸出記録レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecordResponse {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub status: BorrowStatus,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookResponse>,
}

impl From<Borrow> for BorrowRecordResponse {
    fn from(borrow: Borrow) -> Self {
        let core = borrow.core();
        Self {
            id: core.borrow_id.value(),
            user_id: core.user_id.value(),
            book_id: core.book_id.value(),
            status: borrow.status(),
            borrowed_at: core.borrowed_at,
            returned_at: borrow.returned_at(),
            book: None,
        }
    }
}

impl From<BorrowView> for BorrowRecordResponse {
    fn from(view: BorrowView) -> Self {
        let book = match view.author {
            Some(author) => BookResponse::from(BookWithAuthor {
                book: view.book,
                author,
            }),
            None => BookResponse::from(view.book),
        };
        Self {
            book: Some(book),
            ..Self::from(view.borrow)
        }
    }
}

/// 貸出・返却の結果レスポンス
#[derive(Debug, Serialize)]
pub struct BorrowResultResponse {
    pub message: String,
    pub borrow: BorrowRecordResponse,
}

impl BorrowResultResponse {
    pub fn new(message: &str, outcome: BorrowOutcome) -> Self {
        Self {
            message: message.to_string(),
            borrow: BorrowRecordResponse {
                book: Some(outcome.book.into()),
                ..BorrowRecordResponse::from(outcome.borrow)
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDeletedResponse {
    pub message: String,
    pub author: AuthorResponse,
    pub deleted_book_count: usize,
}

impl From<AuthorDeletion> for AuthorDeletedResponse {
    fn from(deletion: AuthorDeletion) -> Self {
        Self {
            message: AUTHOR_DELETED_MESSAGE.to_string(),
            author: deletion.author.into(),
            deleted_book_count: deletion.deleted_book_count,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures;
    use serde_json::json;

    #[test]
    fn test_book_response_uses_lowercase_counter_key() {
        let value = serde_json::to_value(BookResponse::from(fixtures::book(7, 0))).unwrap();

        assert_eq!(value["availablecount"], json!(0));
        assert_eq!(value["isBorrowed"], json!(true));
        assert!(value.get("availableCount").is_none());
        assert!(value.get("author").is_none());
    }

    #[test]
    fn test_create_book_request_accepts_both_counter_keys() {
        let camel: CreateBookRequest =
            serde_json::from_value(json!({"title": "Dune", "authorId": 1, "availableCount": 3}))
                .unwrap();
        let lower: CreateBookRequest =
            serde_json::from_value(json!({"title": "Dune", "authorId": 1, "availablecount": 4}))
                .unwrap();

        assert_eq!(camel.available_count, Some(3));
        assert_eq!(lower.available_count, Some(4));
    }
}
