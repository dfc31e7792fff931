use crate::domain::{
    Author, AuthorChanges, AuthorId, Book, BookChanges, BookFilter, BookId, Borrow, NewAuthor,
    NewBook,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use super::Result;

/// 著者と著書
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorWithBooks {
    pub author: Author,
    pub books: Vec<Book>,
}

/// 書籍と著者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWithAuthor {
    pub book: Book,
    pub author: Author,
}

/// 書籍詳細（著者と貸出記録を含む）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDetails {
    pub book: Book,
    pub author: Author,
    pub borrows: Vec<Borrow>,
}

/// 著者削除の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDeletion {
    pub author: Author,
    pub deleted_book_count: usize,
}

/// 書籍削除の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookDeletion {
    Deleted(Book),
    NotFound,
    /// 貸出中の記録があるため削除しなかった
    HasActiveBorrows,
}

/// カタログストアポート
///
/// 著者・書籍の永続化を抽象化する。
/// 削除は参照する貸出記録を残さないよう、単一トランザクションで連鎖削除する。
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_author(&self, author: &NewAuthor, now: DateTime<Utc>) -> Result<Author>;

    /// 著者一覧（作成日時の新しい順）
    async fn list_authors(&self) -> Result<Vec<AuthorWithBooks>>;

    async fn find_author(&self, author_id: AuthorId) -> Result<Option<AuthorWithBooks>>;

    async fn author_exists(&self, author_id: AuthorId) -> Result<bool>;

    async fn update_author(
        &self,
        author_id: AuthorId,
        changes: &AuthorChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Author>>;

    /// 著者を削除する
    ///
    /// 著書に紐づく貸出記録、著書、著者の順に、単一トランザクションで削除する。
    async fn delete_author(&self, author_id: AuthorId) -> Result<Option<AuthorDeletion>>;

    async fn create_book(&self, book: &NewBook, now: DateTime<Utc>) -> Result<Book>;

    /// 書籍一覧（作成日時の新しい順）
    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookWithAuthor>>;

    async fn find_book(&self, book_id: BookId) -> Result<Option<BookDetails>>;

    /// 書籍を部分更新する
    ///
    /// 指定のない列は現在値を保つ。貸出処理と競合しても古い在庫数で上書きしない。
    async fn update_book(
        &self,
        book_id: BookId,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Book>>;

    /// 書籍を削除する
    ///
    /// 貸出中の記録があれば削除しない。返却済みの記録は書籍と共に削除する。
    async fn delete_book(&self, book_id: BookId) -> Result<BookDeletion>;
}
