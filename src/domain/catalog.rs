use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorId, AvailableCount, BookId, CatalogValidationError};

/// 著者名の最小文字数
pub const AUTHOR_NAME_MIN_LEN: usize = 2;

/// 書籍タイトルの最小文字数
pub const BOOK_TITLE_MIN_LEN: usize = 1;

/// 著者名
///
/// 不変条件：前後の空白を除いて2文字以上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorName(String);

impl AuthorName {
    pub fn parse(value: impl Into<String>) -> Result<Self, CatalogValidationError> {
        let value = value.into().trim().to_string();
        if value.chars().count() < AUTHOR_NAME_MIN_LEN {
            return Err(CatalogValidationError::AuthorNameTooShort);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 書籍タイトル
///
/// 不変条件：前後の空白を除いて1文字以上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookTitle(String);

impl BookTitle {
    pub fn parse(value: impl Into<String>) -> Result<Self, CatalogValidationError> {
        let value = value.into().trim().to_string();
        if value.chars().count() < BOOK_TITLE_MIN_LEN {
            return Err(CatalogValidationError::EmptyTitle);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 著者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub author_id: AuthorId,
    pub name: AuthorName,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 書籍
///
/// 貸出可能冊数のみが貸出処理によって変更される。
/// 「貸出中」は`is_borrowed()`で導出し、フィールドとして持たない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub author_id: AuthorId,
    pub title: BookTitle,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub available_count: AvailableCount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// 貸出中か（貸出可能冊数が0か）
    pub fn is_borrowed(&self) -> bool {
        self.available_count.is_zero()
    }
}

/// 新規著者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub name: AuthorName,
    pub bio: Option<String>,
}

/// 著者の部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorChanges {
    pub name: Option<AuthorName>,
    pub bio: Option<String>,
}

/// 新規書籍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub author_id: AuthorId,
    pub title: BookTitle,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub available_count: AvailableCount,
}

/// 書籍の部分更新
///
/// `available_count`の指定は管理者による在庫数の直接編集となる。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub author_id: Option<AuthorId>,
    pub title: Option<BookTitle>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub available_count: Option<AvailableCount>,
}

impl BookChanges {
    /// 変更を適用した新しい書籍を返す（純粋関数）
    pub fn apply_to(&self, book: &Book, updated_at: DateTime<Utc>) -> Book {
        Book {
            author_id: self.author_id.unwrap_or(book.author_id),
            title: self.title.clone().unwrap_or_else(|| book.title.clone()),
            description: self.description.clone().or_else(|| book.description.clone()),
            published_year: self.published_year.or(book.published_year),
            isbn: self.isbn.clone().or_else(|| book.isbn.clone()),
            available_count: self.available_count.unwrap_or(book.available_count),
            updated_at,
            ..book.clone()
        }
    }
}

/// 書籍一覧の絞り込み条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub author_id: Option<AuthorId>,
    /// true: 貸出可能冊数が0の書籍のみ / false: 1以上の書籍のみ
    pub is_borrowed: Option<bool>,
    /// タイトルの部分一致（大文字小文字を区別しない）
    pub search: Option<String>,
}

impl BookFilter {
    /// 書籍が条件に一致するか
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(author_id) = self.author_id {
            if book.author_id != author_id {
                return false;
            }
        }
        if let Some(is_borrowed) = self.is_borrowed {
            if book.is_borrowed() != is_borrowed {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !book.title.as_str().to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}
