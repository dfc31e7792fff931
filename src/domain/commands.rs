use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorId, BookId, UserId};

/// コマンド：書籍を借りる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
}

/// コマンド：書籍を返す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub user_id: UserId,
    pub book_id: BookId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：著者を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAuthor {
    pub name: String,
    pub bio: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：著者を更新する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAuthor {
    pub author_id: AuthorId,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：書籍を登録する
///
/// `available_count`を省略した場合は1冊。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBook {
    pub author_id: AuthorId,
    pub title: String,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub available_count: Option<i64>,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：書籍を更新する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBook {
    pub book_id: BookId,
    pub author_id: Option<AuthorId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub available_count: Option<i64>,
    pub requested_at: DateTime<Utc>,
}
