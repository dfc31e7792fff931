use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Book, BookId, BorrowBookError, BorrowId, BorrowStatus, ReturnBookError, StockError, UserId,
};

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// 貸出記録の共通フィールド
///
/// 貸出中・返却済みのどちらの状態でも共有され、作成後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowCore {
    // 識別子
    pub borrow_id: BorrowId,

    // 他の集約への参照（IDのみ）
    pub user_id: UserId,
    pub book_id: BookId,

    pub borrowed_at: DateTime<Utc>,
}

/// 貸出中状態
///
/// returned_atを持たない（型で保証）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBorrow {
    #[serde(flatten)]
    pub core: BorrowCore,
}

impl std::ops::Deref for ActiveBorrow {
    type Target = BorrowCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却済み状態
///
/// ビジネスルール：
/// - returned_atが必須（型で保証）
/// - 終端状態。これ以上の遷移はない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedBorrow {
    #[serde(flatten)]
    pub core: BorrowCore,
    pub returned_at: DateTime<Utc>,
}

impl std::ops::Deref for ReturnedBorrow {
    type Target = BorrowCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 貸出記録の統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Borrow {
    #[serde(rename = "BORROWED")]
    Active(ActiveBorrow),
    #[serde(rename = "RETURNED")]
    Returned(ReturnedBorrow),
}

/// 永続化された行が状態の不変条件を満たさない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBorrowState {
    pub borrow_id: BorrowId,
    pub status: BorrowStatus,
    pub has_returned_at: bool,
}

impl std::fmt::Display for InvalidBorrowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "borrow {} has status {} but returned_at is {}",
            self.borrow_id,
            self.status.as_str(),
            if self.has_returned_at { "set" } else { "null" }
        )
    }
}

impl std::error::Error for InvalidBorrowState {}

impl Borrow {
    /// 永続化された列の値から状態を復元する
    ///
    /// returned_atは status が RETURNED のときに限り設定されていなければならない。
    pub fn from_parts(
        core: BorrowCore,
        status: BorrowStatus,
        returned_at: Option<DateTime<Utc>>,
    ) -> Result<Self, InvalidBorrowState> {
        match (status, returned_at) {
            (BorrowStatus::Borrowed, None) => Ok(Borrow::Active(ActiveBorrow { core })),
            (BorrowStatus::Returned, Some(returned_at)) => {
                Ok(Borrow::Returned(ReturnedBorrow { core, returned_at }))
            }
            (status, returned_at) => Err(InvalidBorrowState {
                borrow_id: core.borrow_id,
                status,
                has_returned_at: returned_at.is_some(),
            }),
        }
    }

    pub fn core(&self) -> &BorrowCore {
        match self {
            Borrow::Active(active) => &active.core,
            Borrow::Returned(returned) => &returned.core,
        }
    }

    pub fn status(&self) -> BorrowStatus {
        match self {
            Borrow::Active(_) => BorrowStatus::Borrowed,
            Borrow::Returned(_) => BorrowStatus::Returned,
        }
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Borrow::Active(_) => None,
            Borrow::Returned(returned) => Some(returned.returned_at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Borrow::Active(_))
    }
}

impl From<ActiveBorrow> for Borrow {
    fn from(active: ActiveBorrow) -> Self {
        Borrow::Active(active)
    }
}

impl From<ReturnedBorrow> for Borrow {
    fn from(returned: ReturnedBorrow) -> Self {
        Borrow::Returned(returned)
    }
}

/// 採番前の貸出記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrow {
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
}

// ============================================================================
// 純粋関数
// ============================================================================

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 貸出可能冊数が1以上であること
/// - 貸出可能冊数を1減らす（0になれば「貸出中」）
///
/// 副作用なし。更新後の書籍と、記録すべき新しい貸出を返す。
pub fn borrow_book(
    book: &Book,
    user_id: UserId,
    borrowed_at: DateTime<Utc>,
) -> Result<(Book, NewBorrow), BorrowBookError> {
    let available_count = book.available_count.take_one()?;

    let updated_book = Book {
        available_count,
        updated_at: borrowed_at,
        ..book.clone()
    };

    let new_borrow = NewBorrow {
        user_id,
        book_id: book.book_id,
        borrowed_at,
    };

    Ok((updated_book, new_borrow))
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - ActiveBorrowのみ受け付ける（型で保証）
/// - 貸出記録と書籍が一致すること
/// - 貸出可能冊数を1増やす
///
/// 副作用なし。更新後の書籍とReturnedBorrowを返す。
pub fn return_book(
    book: &Book,
    borrow: ActiveBorrow,
    returned_at: DateTime<Utc>,
) -> Result<(Book, ReturnedBorrow), ReturnBookError> {
    if borrow.book_id != book.book_id {
        return Err(ReturnBookError::BookMismatch);
    }

    let available_count = book
        .available_count
        .put_back()
        .map_err(|_: StockError| ReturnBookError::StockOverflow)?;

    let updated_book = Book {
        available_count,
        updated_at: returned_at,
        ..book.clone()
    };

    let returned = ReturnedBorrow {
        core: borrow.core,
        returned_at,
    };

    Ok((updated_book, returned))
}

/// 複数の貸出記録から返却対象を選ぶ
///
/// 不変条件上は高々1件だが、複数あった場合は最も新しいもの
/// （borrowed_at 降順、同時刻なら borrow_id 降順）を選ぶ。
pub fn select_active_borrow<'a, I>(borrows: I) -> Option<ActiveBorrow>
where
    I: IntoIterator<Item = &'a Borrow>,
{
    borrows
        .into_iter()
        .filter_map(|borrow| match borrow {
            Borrow::Active(active) => Some(active),
            Borrow::Returned(_) => None,
        })
        .max_by_key(|active| (active.borrowed_at, active.borrow_id))
        .cloned()
}

/// 貸出記録を新しい順（borrowed_at 降順、borrow_id 降順）に並べる
pub fn sort_most_recent_first(borrows: &mut [Borrow]) {
    borrows.sort_by(|a, b| {
        let (a, b) = (a.core(), b.core());
        (b.borrowed_at, b.borrow_id).cmp(&(a.borrowed_at, a.borrow_id))
    });
}
