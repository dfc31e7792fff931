use serde::{Deserialize, Serialize};
use std::fmt;

/// 整数IDの値オブジェクトを定義する
///
/// 各IDはデータベースの SERIAL 主キーに対応する。
macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            pub fn new(value: i32) -> Self {
                Self(value)
            }

            pub fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// 書籍ID - カタログの書籍への参照
    BookId
);

integer_id!(
    /// 著者ID
    AuthorId
);

integer_id!(
    /// 利用者ID - 認証済みの呼び出し元から渡される
    UserId
);

integer_id!(
    /// 貸出記録ID - 貸出台帳の主キー
    BorrowId
);

/// 在庫数エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// 貸出可能な冊数が0
    OutOfStock,
    /// 負の値は在庫数として不正
    Negative(i64),
    /// 上限を超えた
    Overflow,
}

/// 貸出可能冊数
///
/// 不変条件：0以上。
/// 型システムでこの制約を強制し、負の在庫を作成できないようにする。
/// 「貸出中」フラグはこの値から導出され、独立して保持されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AvailableCount(u32);

impl AvailableCount {
    /// 書籍登録時の既定冊数
    pub const DEFAULT: Self = Self(1);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// 貸出可能な冊数が残っていないか
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// 1冊貸し出す
    ///
    /// # エラー
    /// 在庫が0の場合は`StockError::OutOfStock`を返す
    pub fn take_one(self) -> Result<Self, StockError> {
        self.0.checked_sub(1).map(Self).ok_or(StockError::OutOfStock)
    }

    /// 1冊戻す
    pub fn put_back(self) -> Result<Self, StockError> {
        match self.0.checked_add(1) {
            Some(v) if v <= i32::MAX as u32 => Ok(Self(v)),
            _ => Err(StockError::Overflow),
        }
    }
}

impl Default for AvailableCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for AvailableCount {
    type Error = StockError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(StockError::Negative(value));
        }
        if value > i32::MAX as i64 {
            return Err(StockError::Overflow);
        }
        Ok(Self(value as u32))
    }
}

impl TryFrom<i32> for AvailableCount {
    type Error = StockError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<AvailableCount> for i64 {
    fn from(count: AvailableCount) -> Self {
        i64::from(count.0)
    }
}

impl From<AvailableCount> for i32 {
    // put_back と TryFrom が i32::MAX を上限にしている
    fn from(count: AvailableCount) -> Self {
        count.0 as i32
    }
}

impl fmt::Display for StockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockError::OutOfStock => write!(f, "Book is out of stock"),
            StockError::Negative(v) => write!(f, "available count must not be negative: {}", v),
            StockError::Overflow => write!(f, "available count is too large"),
        }
    }
}

/// 貸出ステータス
///
/// 遷移は BORROWED → RETURNED の一方向のみ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowStatus {
    /// 貸出中
    Borrowed,
    /// 返却済み
    Returned,
}

impl BorrowStatus {
    /// 文字列表現を取得する（DBのstatus列と一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "BORROWED",
            BorrowStatus::Returned => "RETURNED",
        }
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BORROWED" => Ok(BorrowStatus::Borrowed),
            "RETURNED" => Ok(BorrowStatus::Returned),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

/// 利用者の権限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // TDD: AvailableCount のテスト
    #[test]
    fn test_available_count_take_one_decrements() {
        let count = AvailableCount::new(2);
        let count = count.take_one().unwrap();
        assert_eq!(count.value(), 1);
        assert!(!count.is_zero());
    }

    #[test]
    fn test_available_count_take_one_reaches_zero() {
        let count = AvailableCount::new(1).take_one().unwrap();
        assert!(count.is_zero());
    }

    #[test]
    fn test_available_count_take_one_fails_when_zero() {
        let result = AvailableCount::new(0).take_one();
        assert_eq!(result.unwrap_err(), StockError::OutOfStock);
    }

    #[test]
    fn test_available_count_put_back_increments() {
        let count = AvailableCount::new(0).put_back().unwrap();
        assert_eq!(count.value(), 1);
    }

    #[test]
    fn test_available_count_put_back_overflow() {
        let count = AvailableCount::try_from(i32::MAX).unwrap();
        assert_eq!(count.put_back().unwrap_err(), StockError::Overflow);
    }

    #[test]
    fn test_available_count_try_from_negative() {
        let result = AvailableCount::try_from(-1_i64);
        assert_eq!(result.unwrap_err(), StockError::Negative(-1));
    }

    #[test]
    fn test_available_count_default_is_one() {
        assert_eq!(AvailableCount::default().value(), 1);
    }

    #[test]
    fn test_available_count_deserialize_rejects_negative() {
        let result: Result<AvailableCount, _> = serde_json::from_str("-3");
        assert!(result.is_err());

        let count: AvailableCount = serde_json::from_str("4").unwrap();
        assert_eq!(count.value(), 4);
    }

    // BorrowStatus のテスト
    #[test]
    fn test_borrow_status_round_trips_through_str() {
        for status in [BorrowStatus::Borrowed, BorrowStatus::Returned] {
            assert_eq!(status.as_str().parse::<BorrowStatus>().unwrap(), status);
        }
        assert!("LOST".parse::<BorrowStatus>().is_err());
    }

    #[test]
    fn test_borrow_status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&BorrowStatus::Borrowed).unwrap(),
            "\"BORROWED\""
        );
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("librarian".parse::<Role>().is_err());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(BookId::new(42).to_string(), "42");
        assert_eq!(UserId::new(7).value(), 7);
    }
}
