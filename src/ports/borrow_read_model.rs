use crate::domain::{Author, Book, Borrow, UserId};
use async_trait::async_trait;

pub use super::Result;

/// 貸出ビュー（Read Model）
///
/// 貸出記録に参照先の書籍（必要に応じて著者）を埋め込んだ読み取り専用の射影。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowView {
    pub borrow: Borrow,
    pub book: Book,
    pub author: Option<Author>,
}

/// 貸出Read Modelポート
///
/// いずれのクエリも、呼び出し時点のスナップショットを
/// borrowed_at の降順（新しい順）で返す。
#[async_trait]
pub trait BorrowReadModel: Send + Sync {
    /// 利用者の貸出中の記録を、書籍と著者を含めて取得する
    async fn find_active_by_user(&self, user_id: UserId) -> Result<Vec<BorrowView>>;

    /// 利用者の全貸出履歴を、書籍を含めて取得する
    async fn find_history_by_user(&self, user_id: UserId) -> Result<Vec<BorrowView>>;
}
