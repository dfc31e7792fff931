use crate::domain::{ActiveBorrow, Book, BookId, NewBorrow, ReturnedBorrow, UserId};
use async_trait::async_trait;

pub use super::Result;

/// 在庫ストアポート
///
/// 貸出・返却を単一の作業単位（トランザクション）として実行するための入口。
/// 書籍の在庫数と貸出台帳への書き込みは、同じトランザクションの中でのみ行う。
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// 新しいトランザクションを開始する
    async fn begin(&self) -> Result<Box<dyn InventoryTransaction>>;
}

/// 在庫トランザクション
///
/// `commit`されずに破棄された場合、すべての書き込みはロールバックされる。
#[async_trait]
pub trait InventoryTransaction: Send {
    /// 書籍を取得し、トランザクション終了まで行ロックを保持する
    ///
    /// 同じ書籍に対する並行した貸出・返却はここで直列化される。
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>>;

    /// 利用者と書籍の組に対する貸出中の記録を取得する
    ///
    /// 複数存在する場合は最も新しいものを返す。
    async fn find_active_borrow(
        &mut self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<ActiveBorrow>>;

    /// 貸出記録を追加し、採番済みの記録を返す
    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> Result<ActiveBorrow>;

    /// 貸出記録を返却済みにする
    async fn mark_returned(&mut self, borrow: &ReturnedBorrow) -> Result<()>;

    /// 書籍の貸出可能冊数を書き込む
    async fn update_available_count(&mut self, book: &Book) -> Result<()>;

    /// トランザクションを確定する
    async fn commit(self: Box<Self>) -> Result<()>;
}
