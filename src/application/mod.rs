use crate::ports::{BorrowReadModel, CatalogStore, InventoryStore};
use std::sync::Arc;

pub mod borrow;
pub mod catalog;

/// エラーの分類
///
/// API層はこの分類でHTTPステータスを決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    StorageFailure,
}

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、アプリケーション層の関数に引数として渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub inventory_store: Arc<dyn InventoryStore>,
    pub borrow_read_model: Arc<dyn BorrowReadModel>,
    pub catalog_store: Arc<dyn CatalogStore>,
}
