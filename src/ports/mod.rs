pub mod borrow_read_model;
pub mod catalog_store;
pub mod inventory_store;

/// ポート共通の結果型。アダプター固有のエラーはボックス化して返す。
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use borrow_read_model::*;
pub use catalog_store::*;
pub use inventory_store::*;
