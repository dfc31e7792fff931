mod borrow_read_model;
mod catalog_store;
mod inventory_store;
mod rows;

pub use borrow_read_model::PgBorrowReadModel;
pub use catalog_store::PgCatalogStore;
pub use inventory_store::PgInventoryStore;
