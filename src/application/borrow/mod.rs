mod borrow_service;
mod errors;
mod queries;

pub use borrow_service::{BorrowOutcome, borrow_book, return_book};
pub use errors::{BorrowApplicationError, Result};
pub use queries::{active_borrows_for_user, borrow_history_for_user};
