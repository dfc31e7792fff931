pub mod borrow;
pub mod catalog;
pub mod commands;
pub mod errors;
pub mod value_objects;

pub use borrow::{ActiveBorrow, Borrow, BorrowCore, InvalidBorrowState, NewBorrow, ReturnedBorrow};
pub use catalog::*;
pub use errors::*;
pub use value_objects::*;
