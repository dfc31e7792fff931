mod catalog_service;
mod errors;

pub use catalog_service::{
    create_author, create_book, delete_author, delete_book, get_author, get_book, list_authors,
    list_books, update_author, update_book,
};
pub use errors::{CatalogApplicationError, Result};
