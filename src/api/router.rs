use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, create_author, create_book, delete_author, delete_book, get_author,
    get_book, list_authors, list_books, my_active_borrows, return_book, update_author,
    update_book, user_active_borrows, user_borrow_history,
};

/// Creates the API router
///
/// Borrow endpoints (identity from `x-user-id` / `x-user-role`):
/// - POST /borrow - Borrow a book
/// - POST /borrow/return - Return a book
/// - GET /borrow/me - Active borrows of the caller
/// - GET /borrow/user/:userId - Active borrows of a user (admin)
/// - GET /borrow/user/:userId/history - Borrow history (self or admin)
///
/// Catalog endpoints: reads are public, writes require the admin role.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Borrow endpoints
        .route("/borrow", post(borrow_book))
        .route("/borrow/return", post(return_book))
        .route("/borrow/me", get(my_active_borrows))
        .route("/borrow/user/:user_id", get(user_active_borrows))
        .route("/borrow/user/:user_id/history", get(user_borrow_history))
        // Catalog endpoints
        .route("/authors", get(list_authors).post(create_author))
        .route(
            "/authors/:id",
            get(get_author).patch(update_author).delete(delete_author),
        )
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/:id",
            get(get_book).patch(update_book).delete(delete_book),
        )
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
