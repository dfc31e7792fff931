use crate::application::{ServiceDependencies, borrow, catalog};
use crate::domain::{
    AuthorId, BookFilter, BookId, UserId,
    commands::{BorrowBook, CreateAuthor, CreateBook, ReturnBook, UpdateAuthor, UpdateBook},
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use std::sync::Arc;

use super::{
    error::ApiError,
    extract::{AdminUser, ApiJson, ApiPath, ApiQuery, CurrentUser},
    types::{
        AuthorDeletedResponse, AuthorResponse, BORROWED_MESSAGE, BookResponse, BorrowBookRequest,
        BorrowRecordResponse, BorrowResultResponse, CreateAuthorRequest, CreateBookRequest,
        ListBooksQuery, RETURNED_MESSAGE, UpdateAuthorRequest, UpdateBookRequest,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Borrow commands (POST)
// ============================================================================

/// POST /borrow - 書籍を借りる
///
/// 強制されるビジネスルール:
/// - 書籍が存在すること
/// - 貸出可能冊数が1以上であること
/// - 同じ書籍を借りたままでないこと
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<BorrowBookRequest>,
) -> Result<(StatusCode, Json<BorrowResultResponse>), ApiError> {
    let cmd = BorrowBook {
        user_id: user.user_id,
        book_id: BookId::new(req.book_id),
        borrowed_at: Utc::now(),
    };

    let outcome = borrow::borrow_book(&state.service_deps, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(BorrowResultResponse::new(BORROWED_MESSAGE, outcome)),
    ))
}

/// POST /borrow/return - 書籍を返却
///
/// 利用者が借りている最新の貸出記録を返却済みにする。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<BorrowBookRequest>,
) -> Result<Json<BorrowResultResponse>, ApiError> {
    let cmd = ReturnBook {
        user_id: user.user_id,
        book_id: BookId::new(req.book_id),
        returned_at: Utc::now(),
    };

    let outcome = borrow::return_book(&state.service_deps, cmd).await?;

    Ok(Json(BorrowResultResponse::new(RETURNED_MESSAGE, outcome)))
}

// ============================================================================
// Borrow queries (GET)
// ============================================================================

/// GET /borrow/me - 自分の貸出中の書籍
pub async fn my_active_borrows(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<BorrowRecordResponse>>, ApiError> {
    active_borrows(&state, user.user_id).await
}

/// GET /borrow/user/:userId - 他の利用者の貸出中の書籍（管理者のみ）
pub async fn user_active_borrows(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<Vec<BorrowRecordResponse>>, ApiError> {
    active_borrows(&state, UserId::new(user_id)).await
}

/// GET /borrow/user/:userId/history - 全貸出履歴（本人または管理者）
pub async fn user_borrow_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<Vec<BorrowRecordResponse>>, ApiError> {
    let user_id = UserId::new(user_id);
    if !user.can_view(user_id) {
        return Err(ApiError::Forbidden);
    }

    let views = borrow::borrow_history_for_user(&state.service_deps, user_id).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

async fn active_borrows(
    state: &AppState,
    user_id: UserId,
) -> Result<Json<Vec<BorrowRecordResponse>>, ApiError> {
    let views = borrow::active_borrows_for_user(&state.service_deps, user_id).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

// ============================================================================
// Authors
// ============================================================================

/// GET /authors - 著者一覧（著書を含む、新しい順）
pub async fn list_authors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AuthorResponse>>, ApiError> {
    let authors = catalog::list_authors(&state.service_deps).await?;
    Ok(Json(authors.into_iter().map(Into::into).collect()))
}

/// GET /authors/:id
pub async fn get_author(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let author = catalog::get_author(&state.service_deps, AuthorId::new(id)).await?;
    Ok(Json(author.into()))
}

/// POST /authors（管理者のみ）
pub async fn create_author(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiJson(req): ApiJson<CreateAuthorRequest>,
) -> Result<(StatusCode, Json<AuthorResponse>), ApiError> {
    let cmd = CreateAuthor {
        name: req.name,
        bio: req.bio,
        requested_at: Utc::now(),
    };

    let author = catalog::create_author(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(author.into())))
}

/// PATCH /authors/:id（管理者のみ）
pub async fn update_author(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(req): ApiJson<UpdateAuthorRequest>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let cmd = UpdateAuthor {
        author_id: AuthorId::new(id),
        name: req.name,
        bio: req.bio,
        requested_at: Utc::now(),
    };

    let author = catalog::update_author(&state.service_deps, cmd).await?;
    Ok(Json(author.into()))
}

/// DELETE /authors/:id（管理者のみ）
///
/// 著書とその貸出記録も削除される。
pub async fn delete_author(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<AuthorDeletedResponse>, ApiError> {
    let deletion = catalog::delete_author(&state.service_deps, AuthorId::new(id)).await?;
    Ok(Json(deletion.into()))
}

// ============================================================================
// Books
// ============================================================================

/// GET /books - 書籍一覧
///
/// クエリパラメータ:
/// - authorId: 著者で絞り込み
/// - isBorrowed: true なら在庫0の書籍のみ、false なら在庫のある書籍のみ
/// - search: タイトルの部分一致（大文字小文字を区別しない）
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListBooksQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let filter = BookFilter {
        author_id: query.author_id.map(AuthorId::new),
        is_borrowed: query.is_borrowed,
        search: query.search.filter(|search| !search.trim().is_empty()),
    };

    let books = catalog::list_books(&state.service_deps, &filter).await?;
    Ok(Json(books.into_iter().map(Into::into).collect()))
}

/// GET /books/:id - 著者と貸出記録を含む書籍詳細
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<BookResponse>, ApiError> {
    let details = catalog::get_book(&state.service_deps, BookId::new(id)).await?;
    Ok(Json(details.into()))
}

/// POST /books（管理者のみ）
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiJson(req): ApiJson<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let cmd = CreateBook {
        author_id: AuthorId::new(req.author_id),
        title: req.title,
        description: req.description,
        published_year: req.published_year,
        isbn: req.isbn,
        available_count: req.available_count,
        requested_at: Utc::now(),
    };

    let book = catalog::create_book(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// PATCH /books/:id（管理者のみ）
///
/// `availableCount`を指定すると在庫数を直接編集する。
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(req): ApiJson<UpdateBookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let cmd = UpdateBook {
        book_id: BookId::new(id),
        author_id: req.author_id.map(AuthorId::new),
        title: req.title,
        description: req.description,
        published_year: req.published_year,
        isbn: req.isbn,
        available_count: req.available_count,
        requested_at: Utc::now(),
    };

    let book = catalog::update_book(&state.service_deps, cmd).await?;
    Ok(Json(book.into()))
}

/// DELETE /books/:id（管理者のみ）
///
/// 貸出中の記録がある場合は 409。
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = catalog::delete_book(&state.service_deps, BookId::new(id)).await?;
    Ok(Json(book.into()))
}
