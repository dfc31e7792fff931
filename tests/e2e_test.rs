use axum::body::Body;
use axum::http::{Request, StatusCode};
use library_borrow::api::handlers::AppState;
use library_borrow::api::router::create_router;
use library_borrow::application::ServiceDependencies;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

mod common;

// ============================================================================
// E2Eテスト用のヘルパー関数
// ============================================================================

const ADMIN_ID: &str = "1";

/// E2Eテスト用のアプリケーションセットアップ
///
/// インメモリストアと実際のAPIルーターを使用します。
fn setup_e2e_app() -> (axum::Router, ServiceDependencies) {
    let (_store, service_deps) = common::in_memory_deps();
    let app_state = Arc::new(AppState {
        service_deps: service_deps.clone(),
    });
    (create_router(app_state), service_deps)
}

/// リクエストを送信し、ステータスとJSONボディを返す
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    identity: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = identity {
        builder = builder
            .header("x-user-id", user_id)
            .header("x-user-role", role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

fn user(id: &str) -> Option<(&str, &str)> {
    Some((id, "USER"))
}

fn admin() -> Option<(&'static str, &'static str)> {
    Some((ADMIN_ID, "ADMIN"))
}

/// 管理者として著者と書籍を登録し、書籍IDを返す
async fn create_catalog(app: &axum::Router, available: i64) -> i64 {
    let (status, author) = send(
        app,
        "POST",
        "/authors",
        admin(),
        Some(json!({"name": "Ursula K. Le Guin", "bio": "Earthsea"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, book) = send(
        app,
        "POST",
        "/books",
        admin(),
        Some(json!({
            "title": "A Wizard of Earthsea",
            "authorId": author["id"],
            "publishedYear": 1968,
            "availableCount": available
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    book["id"].as_i64().unwrap()
}

// ============================================================================
// E2Eテスト
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup_e2e_app();

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let (app, _) = setup_e2e_app();
    let book_id = create_catalog(&app, 2).await;

    // 1. 借りる
    let (status, body) = send(&app, "POST", "/borrow", user("7"), Some(json!({"bookId": book_id}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Book borrowed successfully");
    assert_eq!(body["borrow"]["status"], "BORROWED");
    assert_eq!(body["borrow"]["userId"], 7);
    assert_eq!(body["borrow"]["returnedAt"], Value::Null);
    assert_eq!(body["borrow"]["book"]["availablecount"], 1);
    assert_eq!(body["borrow"]["book"]["isBorrowed"], false);

    // 2. 自分の貸出中の一覧（書籍と著者を含む）
    let (status, body) = send(&app, "GET", "/borrow/me", user("7"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["book"]["author"]["name"], "Ursula K. Le Guin");

    // 3. 返却
    let (status, body) = send(
        &app,
        "POST",
        "/borrow/return",
        user("7"),
        Some(json!({"bookId": book_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book returned successfully");
    assert_eq!(body["borrow"]["status"], "RETURNED");
    assert!(body["borrow"]["returnedAt"].is_string());
    assert_eq!(body["borrow"]["book"]["availablecount"], 2);

    // 4. 二度目の返却は貸出中の記録がない
    let (status, body) = send(
        &app,
        "POST",
        "/borrow/return",
        user("7"),
        Some(json!({"bookId": book_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");
    assert_eq!(body["message"], "You do not have an active borrow for this book");

    // 5. 貸出中の一覧は空、履歴には1件
    let (_, body) = send(&app, "GET", "/borrow/me", user("7"), None).await;
    assert_eq!(body, json!([]));
    let (status, body) = send(&app, "GET", "/borrow/user/7/history", user("7"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(body[0]["book"].get("author").is_none());
}

#[tokio::test]
async fn test_borrow_out_of_stock_is_conflict() {
    let (app, _) = setup_e2e_app();
    let book_id = create_catalog(&app, 1).await;

    let (status, _) = send(&app, "POST", "/borrow", user("7"), Some(json!({"bookId": book_id}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/borrow", user("8"), Some(json!({"bookId": book_id}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Book is out of stock");

    // 書籍一覧で貸出中として見える
    let (_, books) = send(&app, "GET", "/books?isBorrowed=true", None, None).await;
    assert_eq!(books.as_array().unwrap().len(), 1);
    assert_eq!(books[0]["availablecount"], 0);
    assert_eq!(books[0]["isBorrowed"], true);
}

#[tokio::test]
async fn test_borrow_unknown_book_is_not_found() {
    let (app, _) = setup_e2e_app();

    let (status, body) = send(&app, "POST", "/borrow", user("7"), Some(json!({"bookId": 404}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
    assert_eq!(body["message"], "Book with id 404 not found");
}

#[tokio::test]
async fn test_identity_and_role_checks() {
    let (app, _) = setup_e2e_app();

    // ヘッダーなし
    let (status, body) = send(&app, "POST", "/borrow", None, Some(json!({"bookId": 1}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    // 管理者専用
    let (status, _) = send(&app, "GET", "/borrow/user/8", user("7"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        "POST",
        "/authors",
        user("7"),
        Some(json!({"name": "Nobody"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 他人の履歴は管理者のみ
    let (status, _) = send(&app, "GET", "/borrow/user/8/history", user("7"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, "GET", "/borrow/user/8/history", admin(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    let (status, _) = send(&app, "GET", "/borrow/user/8", admin(), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_requests_are_bad_request() {
    let (app, _) = setup_e2e_app();

    let (status, body) = send(&app, "POST", "/borrow", user("7"), Some(json!({"book": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");

    let (status, _) = send(&app, "GET", "/books/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/authors",
        admin(),
        Some(json!({"name": "X"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_catalog_crud() {
    let (app, _) = setup_e2e_app();
    let book_id = create_catalog(&app, 1).await;

    // 公開の参照
    let (status, authors) = send(&app, "GET", "/authors", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(authors[0]["books"][0]["id"], book_id);
    let author_id = authors[0]["id"].as_i64().unwrap();

    let (status, book) = send(&app, "GET", &format!("/books/{}", book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["author"]["id"], author_id);
    assert_eq!(book["borrows"], json!([]));

    // 書籍の更新（小文字キーの在庫数も受け付ける）
    let (status, book) = send(
        &app,
        "PATCH",
        &format!("/books/{}", book_id),
        admin(),
        Some(json!({"availablecount": 5, "isbn": "978-0553383041"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["availablecount"], 5);
    assert_eq!(book["isbn"], "978-0553383041");
    assert_eq!(book["title"], "A Wizard of Earthsea");

    // 検索
    let (_, found) = send(&app, "GET", "/books?search=wizard", None, None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    let (_, none) = send(&app, "GET", "/books?search=dragon", None, None).await;
    assert_eq!(none, json!([]));

    // 著者の更新
    let (status, author) = send(
        &app,
        "PATCH",
        &format!("/authors/{}", author_id),
        admin(),
        Some(json!({"bio": "Author of Earthsea"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(author["bio"], "Author of Earthsea");
    assert_eq!(author["name"], "Ursula K. Le Guin");

    // 著者の削除は書籍も削除する
    let (status, deleted) = send(
        &app,
        "DELETE",
        &format!("/authors/{}", author_id),
        admin(),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deletedBookCount"], 1);
    assert_eq!(deleted["author"]["id"], author_id);

    let (status, _) = send(&app, "GET", &format!("/books/{}", book_id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_book_with_active_borrow_is_conflict() {
    let (app, _) = setup_e2e_app();
    let book_id = create_catalog(&app, 1).await;
    send(&app, "POST", "/borrow", user("7"), Some(json!({"bookId": book_id}))).await;

    let (status, body) = send(&app, "DELETE", &format!("/books/{}", book_id), admin(), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Book has active borrows");

    send(
        &app,
        "POST",
        "/borrow/return",
        user("7"),
        Some(json!({"bookId": book_id})),
    )
    .await;
    let (status, body) = send(&app, "DELETE", &format!("/books/{}", book_id), admin(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], book_id);
}
