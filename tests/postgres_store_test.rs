//! PostgreSQLアダプターの統合テスト
//!
//! 実際のデータベースが必要なため`#[ignore]`を付けている。
//! `DATABASE_URL=... cargo test -- --ignored` で実行する。

use chrono::Utc;
use library_borrow::adapters::postgres::{PgBorrowReadModel, PgCatalogStore, PgInventoryStore};
use library_borrow::application::borrow::{
    BorrowApplicationError, active_borrows_for_user, borrow_book, borrow_history_for_user,
    return_book,
};
use library_borrow::application::{ErrorKind, ServiceDependencies, catalog};
use library_borrow::domain::commands::{BorrowBook, ReturnBook, UpdateBook};
use library_borrow::domain::{BookFilter, BookId, BorrowStatus, UserId};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;

mod common;

async fn setup() -> (PgPool, ServiceDependencies) {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;

    let deps = ServiceDependencies {
        inventory_store: Arc::new(PgInventoryStore::new(pool.clone())),
        borrow_read_model: Arc::new(PgBorrowReadModel::new(pool.clone())),
        catalog_store: Arc::new(PgCatalogStore::new(pool.clone())),
    };
    (pool, deps)
}

fn borrow_cmd(user: i32, book_id: BookId) -> BorrowBook {
    BorrowBook {
        user_id: UserId::new(user),
        book_id,
        borrowed_at: Utc::now(),
    }
}

fn return_cmd(user: i32, book_id: BookId) -> ReturnBook {
    ReturnBook {
        user_id: UserId::new(user),
        book_id,
        returned_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_borrow_and_return_round_trip() {
    let (_pool, deps) = setup().await;
    let book_id = common::seed_book(&deps, "A Wizard of Earthsea", 2)
        .await
        .book
        .book_id;

    let borrowed = borrow_book(&deps, borrow_cmd(7, book_id)).await.unwrap();
    assert_eq!(borrowed.book.available_count.value(), 1);

    let active = active_borrows_for_user(&deps, UserId::new(7)).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].book.book_id, book_id);
    assert!(active[0].author.is_some());

    let returned = return_book(&deps, return_cmd(7, book_id)).await.unwrap();
    assert_eq!(returned.book.available_count.value(), 2);
    assert_eq!(returned.borrow.status(), BorrowStatus::Returned);

    let again = return_book(&deps, return_cmd(7, book_id)).await;
    assert!(matches!(again, Err(BorrowApplicationError::NoActiveBorrow)));

    let history = borrow_history_for_user(&deps, UserId::new(7)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].borrow.returned_at().is_some());
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_concurrent_borrows_are_serialized_by_row_lock() {
    // Arrange: 在庫1冊に対して5人が同時に借りる
    let (_pool, deps) = setup().await;
    let book_id = common::seed_book(&deps, "The Left Hand of Darkness", 1)
        .await
        .book
        .book_id;

    let handles: Vec<_> = (1..=5)
        .map(|user| {
            let deps = deps.clone();
            tokio::spawn(async move { borrow_book(&deps, borrow_cmd(user, book_id)).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(e, BorrowApplicationError::OutOfStock)),
        }
    }

    // Assert
    assert_eq!(succeeded, 1);
    let details = catalog::get_book(&deps, book_id).await.unwrap();
    assert_eq!(details.book.available_count.value(), 0);
    assert_eq!(details.borrows.len(), 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_schema_rejects_second_active_borrow() {
    // 部分ユニークインデックスが二重貸出を防ぐ
    let (pool, deps) = setup().await;
    let book_id = common::seed_book(&deps, "The Dispossessed", 3)
        .await
        .book
        .book_id;
    borrow_book(&deps, borrow_cmd(7, book_id)).await.unwrap();

    let result = sqlx::query("INSERT INTO borrows (user_id, book_id, status) VALUES ($1, $2, 'BORROWED')")
        .bind(7)
        .bind(book_id.value())
        .execute(&pool)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_schema_rejects_negative_stock() {
    let (pool, deps) = setup().await;
    let book_id = common::seed_book(&deps, "The Dispossessed", 0)
        .await
        .book
        .book_id;

    let result = sqlx::query("UPDATE books SET available_count = available_count - 1 WHERE id = $1")
        .bind(book_id.value())
        .execute(&pool)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_list_books_filters_in_sql() {
    let (_pool, deps) = setup().await;
    let first = common::seed_book(&deps, "100% Pure Fiction", 1).await;
    common::seed_book(&deps, "1000 Pure Facts", 0).await;

    let literal_percent = catalog::list_books(
        &deps,
        &BookFilter {
            search: Some("100%".to_string()),
            ..BookFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(literal_percent.len(), 1);
    assert_eq!(literal_percent[0].book.book_id, first.book.book_id);

    let borrowed = catalog::list_books(
        &deps,
        &BookFilter {
            is_borrowed: Some(true),
            ..BookFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(borrowed.len(), 1);
    assert!(borrowed[0].book.is_borrowed());

    let by_author = catalog::list_books(
        &deps,
        &BookFilter {
            author_id: Some(first.author.author_id),
            ..BookFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_author.len(), 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_update_book_keeps_unset_columns() {
    let (_pool, deps) = setup().await;
    let seeded = common::seed_book(&deps, "Tehanu", 2).await;

    let updated = catalog::update_book(
        &deps,
        UpdateBook {
            book_id: seeded.book.book_id,
            author_id: None,
            title: None,
            description: Some("The last book of Earthsea".to_string()),
            published_year: None,
            isbn: None,
            available_count: None,
            requested_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.book.title, seeded.book.title);
    assert_eq!(updated.book.available_count, seeded.book.available_count);
    assert_eq!(updated.book.published_year, Some(1968));
    assert_eq!(
        updated.book.description.as_deref(),
        Some("The last book of Earthsea")
    );
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_delete_cascades() {
    // Arrange
    let (pool, deps) = setup().await;
    let seeded = common::seed_book(&deps, "Tehanu", 1).await;
    let book_id = seeded.book.book_id;
    borrow_book(&deps, borrow_cmd(7, book_id)).await.unwrap();

    // 貸出中の書籍は削除できない
    let rejected = catalog::delete_book(&deps, book_id).await.unwrap_err();
    assert_eq!(rejected.kind(), ErrorKind::Conflict);

    // 著者の削除は貸出中の記録も含めて連鎖削除する
    let deletion = catalog::delete_author(&deps, seeded.author.author_id)
        .await
        .unwrap();
    assert_eq!(deletion.deleted_book_count, 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrows")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
