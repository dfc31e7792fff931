use crate::application::ServiceDependencies;
use crate::domain::{
    Author, AuthorChanges, AuthorId, AuthorName, AvailableCount, Book, BookChanges, BookFilter,
    BookId, BookTitle, CatalogValidationError, NewAuthor, NewBook,
    commands::{CreateAuthor, CreateBook, UpdateAuthor, UpdateBook},
};
use crate::ports::{AuthorDeletion, AuthorWithBooks, BookDeletion, BookDetails, BookWithAuthor};

use super::errors::{CatalogApplicationError, Result};

fn parse_available_count(value: i64) -> Result<AvailableCount> {
    AvailableCount::try_from(value)
        .map_err(|_| CatalogValidationError::NegativeAvailableCount.into())
}

/// 参照先の著者が存在することを確認する
async fn ensure_author_exists(deps: &ServiceDependencies, author_id: AuthorId) -> Result<()> {
    let exists = deps
        .catalog_store
        .author_exists(author_id)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?;

    if !exists {
        return Err(CatalogApplicationError::AuthorNotFound(author_id));
    }
    Ok(())
}

// ============================================================================
// 著者
// ============================================================================

#[tracing::instrument(skip_all)]
pub async fn create_author(deps: &ServiceDependencies, cmd: CreateAuthor) -> Result<Author> {
    let new_author = NewAuthor {
        name: AuthorName::parse(cmd.name)?,
        bio: cmd.bio,
    };

    let author = deps
        .catalog_store
        .create_author(&new_author, cmd.requested_at)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?;

    tracing::info!(author_id = %author.author_id, "author created");
    Ok(author)
}

pub async fn list_authors(deps: &ServiceDependencies) -> Result<Vec<AuthorWithBooks>> {
    deps.catalog_store
        .list_authors()
        .await
        .map_err(CatalogApplicationError::StorageFailure)
}

pub async fn get_author(deps: &ServiceDependencies, author_id: AuthorId) -> Result<AuthorWithBooks> {
    deps.catalog_store
        .find_author(author_id)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?
        .ok_or(CatalogApplicationError::AuthorNotFound(author_id))
}

#[tracing::instrument(skip_all, fields(author_id = %cmd.author_id))]
pub async fn update_author(deps: &ServiceDependencies, cmd: UpdateAuthor) -> Result<Author> {
    let changes = AuthorChanges {
        name: cmd.name.map(AuthorName::parse).transpose()?,
        bio: cmd.bio,
    };

    deps.catalog_store
        .update_author(cmd.author_id, &changes, cmd.requested_at)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?
        .ok_or(CatalogApplicationError::AuthorNotFound(cmd.author_id))
}

/// 著者を削除する
///
/// 著書とその貸出記録（貸出中のものを含む）も同じトランザクションで削除される。
#[tracing::instrument(skip(deps))]
pub async fn delete_author(
    deps: &ServiceDependencies,
    author_id: AuthorId,
) -> Result<AuthorDeletion> {
    let deletion = deps
        .catalog_store
        .delete_author(author_id)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?
        .ok_or(CatalogApplicationError::AuthorNotFound(author_id))?;

    tracing::info!(
        deleted_book_count = deletion.deleted_book_count,
        "author deleted"
    );
    Ok(deletion)
}

// ============================================================================
// 書籍
// ============================================================================

#[tracing::instrument(skip_all, fields(author_id = %cmd.author_id))]
pub async fn create_book(deps: &ServiceDependencies, cmd: CreateBook) -> Result<BookWithAuthor> {
    let new_book = NewBook {
        author_id: cmd.author_id,
        title: BookTitle::parse(cmd.title)?,
        description: cmd.description,
        published_year: cmd.published_year,
        isbn: cmd.isbn,
        available_count: cmd
            .available_count
            .map(parse_available_count)
            .transpose()?
            .unwrap_or_default(),
    };

    ensure_author_exists(deps, new_book.author_id).await?;

    let book = deps
        .catalog_store
        .create_book(&new_book, cmd.requested_at)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?;

    tracing::info!(book_id = %book.book_id, "book created");
    with_author(deps, book).await
}

pub async fn list_books(
    deps: &ServiceDependencies,
    filter: &BookFilter,
) -> Result<Vec<BookWithAuthor>> {
    deps.catalog_store
        .list_books(filter)
        .await
        .map_err(CatalogApplicationError::StorageFailure)
}

pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<BookDetails> {
    deps.catalog_store
        .find_book(book_id)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?
        .ok_or(CatalogApplicationError::BookNotFound(book_id))
}

/// 書籍を更新する
///
/// `available_count`の指定は管理者による在庫数の直接編集となる。
#[tracing::instrument(skip_all, fields(book_id = %cmd.book_id))]
pub async fn update_book(deps: &ServiceDependencies, cmd: UpdateBook) -> Result<BookWithAuthor> {
    let changes = BookChanges {
        author_id: cmd.author_id,
        title: cmd.title.map(BookTitle::parse).transpose()?,
        description: cmd.description,
        published_year: cmd.published_year,
        isbn: cmd.isbn,
        available_count: cmd
            .available_count
            .map(parse_available_count)
            .transpose()?,
    };

    if let Some(author_id) = changes.author_id {
        ensure_author_exists(deps, author_id).await?;
    }

    let book = deps
        .catalog_store
        .update_book(cmd.book_id, &changes, cmd.requested_at)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?
        .ok_or(CatalogApplicationError::BookNotFound(cmd.book_id))?;

    if let Some(count) = changes.available_count {
        tracing::info!(available_count = count.value(), "stock edited");
    }
    with_author(deps, book).await
}

/// 書籍を削除する
///
/// 貸出中の記録がある場合は拒否する。返却済みの記録は書籍と共に削除される。
#[tracing::instrument(skip(deps))]
pub async fn delete_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    match deps
        .catalog_store
        .delete_book(book_id)
        .await
        .map_err(CatalogApplicationError::StorageFailure)?
    {
        BookDeletion::Deleted(book) => {
            tracing::info!("book deleted");
            Ok(book)
        }
        BookDeletion::NotFound => Err(CatalogApplicationError::BookNotFound(book_id)),
        BookDeletion::HasActiveBorrows => {
            tracing::warn!("rejected delete: book has active borrows");
            Err(CatalogApplicationError::BookHasActiveBorrows(book_id))
        }
    }
}

async fn with_author(deps: &ServiceDependencies, book: Book) -> Result<BookWithAuthor> {
    let author = get_author(deps, book.author_id).await?.author;
    Ok(BookWithAuthor { book, author })
}
