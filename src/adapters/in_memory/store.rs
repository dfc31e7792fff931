use crate::domain::{
    self, ActiveBorrow, Author, AuthorChanges, AuthorId, Book, BookChanges, BookFilter, BookId,
    Borrow, BorrowCore, BorrowId, NewAuthor, NewBook, NewBorrow, ReturnedBorrow, UserId,
};
use crate::ports::{
    AuthorDeletion, AuthorWithBooks, BookDeletion, BookDetails, BookWithAuthor, BorrowReadModel,
    BorrowView, CatalogStore, InventoryStore, InventoryTransaction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Points where the store can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Begin,
    InsertBorrow,
    MarkReturned,
    UpdateAvailableCount,
    Commit,
}

/// Error produced by an injected fault.
#[derive(Debug, thiserror::Error)]
#[error("injected storage fault at {0:?}")]
pub struct InjectedFault(pub FaultPoint);

/// Error produced when a write references a row that does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MissingRow(String);

#[derive(Debug, Clone, Default)]
struct State {
    authors: BTreeMap<AuthorId, Author>,
    books: BTreeMap<BookId, Book>,
    borrows: BTreeMap<BorrowId, Borrow>,
    last_author_id: i32,
    last_book_id: i32,
    last_borrow_id: i32,
}

impl State {
    fn books_of(&self, author_id: AuthorId) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .books
            .values()
            .filter(|book| book.author_id == author_id)
            .cloned()
            .collect();
        sort_books(&mut books);
        books
    }

    fn borrows_of_book(&self, book_id: BookId) -> impl Iterator<Item = &Borrow> {
        self.borrows
            .values()
            .filter(move |borrow| borrow.core().book_id == book_id)
    }

    fn with_author(&self, book: Book) -> Result<BookWithAuthor> {
        let author = self
            .authors
            .get(&book.author_id)
            .cloned()
            .ok_or_else(|| MissingRow(format!("author {} of book {}", book.author_id, book.book_id)))?;
        Ok(BookWithAuthor { book, author })
    }

    fn views_for_user<F>(&self, user_id: UserId, keep: F, include_author: bool) -> Result<Vec<BorrowView>>
    where
        F: Fn(&Borrow) -> bool,
    {
        let mut borrows: Vec<Borrow> = self
            .borrows
            .values()
            .filter(|borrow| borrow.core().user_id == user_id && keep(borrow))
            .cloned()
            .collect();
        domain::borrow::sort_most_recent_first(&mut borrows);

        borrows
            .into_iter()
            .map(|borrow| -> Result<BorrowView> {
                let book_id = borrow.core().book_id;
                let BookWithAuthor { book, author } = self.with_author(
                    self.books
                        .get(&book_id)
                        .cloned()
                        .ok_or_else(|| MissingRow(format!("book {}", book_id)))?,
                )?;
                Ok(BorrowView {
                    borrow,
                    book,
                    author: include_author.then_some(author),
                })
            })
            .collect()
    }
}

fn sort_books(books: &mut [Book]) {
    books.sort_by(|a, b| (b.created_at, b.book_id).cmp(&(a.created_at, a.book_id)));
}

/// In-memory implementation of every storage port.
///
/// A transaction holds the state lock for its whole lifetime and writes to a
/// private copy that replaces the shared state only on commit, so transactions
/// are serialized and never partially visible.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fault: Arc<std::sync::Mutex<Option<FaultPoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation reaching `point` fail.
    pub fn inject_fault(&self, point: FaultPoint) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(point);
    }

    fn trip(fault: &std::sync::Mutex<Option<FaultPoint>>, point: FaultPoint) -> Result<()> {
        let mut armed = fault.lock().unwrap_or_else(PoisonError::into_inner);
        if *armed == Some(point) {
            *armed = None;
            return Err(Box::new(InjectedFault(point)));
        }
        Ok(())
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    fault: Arc<std::sync::Mutex<Option<FaultPoint>>>,
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTransaction>> {
        Self::trip(&self.fault, FaultPoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            fault: self.fault.clone(),
        }))
    }
}

#[async_trait]
impl InventoryTransaction for InMemoryTransaction {
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn find_active_borrow(
        &mut self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<ActiveBorrow>> {
        Ok(domain::borrow::select_active_borrow(
            self.working
                .borrows_of_book(book_id)
                .filter(|borrow| borrow.core().user_id == user_id),
        ))
    }

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> Result<ActiveBorrow> {
        InMemoryStore::trip(&self.fault, FaultPoint::InsertBorrow)?;

        self.working.last_borrow_id += 1;
        let active = ActiveBorrow {
            core: BorrowCore {
                borrow_id: BorrowId::new(self.working.last_borrow_id),
                user_id: borrow.user_id,
                book_id: borrow.book_id,
                borrowed_at: borrow.borrowed_at,
            },
        };
        self.working
            .borrows
            .insert(active.borrow_id, Borrow::Active(active.clone()));
        Ok(active)
    }

    async fn mark_returned(&mut self, borrow: &ReturnedBorrow) -> Result<()> {
        InMemoryStore::trip(&self.fault, FaultPoint::MarkReturned)?;

        let slot = self
            .working
            .borrows
            .get_mut(&borrow.borrow_id)
            .filter(|stored| stored.is_active())
            .ok_or_else(|| MissingRow(format!("active borrow {}", borrow.borrow_id)))?;
        *slot = Borrow::Returned(borrow.clone());
        Ok(())
    }

    async fn update_available_count(&mut self, book: &Book) -> Result<()> {
        InMemoryStore::trip(&self.fault, FaultPoint::UpdateAvailableCount)?;

        let stored = self
            .working
            .books
            .get_mut(&book.book_id)
            .ok_or_else(|| MissingRow(format!("book {}", book.book_id)))?;
        stored.available_count = book.available_count;
        stored.updated_at = book.updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        InMemoryStore::trip(&self.fault, FaultPoint::Commit)?;

        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl BorrowReadModel for InMemoryStore {
    async fn find_active_by_user(&self, user_id: UserId) -> Result<Vec<BorrowView>> {
        let state = self.state.lock().await;
        state.views_for_user(user_id, Borrow::is_active, true)
    }

    async fn find_history_by_user(&self, user_id: UserId) -> Result<Vec<BorrowView>> {
        let state = self.state.lock().await;
        state.views_for_user(user_id, |_| true, false)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_author(&self, author: &NewAuthor, now: DateTime<Utc>) -> Result<Author> {
        let mut state = self.state.lock().await;
        state.last_author_id += 1;
        let created = Author {
            author_id: AuthorId::new(state.last_author_id),
            name: author.name.clone(),
            bio: author.bio.clone(),
            created_at: now,
            updated_at: now,
        };
        state.authors.insert(created.author_id, created.clone());
        Ok(created)
    }

    async fn list_authors(&self) -> Result<Vec<AuthorWithBooks>> {
        let state = self.state.lock().await;
        let mut authors: Vec<&Author> = state.authors.values().collect();
        authors.sort_by(|a, b| (b.created_at, b.author_id).cmp(&(a.created_at, a.author_id)));
        Ok(authors
            .into_iter()
            .map(|author| AuthorWithBooks {
                author: author.clone(),
                books: state.books_of(author.author_id),
            })
            .collect())
    }

    async fn find_author(&self, author_id: AuthorId) -> Result<Option<AuthorWithBooks>> {
        let state = self.state.lock().await;
        Ok(state.authors.get(&author_id).map(|author| AuthorWithBooks {
            author: author.clone(),
            books: state.books_of(author_id),
        }))
    }

    async fn author_exists(&self, author_id: AuthorId) -> Result<bool> {
        Ok(self.state.lock().await.authors.contains_key(&author_id))
    }

    async fn update_author(
        &self,
        author_id: AuthorId,
        changes: &AuthorChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Author>> {
        let mut state = self.state.lock().await;
        Ok(state.authors.get_mut(&author_id).map(|author| {
            if let Some(name) = &changes.name {
                author.name = name.clone();
            }
            if let Some(bio) = &changes.bio {
                author.bio = Some(bio.clone());
            }
            author.updated_at = now;
            author.clone()
        }))
    }

    async fn delete_author(&self, author_id: AuthorId) -> Result<Option<AuthorDeletion>> {
        let mut state = self.state.lock().await;
        let Some(author) = state.authors.remove(&author_id) else {
            return Ok(None);
        };

        let book_ids: Vec<BookId> = state
            .books
            .values()
            .filter(|book| book.author_id == author_id)
            .map(|book| book.book_id)
            .collect();

        state
            .borrows
            .retain(|_, borrow| !book_ids.contains(&borrow.core().book_id));
        for book_id in &book_ids {
            state.books.remove(book_id);
        }

        Ok(Some(AuthorDeletion {
            author,
            deleted_book_count: book_ids.len(),
        }))
    }

    async fn create_book(&self, book: &NewBook, now: DateTime<Utc>) -> Result<Book> {
        let mut state = self.state.lock().await;
        if !state.authors.contains_key(&book.author_id) {
            return Err(Box::new(MissingRow(format!("author {}", book.author_id))));
        }
        state.last_book_id += 1;
        let created = Book {
            book_id: BookId::new(state.last_book_id),
            author_id: book.author_id,
            title: book.title.clone(),
            description: book.description.clone(),
            published_year: book.published_year,
            isbn: book.isbn.clone(),
            available_count: book.available_count,
            created_at: now,
            updated_at: now,
        };
        state.books.insert(created.book_id, created.clone());
        Ok(created)
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookWithAuthor>> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|book| filter.matches(book))
            .cloned()
            .collect();
        sort_books(&mut books);
        books
            .into_iter()
            .map(|book| state.with_author(book))
            .collect()
    }

    async fn find_book(&self, book_id: BookId) -> Result<Option<BookDetails>> {
        let state = self.state.lock().await;
        let Some(book) = state.books.get(&book_id).cloned() else {
            return Ok(None);
        };
        let mut borrows: Vec<Borrow> = state.borrows_of_book(book_id).cloned().collect();
        domain::borrow::sort_most_recent_first(&mut borrows);
        let BookWithAuthor { book, author } = state.with_author(book)?;
        Ok(Some(BookDetails {
            book,
            author,
            borrows,
        }))
    }

    async fn update_book(
        &self,
        book_id: BookId,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Book>> {
        let mut state = self.state.lock().await;
        if let Some(author_id) = changes.author_id {
            if !state.authors.contains_key(&author_id) {
                return Err(Box::new(MissingRow(format!("author {}", author_id))));
            }
        }
        Ok(state.books.get_mut(&book_id).map(|book| {
            *book = changes.apply_to(book, now);
            book.clone()
        }))
    }

    async fn delete_book(&self, book_id: BookId) -> Result<BookDeletion> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&book_id) {
            return Ok(BookDeletion::NotFound);
        }
        if state.borrows_of_book(book_id).any(Borrow::is_active) {
            return Ok(BookDeletion::HasActiveBorrows);
        }

        state
            .borrows
            .retain(|_, borrow| borrow.core().book_id != book_id);
        let book = state
            .books
            .remove(&book_id)
            .ok_or_else(|| MissingRow(format!("book {}", book_id)))?;
        Ok(BookDeletion::Deleted(book))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthorName, AvailableCount, BookTitle};

    async fn seed(store: &InMemoryStore, available: u32) -> Book {
        let now = Utc::now();
        let author = store
            .create_author(
                &NewAuthor {
                    name: AuthorName::parse("Le Guin").unwrap(),
                    bio: None,
                },
                now,
            )
            .await
            .unwrap();
        store
            .create_book(
                &NewBook {
                    author_id: author.author_id,
                    title: BookTitle::parse("A Wizard of Earthsea").unwrap(),
                    description: None,
                    published_year: Some(1968),
                    isbn: None,
                    available_count: AvailableCount::new(available),
                },
                now,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_discarded() {
        let store = InMemoryStore::new();
        let book = seed(&store, 2).await;

        {
            let mut tx = store.begin().await.unwrap();
            let locked = tx.lock_book(book.book_id).await.unwrap().unwrap();
            tx.insert_borrow(&NewBorrow {
                user_id: UserId::new(1),
                book_id: book.book_id,
                borrowed_at: Utc::now(),
            })
            .await
            .unwrap();
            let updated = Book {
                available_count: AvailableCount::new(1),
                ..locked
            };
            tx.update_available_count(&updated).await.unwrap();
            // commit せずに破棄
        }

        let details = store.find_book(book.book_id).await.unwrap().unwrap();
        assert_eq!(details.book.available_count.value(), 2);
        assert!(details.borrows.is_empty());
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = InMemoryStore::new();
        let book = seed(&store, 2).await;

        let mut tx = store.begin().await.unwrap();
        let active = tx
            .insert_borrow(&NewBorrow {
                user_id: UserId::new(1),
                book_id: book.book_id,
                borrowed_at: Utc::now(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let details = store.find_book(book.book_id).await.unwrap().unwrap();
        assert_eq!(details.borrows, vec![Borrow::Active(active)]);
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let store = InMemoryStore::new();
        store.inject_fault(FaultPoint::Begin);

        assert!(store.begin().await.is_err());
        assert!(store.begin().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_book_refuses_when_active_borrow_exists() {
        let store = InMemoryStore::new();
        let book = seed(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_borrow(&NewBorrow {
            user_id: UserId::new(3),
            book_id: book.book_id,
            borrowed_at: Utc::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store.delete_book(book.book_id).await.unwrap(),
            BookDeletion::HasActiveBorrows
        );
    }
}
