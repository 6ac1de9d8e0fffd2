//! Persistence boundary for flashcards.

pub mod db;
pub mod memory;

pub use db::SqliteStore;
pub use memory::MemoryStore;

use crate::models::{Flashcard, LeitnerBox};
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("flashcard not found: {0}")]
    NotFound(i64),
    #[error("corrupt record for flashcard {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("invalid stored calendar date {0}")]
    Calendar(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// What a review session needs from storage.
///
/// Implementations use interior mutability so a store can be shared between a
/// session and the rest of the application.
pub trait FlashcardStore {
    /// All cards of `owner`, optionally restricted to one deck. Not filtered by
    /// due-ness.
    fn get_flashcards(
        &self,
        owner: &str,
        deck: Option<&str>,
    ) -> Result<Vec<Flashcard>, StoreError>;

    /// A single card, or `None` once it has been deleted.
    fn get_flashcard(&self, id: i64) -> Result<Option<Flashcard>, StoreError>;

    /// Overwrites the scheduling fields of a card. Writing the same values twice
    /// leaves the same state.
    fn update_schedule(
        &self,
        id: i64,
        leitner_box: LeitnerBox,
        next_review_date: NaiveDate,
    ) -> Result<(), StoreError>;
}
