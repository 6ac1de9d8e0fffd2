//! In-process flashcard store, used by tests and as a scratch store.

use super::{FlashcardStore, StoreError};
use crate::models::{CardContent, Flashcard, LeitnerBox};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    cards: BTreeMap<i64, Flashcard>,
    next_id: i64,
    failing_writes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Adds a new card (first box, due `today`) and returns its ID.
    pub fn add_flashcard(
        &self,
        owner: &str,
        deck_name: &str,
        content: CardContent,
        today: NaiveDate,
    ) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.cards.insert(id, Flashcard::new(id, owner, deck_name, content, today));
        Ok(id)
    }

    /// Stores `card` as given, replacing any card with the same ID.
    pub fn insert(&self, card: Flashcard) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.next_id = inner.next_id.max(card.id);
        inner.cards.insert(card.id, card);
        Ok(())
    }

    pub fn delete_flashcard(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.lock()?.cards.remove(&id).is_some())
    }

    /// Makes the next `count` schedule writes fail as if the backend were down.
    pub fn fail_next_writes(&self, count: usize) -> Result<(), StoreError> {
        self.lock()?.failing_writes = count;
        Ok(())
    }
}

impl FlashcardStore for MemoryStore {
    fn get_flashcards(
        &self,
        owner: &str,
        deck: Option<&str>,
    ) -> Result<Vec<Flashcard>, StoreError> {
        Ok(self
            .lock()?
            .cards
            .values()
            .filter(|c| c.owner == owner && deck.is_none_or(|d| c.deck_name == d))
            .cloned()
            .collect())
    }

    fn get_flashcard(&self, id: i64) -> Result<Option<Flashcard>, StoreError> {
        Ok(self.lock()?.cards.get(&id).cloned())
    }

    fn update_schedule(
        &self,
        id: i64,
        leitner_box: LeitnerBox,
        next_review_date: NaiveDate,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(StoreError::Unavailable(format!("write of flashcard {id} rejected")));
        }

        let card = inner.cards.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        card.leitner_box = leitner_box;
        card.next_review_date = next_review_date;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    }

    fn content(term: &str) -> CardContent {
        CardContent {
            term: term.to_string(),
            definition: format!("{term}?"),
        }
    }

    #[test]
    fn test_deck_scoping() {
        let store = MemoryStore::new();
        store.add_flashcard("ala", "A", content("x"), today()).unwrap();
        store.add_flashcard("ala", "B", content("y"), today()).unwrap();
        store.add_flashcard("ola", "A", content("z"), today()).unwrap();

        assert_eq!(store.get_flashcards("ala", None).unwrap().len(), 2);
        assert_eq!(store.get_flashcards("ala", Some("B")).unwrap().len(), 1);
        assert!(store.get_flashcards("nobody", None).unwrap().is_empty());
    }

    #[test]
    fn test_injected_failures_run_out() {
        let store = MemoryStore::new();
        let id = store.add_flashcard("ala", "A", content("x"), today()).unwrap();
        store.fail_next_writes(1).unwrap();

        assert!(matches!(
            store.update_schedule(id, LeitnerBox::LAST, today()),
            Err(StoreError::Unavailable(_))
        ));
        store.update_schedule(id, LeitnerBox::LAST, today()).unwrap();
        assert_eq!(store.get_flashcard(id).unwrap().unwrap().leitner_box, LeitnerBox::LAST);
    }

    #[test]
    fn test_update_deleted_card() {
        let store = MemoryStore::new();
        let id = store.add_flashcard("ala", "A", content("x"), today()).unwrap();
        store.delete_flashcard(id).unwrap();

        assert!(matches!(
            store.update_schedule(id, LeitnerBox::FIRST, today()),
            Err(StoreError::NotFound(_))
        ));
    }
}
