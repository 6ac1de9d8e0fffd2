//! Review session management for Leitner practice.
//! Walks a fixed snapshot of due cards, persisting each outcome as it is given.

use super::leitner::{LeitnerScheduler, Outcome, Schedule};
use super::Flashcard;
use crate::clock::Clock;
use crate::database::{FlashcardStore, StoreError};
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("review session is exhausted")]
    Exhausted,
    #[error("session was built from a card list and cannot re-query the store")]
    NotRestartable,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Exhausted,
}

/// Whose cards a session reviews.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewScope {
    pub owner: String,
    pub deck: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Review at most this many cards; `None` takes every due card.
    pub limit: Option<usize>,
    /// Writes tried per outcome before it is kept for a later sync.
    pub persist_attempts: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            limit: None,
            persist_attempts: 3,
        }
    }
}

/// An outcome that could not be written yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingUpdate {
    pub flashcard_id: i64,
    pub schedule: Schedule,
}

#[derive(Debug)]
pub enum OutcomeReport {
    /// Written to the store.
    Synced { flashcard_id: i64, schedule: Schedule },
    /// Every write attempt failed; kept in [`ReviewSession::pending`].
    Unsynced {
        flashcard_id: i64,
        schedule: Schedule,
        error: StoreError,
    },
    /// The card was deleted while it was on screen; nothing was written.
    Vanished { flashcard_id: i64 },
}

impl OutcomeReport {
    pub fn is_synced(&self) -> bool {
        matches!(self, OutcomeReport::Synced { .. })
    }
}

/// One review pass over the cards that were due when it started.
///
/// The due-set is never re-queried: cards that become due mid-session wait for
/// the next session, and cards deleted from the store are dropped the moment
/// they would be shown.
pub struct ReviewSession<S: FlashcardStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    scheduler: LeitnerScheduler,
    options: SessionOptions,
    scope: Option<ReviewScope>,
    cards: Vec<Flashcard>,
    cursor: usize,
    reviewed: usize,
    pending: Vec<PendingUpdate>,
}

impl<S: FlashcardStore + ?Sized> ReviewSession<S> {
    /// Loads the scope's cards from the store and snapshots the due ones.
    pub fn start(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        scheduler: LeitnerScheduler,
        scope: ReviewScope,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let cards = store.get_flashcards(&scope.owner, scope.deck.as_deref())?;
        let today = clock.today();
        let mut session = Self::from_cards(store, clock, scheduler, cards, today, options);
        session.scope = Some(scope);
        Ok(session)
    }

    /// Builds a session from an already fetched card set.
    pub fn from_cards(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        scheduler: LeitnerScheduler,
        cards: Vec<Flashcard>,
        today: NaiveDate,
        options: SessionOptions,
    ) -> Self {
        let due = scheduler.select_due(cards, today, options.limit);
        log::info!("Review session started with {} due cards ({today})", due.len());

        let mut session = Self {
            store,
            clock,
            scheduler,
            options,
            scope: None,
            cards: due,
            cursor: 0,
            reviewed: 0,
            pending: Vec::new(),
        };
        session.surface_current();
        session
    }

    /// A fresh session over the same scope, with the due-set queried again.
    ///
    /// Updates that are still unwritten move to the new session.
    pub fn restart(&self) -> Result<Self, SessionError> {
        let scope = self.scope.clone().ok_or(SessionError::NotRestartable)?;
        let mut fresh = Self::start(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.scheduler,
            scope,
            self.options,
        )?;
        fresh.pending = self.pending.clone();
        Ok(fresh)
    }

    pub fn state(&self) -> SessionState {
        if self.cursor < self.cards.len() {
            SessionState::Active
        } else {
            SessionState::Exhausted
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state() == SessionState::Exhausted
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.cursor)
    }

    /// Cards still to be shown, the current one included.
    pub fn remaining_count(&self) -> usize {
        self.cards.len() - self.cursor
    }

    pub fn reviewed_count(&self) -> usize {
        self.reviewed
    }

    pub fn total_count(&self) -> usize {
        self.cards.len()
    }

    pub fn scope(&self) -> Option<&ReviewScope> {
        self.scope.as_ref()
    }

    /// Applies `outcome` to the current card, writes it back and moves on.
    ///
    /// A failed write does not stop the session: the update is kept as pending
    /// and reported as [`OutcomeReport::Unsynced`].
    pub fn report_outcome(&mut self, outcome: Outcome) -> Result<OutcomeReport, SessionError> {
        let card = self.cards.get(self.cursor).ok_or(SessionError::Exhausted)?;
        let flashcard_id = card.id;
        let schedule = self
            .scheduler
            .apply_outcome(card.leitner_box, outcome, self.clock.today());

        // A newer answer replaces any unwritten one for the same card
        self.pending.retain(|p| p.flashcard_id != flashcard_id);

        let report = match self.persist(flashcard_id, schedule) {
            Ok(()) => OutcomeReport::Synced {
                flashcard_id,
                schedule,
            },
            Err(StoreError::NotFound(_)) => {
                log::debug!("Flashcard {flashcard_id} deleted during review, dropping outcome");
                OutcomeReport::Vanished { flashcard_id }
            }
            Err(error) => {
                log::warn!("Flashcard {flashcard_id} not synced: {error}");
                self.pending.push(PendingUpdate {
                    flashcard_id,
                    schedule,
                });
                OutcomeReport::Unsynced {
                    flashcard_id,
                    schedule,
                    error,
                }
            }
        };

        if let OutcomeReport::Vanished { .. } = report {
            self.cards.remove(self.cursor);
        } else {
            let card = &mut self.cards[self.cursor];
            card.leitner_box = schedule.leitner_box;
            card.next_review_date = schedule.next_review_date;
            self.reviewed += 1;
            self.cursor += 1;
        }
        self.surface_current();

        Ok(report)
    }

    /// Defers the current card without touching its schedule.
    pub fn skip(&mut self) -> Result<(), SessionError> {
        if self.is_exhausted() {
            return Err(SessionError::Exhausted);
        }
        self.cursor += 1;
        self.surface_current();
        Ok(())
    }

    pub fn has_unsynced(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &[PendingUpdate] {
        &self.pending
    }

    /// Tries to write every pending update again; returns how many are left.
    pub fn retry_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        self.pending = sync_pending(&*self.store, pending, self.options.persist_attempts);
        self.pending.len()
    }

    /// Hands over the updates that are still unwritten, leaving none behind.
    pub fn take_pending(&mut self) -> Vec<PendingUpdate> {
        std::mem::take(&mut self.pending)
    }

    /// Takes over updates left unwritten by an earlier session.
    ///
    /// An update for a card this session has already answered is stale and
    /// is dropped.
    pub fn adopt_pending(&mut self, updates: Vec<PendingUpdate>) {
        for update in updates {
            let answered = self.cards[..self.cursor]
                .iter()
                .any(|c| c.id == update.flashcard_id);
            let queued = self
                .pending
                .iter()
                .any(|p| p.flashcard_id == update.flashcard_id);
            if !answered && !queued {
                self.pending.push(update);
            }
        }
    }

    fn persist(&self, flashcard_id: i64, schedule: Schedule) -> Result<(), StoreError> {
        write_with_retry(
            &*self.store,
            flashcard_id,
            schedule,
            self.options.persist_attempts,
        )
    }

    /// Drops cards that left the store before they could be shown and
    /// refreshes the one that is about to be shown.
    fn surface_current(&mut self) {
        while let Some(id) = self.cards.get(self.cursor).map(|c| c.id) {
            match self.store.get_flashcard(id) {
                Ok(Some(fresh)) => {
                    self.cards[self.cursor] = fresh;
                    return;
                }
                Ok(None) => {
                    log::debug!("Flashcard {id} no longer exists, skipping");
                    self.cards.remove(self.cursor);
                }
                Err(e) => {
                    // Show the snapshot copy; the write will tell if it is gone.
                    log::warn!("Cannot refresh flashcard {id}: {e}");
                    return;
                }
            }
        }
    }
}

/// Writes one schedule, retrying up to `attempts` times. `NotFound` is
/// returned at once.
pub fn write_with_retry<S: FlashcardStore + ?Sized>(
    store: &S,
    flashcard_id: i64,
    schedule: Schedule,
    attempts: u32,
) -> Result<(), StoreError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.update_schedule(flashcard_id, schedule.leitner_box, schedule.next_review_date) {
            Ok(()) => return Ok(()),
            Err(e @ StoreError::NotFound(_)) => return Err(e),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                log::warn!(
                    "Write of flashcard {flashcard_id} failed (attempt {attempt}/{attempts}): {e}"
                );
                attempt += 1;
            }
        }
    }
}

/// Writes queued updates; returns the ones that still failed. Updates for
/// deleted cards are dropped.
pub fn sync_pending<S: FlashcardStore + ?Sized>(
    store: &S,
    updates: Vec<PendingUpdate>,
    attempts: u32,
) -> Vec<PendingUpdate> {
    let mut left = Vec::new();
    for update in updates {
        match write_with_retry(store, update.flashcard_id, update.schedule, attempts) {
            Ok(()) => log::info!("Flashcard {} synced", update.flashcard_id),
            Err(StoreError::NotFound(_)) => {
                log::debug!("Flashcard {} deleted before sync", update.flashcard_id)
            }
            Err(e) => {
                log::warn!("Flashcard {} still not synced: {e}", update.flashcard_id);
                left.push(update);
            }
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::database::{MemoryStore, SqliteStore};
    use crate::models::leitner::DemotionPolicy;
    use crate::models::{CardContent, LeitnerBox};
    use chrono::Days;
    use pretty_assertions::assert_eq;

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + Days::new(n)
    }

    fn content(term: &str) -> CardContent {
        CardContent {
            term: term.to_string(),
            definition: format!("definition of {term}"),
        }
    }

    fn scope() -> ReviewScope {
        ReviewScope {
            owner: "ala".to_string(),
            deck: Some("Polish".to_string()),
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        fn new(terms: &[&str]) -> (Self, Vec<i64>) {
            let store = Arc::new(MemoryStore::new());
            let ids = terms
                .iter()
                .map(|t| store.add_flashcard("ala", "Polish", content(t), day(0)).unwrap())
                .collect();
            let clock = Arc::new(FixedClock::new(day(0)));
            (Self { store, clock }, ids)
        }

        fn start(&self, options: SessionOptions) -> ReviewSession<MemoryStore> {
            ReviewSession::start(
                Arc::clone(&self.store),
                self.clock.clone(),
                LeitnerScheduler::default(),
                scope(),
                options,
            )
            .unwrap()
        }

        fn card(&self, id: i64) -> Flashcard {
            self.store.get_flashcard(id).unwrap().unwrap()
        }
    }

    fn current_id<S: FlashcardStore + ?Sized>(session: &ReviewSession<S>) -> Option<i64> {
        session.current().map(|c| c.id)
    }

    #[test]
    fn test_empty_due_set_is_exhausted() {
        let (fx, _) = Fixture::new(&[]);
        let mut session = fx.start(SessionOptions::default());

        assert_eq!(session.state(), SessionState::Exhausted);
        assert!(session.current().is_none());
        assert_eq!(session.remaining_count(), 0);
        assert!(matches!(
            session.report_outcome(Outcome::Remembered),
            Err(SessionError::Exhausted)
        ));
        assert!(matches!(session.skip(), Err(SessionError::Exhausted)));
    }

    #[test]
    fn test_future_cards_are_not_reviewed() {
        let (fx, ids) = Fixture::new(&["kot", "pies"]);
        fx.store.update_schedule(ids[0], LeitnerBox::new(3).unwrap(), day(3)).unwrap();

        let session = fx.start(SessionOptions::default());

        assert_eq!(session.total_count(), 1);
        assert_eq!(current_id(&session), Some(ids[1]));
    }

    #[test]
    fn test_outcome_is_persisted_and_session_advances() {
        let (fx, ids) = Fixture::new(&["kot", "pies"]);
        let mut session = fx.start(SessionOptions::default());

        let report = session.report_outcome(Outcome::Remembered).unwrap();

        assert!(report.is_synced());
        let stored = fx.card(ids[0]);
        assert_eq!(stored.leitner_box.get(), 2);
        assert_eq!(stored.next_review_date, day(1));
        assert_eq!(current_id(&session), Some(ids[1]));
        assert_eq!(session.remaining_count(), 1);
        assert_eq!(session.reviewed_count(), 1);

        session.report_outcome(Outcome::Forgotten).unwrap();
        assert_eq!(fx.card(ids[1]).leitner_box, LeitnerBox::FIRST);
        assert_eq!(fx.card(ids[1]).next_review_date, day(0));
        assert!(session.is_exhausted());
    }

    #[test]
    fn test_mid_session_deletion_is_skipped() {
        let (fx, ids) = Fixture::new(&["a", "b", "c"]);
        let mut session = fx.start(SessionOptions::default());
        assert_eq!(current_id(&session), Some(ids[0]));

        fx.store.delete_flashcard(ids[1]).unwrap();

        session.report_outcome(Outcome::Remembered).unwrap();
        assert_eq!(current_id(&session), Some(ids[2]));
        session.report_outcome(Outcome::Remembered).unwrap();
        assert!(session.is_exhausted());
        assert_eq!(session.reviewed_count(), 2);
    }

    #[test]
    fn test_current_card_deleted_reports_vanished() {
        let (fx, ids) = Fixture::new(&["a", "b"]);
        let mut session = fx.start(SessionOptions::default());

        fx.store.delete_flashcard(ids[0]).unwrap();
        let report = session.report_outcome(Outcome::Remembered).unwrap();

        assert!(matches!(
            report,
            OutcomeReport::Vanished { flashcard_id } if flashcard_id == ids[0]
        ));
        assert!(!session.has_unsynced());
        assert_eq!(current_id(&session), Some(ids[1]));
        assert_eq!(session.reviewed_count(), 0);
    }

    #[test]
    fn test_snapshot_is_not_requeried() {
        let (fx, ids) = Fixture::new(&["a"]);
        let mut session = fx.start(SessionOptions::default());

        let late = fx.store.add_flashcard("ala", "Polish", content("late"), day(0)).unwrap();
        session.report_outcome(Outcome::Remembered).unwrap();
        assert!(session.is_exhausted());

        let fresh = session.restart().unwrap();
        assert_eq!(current_id(&fresh), Some(late));
        assert_eq!(fresh.total_count(), 1);
        assert_ne!(late, ids[0]);
    }

    #[test]
    fn test_skip_leaves_schedule_untouched() {
        let (fx, ids) = Fixture::new(&["a", "b"]);
        let mut session = fx.start(SessionOptions::default());

        session.skip().unwrap();

        assert_eq!(fx.card(ids[0]).leitner_box, LeitnerBox::FIRST);
        assert_eq!(fx.card(ids[0]).next_review_date, day(0));
        assert_eq!(current_id(&session), Some(ids[1]));
        assert_eq!(session.reviewed_count(), 0);
        assert_eq!(session.remaining_count(), 1);
    }

    #[test]
    fn test_limit_caps_the_session() {
        let (fx, ids) = Fixture::new(&["a", "b", "c"]);
        let session = fx.start(SessionOptions {
            limit: Some(2),
            ..SessionOptions::default()
        });

        assert_eq!(session.total_count(), 2);
        assert_eq!(current_id(&session), Some(ids[0]));
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let (fx, ids) = Fixture::new(&["a"]);
        let mut session = fx.start(SessionOptions::default());
        fx.store.fail_next_writes(2).unwrap();

        let report = session.report_outcome(Outcome::Remembered).unwrap();

        assert!(report.is_synced());
        assert_eq!(fx.card(ids[0]).leitner_box.get(), 2);
    }

    #[test]
    fn test_exhausted_retries_degrade_to_unsynced() {
        let (fx, ids) = Fixture::new(&["a", "b"]);
        let mut session = fx.start(SessionOptions {
            persist_attempts: 2,
            ..SessionOptions::default()
        });
        fx.store.fail_next_writes(2).unwrap();

        let report = session.report_outcome(Outcome::Remembered).unwrap();

        assert!(matches!(report, OutcomeReport::Unsynced { .. }));
        assert!(session.has_unsynced());
        assert_eq!(current_id(&session), Some(ids[1]));
        assert_eq!(fx.card(ids[0]).leitner_box, LeitnerBox::FIRST);

        assert_eq!(session.retry_pending(), 0);
        assert!(!session.has_unsynced());
        assert_eq!(fx.card(ids[0]).leitner_box.get(), 2);
        assert_eq!(fx.card(ids[0]).next_review_date, day(1));
    }

    #[test]
    fn test_uses_clock_at_answer_time() {
        let (fx, ids) = Fixture::new(&["a"]);
        let mut session = fx.start(SessionOptions::default());

        fx.clock.advance_days(1);
        session.report_outcome(Outcome::Remembered).unwrap();

        assert_eq!(fx.card(ids[0]).next_review_date, day(2));
    }

    #[test]
    fn test_reset_policy_in_session() {
        let (fx, ids) = Fixture::new(&["a"]);
        fx.store.update_schedule(ids[0], LeitnerBox::LAST, day(0)).unwrap();
        let mut session = ReviewSession::start(
            Arc::clone(&fx.store),
            fx.clock.clone(),
            LeitnerScheduler::new(DemotionPolicy::ResetToFirst),
            scope(),
            SessionOptions::default(),
        )
        .unwrap();

        session.report_outcome(Outcome::Forgotten).unwrap();

        assert_eq!(fx.card(ids[0]).leitner_box, LeitnerBox::FIRST);
    }

    #[test]
    fn test_from_cards_cannot_restart() {
        let (fx, _) = Fixture::new(&["a"]);
        let cards = fx.store.get_flashcards("ala", None).unwrap();
        let session = ReviewSession::from_cards(
            Arc::clone(&fx.store),
            fx.clock.clone(),
            LeitnerScheduler::default(),
            cards,
            day(0),
            SessionOptions::default(),
        );

        assert_eq!(session.total_count(), 1);
        assert!(matches!(session.restart(), Err(SessionError::NotRestartable)));
    }

    #[test]
    fn test_pending_update_for_deleted_card_is_dropped() {
        let (fx, ids) = Fixture::new(&["a", "b"]);
        let mut session = fx.start(SessionOptions {
            persist_attempts: 1,
            ..SessionOptions::default()
        });
        fx.store.fail_next_writes(1).unwrap();
        session.report_outcome(Outcome::Remembered).unwrap();
        assert!(session.has_unsynced());

        fx.store.delete_flashcard(ids[0]).unwrap();

        assert_eq!(session.retry_pending(), 0);
        assert!(!session.has_unsynced());
        assert_eq!(fx.card(ids[1]).leitner_box, LeitnerBox::FIRST);
    }

    #[test]
    fn test_unsynced_updates_survive_leaving_the_session() {
        let (fx, ids) = Fixture::new(&["a", "b"]);
        let mut first = fx.start(SessionOptions {
            persist_attempts: 1,
            ..SessionOptions::default()
        });
        fx.store.fail_next_writes(2).unwrap();
        first.report_outcome(Outcome::Remembered).unwrap();
        assert_eq!(first.retry_pending(), 1);

        let left = first.take_pending();
        drop(first);
        assert_eq!(left.len(), 1);
        assert_eq!(fx.card(ids[0]).leitner_box, LeitnerBox::FIRST);

        let left = sync_pending(&*fx.store, left, 1);
        assert!(left.is_empty());
        assert_eq!(fx.card(ids[0]).leitner_box.get(), 2);
        assert_eq!(fx.card(ids[0]).next_review_date, day(1));
    }

    #[test]
    fn test_adopted_update_is_replaced_by_a_newer_answer() {
        let (fx, ids) = Fixture::new(&["a"]);
        let stale = PendingUpdate {
            flashcard_id: ids[0],
            schedule: Schedule {
                leitner_box: LeitnerBox::new(3).unwrap(),
                next_review_date: day(0),
            },
        };
        let mut session = fx.start(SessionOptions::default());
        fx.store.fail_next_writes(3).unwrap();
        session.adopt_pending(vec![stale]);

        session.report_outcome(Outcome::Remembered).unwrap();

        assert_eq!(session.pending().len(), 1);
        assert_eq!(session.retry_pending(), 0);
        assert_eq!(fx.card(ids[0]).leitner_box.get(), 2);
    }

    #[test]
    fn test_restart_keeps_unsynced_updates() {
        let (fx, ids) = Fixture::new(&["a"]);
        let mut session = fx.start(SessionOptions {
            persist_attempts: 1,
            ..SessionOptions::default()
        });
        fx.store.fail_next_writes(1).unwrap();
        session.report_outcome(Outcome::Remembered).unwrap();

        let mut fresh = session.restart().unwrap();

        // The failed write left the card due, so it is reviewed again
        assert_eq!(current_id(&fresh), Some(ids[0]));
        assert_eq!(fresh.pending().len(), 1);
        fresh.report_outcome(Outcome::Remembered).unwrap();
        assert!(!fresh.has_unsynced());
        assert_eq!(fx.card(ids[0]).leitner_box.get(), 2);
    }

    #[test]
    fn test_review_over_sqlite_with_simulated_calendar() {
        let store = Arc::new(SqliteStore::open_in_memory(day(0)).unwrap());
        store.new_deck("ala", "Polish").unwrap();
        let kot = store
            .add_flashcard("ala", "Polish", &content("kot"), day(0))
            .unwrap();
        let pies = store
            .add_flashcard("ala", "Polish", &content("pies"), day(0))
            .unwrap();
        let clock: Arc<dyn Clock> = store.clone();

        let mut session = ReviewSession::start(
            Arc::clone(&store),
            Arc::clone(&clock),
            LeitnerScheduler::default(),
            scope(),
            SessionOptions::default(),
        )
        .unwrap();
        assert_eq!(session.total_count(), 2);

        assert!(session.report_outcome(Outcome::Remembered).unwrap().is_synced());
        assert!(session.report_outcome(Outcome::Forgotten).unwrap().is_synced());
        assert!(session.is_exhausted());

        let stored = store.get_flashcard(kot).unwrap().unwrap();
        assert_eq!(stored.leitner_box.get(), 2);
        assert_eq!(stored.next_review_date, day(1));

        // Only the forgotten card is due again today
        let again = session.restart().unwrap();
        assert_eq!(current_id(&again), Some(pies));
        assert_eq!(again.total_count(), 1);

        store.advance_day().unwrap();
        let tomorrow = again.restart().unwrap();
        assert_eq!(tomorrow.total_count(), 2);
        assert_eq!(current_id(&tomorrow), Some(pies));
    }
}
