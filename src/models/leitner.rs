//! Leitner box scheduling.
//!
//! Every card sits in one of five boxes; the box decides how long the card rests
//! before it is due again (see [`BOX_INTERVAL_DAYS`]):
//! - Remembered: the card moves one box up, staying in box 5 once it gets there
//! - Forgotten: the card moves one box down (or back to box 1 under
//!   [`DemotionPolicy::ResetToFirst`]), staying in box 1 at the bottom
//! - The next review date is the review day plus the interval of the new box
//! - A card is due when its next review date is today or earlier
//!
//! [`BOX_INTERVAL_DAYS`]: super::leitner_box::BOX_INTERVAL_DAYS

use super::{Flashcard, LeitnerBox};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// The user's judgement on a reviewed card.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Remembered,
    Forgotten,
}

/// What happens to a forgotten card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemotionPolicy {
    /// Down one box.
    #[default]
    StepDown,
    /// Straight back to box 1.
    ResetToFirst,
}

/// Scheduling fields produced by applying an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub leitner_box: LeitnerBox,
    pub next_review_date: NaiveDate,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LeitnerScheduler {
    pub demotion: DemotionPolicy,
}

impl LeitnerScheduler {
    pub fn new(demotion: DemotionPolicy) -> Self {
        Self { demotion }
    }

    /// Box a card lands in after `outcome`.
    pub fn next_box(&self, current: LeitnerBox, outcome: Outcome) -> LeitnerBox {
        match (outcome, self.demotion) {
            (Outcome::Remembered, _) => current.promoted(),
            (Outcome::Forgotten, DemotionPolicy::StepDown) => current.demoted(),
            (Outcome::Forgotten, DemotionPolicy::ResetToFirst) => LeitnerBox::FIRST,
        }
    }

    /// Computes the new box and review date; does not touch storage.
    pub fn apply_outcome(
        &self,
        current: LeitnerBox,
        outcome: Outcome,
        today: NaiveDate,
    ) -> Schedule {
        let leitner_box = self.next_box(current, outcome);
        Schedule {
            leitner_box,
            next_review_date: review_date_for(leitner_box, today),
        }
    }

    /// Cards due on `today`, hardest first.
    ///
    /// Ordered by box, then by next review date (stalest first), then by id, so
    /// the same input always yields the same session. `limit` keeps a prefix.
    pub fn select_due(
        &self,
        cards: impl IntoIterator<Item = Flashcard>,
        today: NaiveDate,
        limit: Option<usize>,
    ) -> Vec<Flashcard> {
        let mut due: Vec<Flashcard> = cards.into_iter().filter(|c| c.is_due(today)).collect();
        due.sort_by_key(|c| (c.leitner_box, c.next_review_date, c.id));
        if let Some(limit) = limit {
            due.truncate(limit);
        }
        due
    }
}

fn review_date_for(leitner_box: LeitnerBox, today: NaiveDate) -> NaiveDate {
    // Saturates at the calendar's end instead of overflowing.
    today
        .checked_add_days(Days::new(u64::from(leitner_box.interval_days())))
        .unwrap_or(NaiveDate::MAX)
}
