//! Flashcard is a pair <term, definition> plus its Leitner scheduling state.
use super::LeitnerBox;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Card content as typed by the user or read from an imported deck.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub term: String,
    pub definition: String,
}

/// A persisted flashcard. Scheduling fields are mandatory; defaults are
/// applied once, in [`Flashcard::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub owner: String,
    pub deck_name: String,
    pub content: CardContent,
    pub leitner_box: LeitnerBox,
    pub next_review_date: NaiveDate,
}

impl Flashcard {
    /// A freshly created card: first box, due on the day it is created.
    pub fn new(
        id: i64,
        owner: impl Into<String>,
        deck_name: impl Into<String>,
        content: CardContent,
        today: NaiveDate,
    ) -> Self {
        Self {
            id,
            owner: owner.into(),
            deck_name: deck_name.into(),
            content,
            leitner_box: LeitnerBox::FIRST,
            next_review_date: today,
        }
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }
}
