//! Leitner box: the review tier of a flashcard, always within 1..=5.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Days to wait before a card in box `n` is due again, indexed by `n - 1`.
///
/// Box 1 comes back the same day; every higher box waits strictly longer.
pub const BOX_INTERVAL_DAYS: [u32; LeitnerBox::COUNT] = [0, 1, 3, 7, 14];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("leitner box out of range: {0} (expected 1..=5)")]
    BoxOutOfRange(i64),
}

/// A box number that is guaranteed to lie in `1..=5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct LeitnerBox(u8);

impl LeitnerBox {
    pub const COUNT: usize = 5;
    pub const FIRST: LeitnerBox = LeitnerBox(1);
    pub const LAST: LeitnerBox = LeitnerBox(Self::COUNT as u8);

    pub fn new(value: i64) -> Result<Self, SchedulerError> {
        if (1..=Self::COUNT as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SchedulerError::BoxOutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// One box up, capped at the top box.
    pub fn promoted(self) -> Self {
        Self((self.0 + 1).min(Self::LAST.0))
    }

    /// One box down, floored at the first box.
    pub fn demoted(self) -> Self {
        Self((self.0 - 1).max(Self::FIRST.0))
    }

    pub fn interval_days(self) -> u32 {
        BOX_INTERVAL_DAYS[usize::from(self.0 - 1)]
    }

    pub fn all() -> impl Iterator<Item = LeitnerBox> {
        (Self::FIRST.0..=Self::LAST.0).map(LeitnerBox)
    }
}

impl Default for LeitnerBox {
    fn default() -> Self {
        Self::FIRST
    }
}

impl TryFrom<i64> for LeitnerBox {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LeitnerBox> for i64 {
    fn from(b: LeitnerBox) -> Self {
        i64::from(b.0)
    }
}

impl fmt::Display for LeitnerBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
