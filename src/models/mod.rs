pub mod deck;
pub mod flashcard;
pub mod leitner;
pub mod leitner_box;
pub mod review_session;

pub use deck::Deck;
pub use flashcard::{CardContent, Flashcard};
pub use leitner::{DemotionPolicy, LeitnerScheduler, Outcome, Schedule};
pub use leitner_box::{BOX_INTERVAL_DAYS, LeitnerBox, SchedulerError};
pub use review_session::{
    OutcomeReport, PendingUpdate, ReviewScope, ReviewSession, SessionError, SessionOptions,
    SessionState, sync_pending,
};
