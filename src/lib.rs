pub mod clock;
pub mod config;
pub mod database;
pub mod export;
pub mod models;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use database::{FlashcardStore, MemoryStore, SqliteStore, StoreError};
pub use models::{
    CardContent, Deck, Flashcard, LeitnerBox, LeitnerScheduler, Outcome, ReviewSession,
};
