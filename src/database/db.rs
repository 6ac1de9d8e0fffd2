//! Database operations for flashcard application
//!
//! Handles SQLite database initialization, CRUD operations for decks and flashcards,
//! Leitner scheduling fields and the simulated study calendar.

use super::{FlashcardStore, StoreError};
use crate::clock::Clock;
use crate::models::{CardContent, Deck, Flashcard, LeitnerBox};
use chrono::{Days, Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";

const CARD_COLUMNS: &str =
    "id, owner, deck_name, term, definition, leitner_box, next_review_date";

/// Creates the required tables if they are missing
///
/// Stores the calendar date `today` as the simulated current date unless one is
/// already recorded.
pub fn init_database(conn: &Connection, today: NaiveDate) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS decks (
            owner TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (owner, name)
        )",
        (),
    )?;

    // Scheduling fields are NOT NULL: defaults are applied by the insert, never on read
    conn.execute(
        "CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            deck_name TEXT NOT NULL,
            term TEXT NOT NULL,
            definition TEXT NOT NULL,
            leitner_box INTEGER NOT NULL,
            next_review_date TEXT NOT NULL,
            FOREIGN KEY (owner, deck_name) REFERENCES decks(owner, name) ON DELETE CASCADE,
            UNIQUE(owner, deck_name, term)
        )",
        (),
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![format_date(today)],
    )?;

    Ok(())
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Retrieves current simulated date from database
pub fn get_current_date(conn: &Connection) -> Result<NaiveDate, StoreError> {
    let value: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .map_err(|e| StoreError::Calendar(format!("'{value}': {e}")))
}

/// Advances the simulated date by one day
pub fn advance_day(conn: &Connection) -> Result<NaiveDate, StoreError> {
    let current = get_current_date(conn)?;
    let next_day = current.checked_add_days(Days::new(1)).unwrap_or(current);

    conn.execute(
        "UPDATE app_state SET value = ?1 WHERE key = 'current_date'",
        params![format_date(next_day)],
    )?;

    log::info!("Calendar advanced to {next_day}");
    Ok(next_day)
}

/// Creates a new deck for `owner`
pub fn new_deck(owner: &str, name: &str, conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO decks (owner, name) VALUES (?1, ?2)",
        params![owner, name],
    )?;
    log::info!("Deck '{name}' created for {owner}");
    Ok(())
}

/// Adds a flashcard to a deck in the first box, due `today`
///
/// Returns the flashcard ID. If the deck already holds the same term the
/// existing card is kept untouched and its ID returned.
pub fn add_flashcard(
    owner: &str,
    deck_name: &str,
    content: &CardContent,
    today: NaiveDate,
    conn: &Connection,
) -> rusqlite::Result<i64> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO flashcards (owner, deck_name, term, definition, leitner_box, next_review_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            owner,
            deck_name,
            content.term,
            content.definition,
            i64::from(LeitnerBox::FIRST),
            format_date(today)
        ],
    )?;

    let flashcard_id: i64 = conn.query_row(
        "SELECT id FROM flashcards WHERE owner = ?1 AND deck_name = ?2 AND term = ?3",
        params![owner, deck_name, content.term],
        |row| row.get(0),
    )?;

    if inserted == 0 {
        log::debug!("Flashcard '{}' already in deck '{deck_name}'", content.term);
    }
    Ok(flashcard_id)
}

/// Removes a flashcard; returns whether a card was deleted
pub fn delete_flashcard(id: i64, conn: &Connection) -> rusqlite::Result<bool> {
    let deleted = conn.execute("DELETE FROM flashcards WHERE id = ?1", params![id])?;
    if deleted > 0 {
        log::info!("Flashcard {id} deleted");
    }
    Ok(deleted > 0)
}

/// Column values exactly as stored, before the scheduling invariants are checked
struct StoredCard {
    id: i64,
    owner: String,
    deck_name: String,
    term: String,
    definition: String,
    leitner_box: i64,
    next_review_date: String,
}

impl StoredCard {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            deck_name: row.get(2)?,
            term: row.get(3)?,
            definition: row.get(4)?,
            leitner_box: row.get(5)?,
            next_review_date: row.get(6)?,
        })
    }
}

impl TryFrom<StoredCard> for Flashcard {
    type Error = StoreError;

    fn try_from(stored: StoredCard) -> Result<Self, Self::Error> {
        let leitner_box = LeitnerBox::new(stored.leitner_box).map_err(|e| StoreError::Corrupt {
            id: stored.id,
            reason: e.to_string(),
        })?;
        let next_review_date = NaiveDate::parse_from_str(&stored.next_review_date, DATE_FORMAT)
            .map_err(|e| StoreError::Corrupt {
                id: stored.id,
                reason: format!("next_review_date '{}': {e}", stored.next_review_date),
            })?;

        Ok(Flashcard {
            id: stored.id,
            owner: stored.owner,
            deck_name: stored.deck_name,
            content: CardContent {
                term: stored.term,
                definition: stored.definition,
            },
            leitner_box,
            next_review_date,
        })
    }
}

/// Retrieves all flashcards of `owner`, optionally only one deck, ordered by ID
pub fn get_flashcards(
    owner: &str,
    deck_name: Option<&str>,
    conn: &Connection,
) -> Result<Vec<Flashcard>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CARD_COLUMNS} FROM flashcards
         WHERE owner = ?1 AND (?2 IS NULL OR deck_name = ?2)
         ORDER BY id ASC"
    ))?;

    let stored = stmt
        .query_map(params![owner, deck_name], StoredCard::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    stored.into_iter().map(Flashcard::try_from).collect()
}

pub fn get_flashcard(id: i64, conn: &Connection) -> Result<Option<Flashcard>, StoreError> {
    let stored = conn
        .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM flashcards WHERE id = ?1"),
            params![id],
            StoredCard::from_row,
        )
        .optional()?;

    stored.map(Flashcard::try_from).transpose()
}

/// Writes the outcome of a review back to a flashcard
pub fn update_schedule(
    id: i64,
    leitner_box: LeitnerBox,
    next_review_date: NaiveDate,
    conn: &Connection,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE flashcards SET leitner_box = ?1, next_review_date = ?2 WHERE id = ?3",
        params![i64::from(leitner_box), format_date(next_review_date), id],
    )?;

    if updated == 0 {
        return Err(StoreError::NotFound(id));
    }
    log::debug!("Flashcard {id} scheduled: box {leitner_box}, next review {next_review_date}");
    Ok(())
}

/// Number of cards in a deck that are due on `today`
pub fn due_count(
    owner: &str,
    deck_name: &str,
    today: NaiveDate,
    conn: &Connection,
) -> rusqlite::Result<usize> {
    // ISO dates compare correctly as text
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM flashcards
         WHERE owner = ?1 AND deck_name = ?2 AND next_review_date <= ?3",
        params![owner, deck_name, format_date(today)],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or_default())
}

/// Retrieves all deck names of `owner`
pub fn get_all_decks(owner: &str, conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM decks WHERE owner = ?1 ORDER BY name")?;
    let decks = stmt
        .query_map(params![owner], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(decks)
}

/// Loads a deck's card contents, dropping scheduling state, for export
pub fn load_deck(owner: &str, deck_name: &str, conn: &Connection) -> Result<Deck, StoreError> {
    let flashcards = get_flashcards(owner, Some(deck_name), conn)?
        .into_iter()
        .map(|card| card.content)
        .collect();

    Ok(Deck {
        name: deck_name.to_string(),
        flashcards,
    })
}

/// SQLite-backed [`FlashcardStore`] that also keeps the simulated calendar.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, today: NaiveDate) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        log::info!("Opened flashcard database at {}", path.as_ref().display());
        Self::from_connection(conn, today)
    }

    pub fn open_in_memory(today: NaiveDate) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, today)
    }

    fn from_connection(conn: Connection, today: NaiveDate) -> Result<Self, StoreError> {
        init_database(&conn, today)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn new_deck(&self, owner: &str, name: &str) -> Result<(), StoreError> {
        Ok(new_deck(owner, name, &*self.lock()?)?)
    }

    pub fn get_all_decks(&self, owner: &str) -> Result<Vec<String>, StoreError> {
        Ok(get_all_decks(owner, &*self.lock()?)?)
    }

    pub fn add_flashcard(
        &self,
        owner: &str,
        deck_name: &str,
        content: &CardContent,
        today: NaiveDate,
    ) -> Result<i64, StoreError> {
        Ok(add_flashcard(owner, deck_name, content, today, &*self.lock()?)?)
    }

    pub fn delete_flashcard(&self, id: i64) -> Result<bool, StoreError> {
        Ok(delete_flashcard(id, &*self.lock()?)?)
    }

    pub fn due_count(
        &self,
        owner: &str,
        deck_name: &str,
        today: NaiveDate,
    ) -> Result<usize, StoreError> {
        Ok(due_count(owner, deck_name, today, &*self.lock()?)?)
    }

    pub fn load_deck(&self, owner: &str, deck_name: &str) -> Result<Deck, StoreError> {
        load_deck(owner, deck_name, &*self.lock()?)
    }

    /// Creates `deck` for `owner` and adds every card of it as a new card.
    ///
    /// Returns the number of cards stored; repeated terms count once.
    pub fn import_deck(
        &self,
        owner: &str,
        deck: &Deck,
        today: NaiveDate,
    ) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        new_deck(owner, &deck.name, &tx)?;
        for content in &deck.flashcards {
            add_flashcard(owner, &deck.name, content, today, &tx)?;
        }
        // The deck is new, so every row in it came from this import
        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM flashcards WHERE owner = ?1 AND deck_name = ?2",
            params![owner, deck.name],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(usize::try_from(stored).unwrap_or_default())
    }

    pub fn current_date(&self) -> Result<NaiveDate, StoreError> {
        get_current_date(&*self.lock()?)
    }

    pub fn advance_day(&self) -> Result<NaiveDate, StoreError> {
        advance_day(&*self.lock()?)
    }
}

impl FlashcardStore for SqliteStore {
    fn get_flashcards(
        &self,
        owner: &str,
        deck: Option<&str>,
    ) -> Result<Vec<Flashcard>, StoreError> {
        get_flashcards(owner, deck, &*self.lock()?)
    }

    fn get_flashcard(&self, id: i64) -> Result<Option<Flashcard>, StoreError> {
        get_flashcard(id, &*self.lock()?)
    }

    fn update_schedule(
        &self,
        id: i64,
        leitner_box: LeitnerBox,
        next_review_date: NaiveDate,
    ) -> Result<(), StoreError> {
        update_schedule(id, leitner_box, next_review_date, &*self.lock()?)
    }
}

/// The simulated calendar; falls back to the local date if it cannot be read.
impl Clock for SqliteStore {
    fn today(&self) -> NaiveDate {
        self.current_date().unwrap_or_else(|e| {
            log::warn!("Cannot read simulated date, using local date: {e}");
            Local::now().date_naive()
        })
    }
}
