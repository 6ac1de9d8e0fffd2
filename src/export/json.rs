//! JSON import/export module for flashcard decks.
//! Provides functionality to save and load Deck structures to/from JSON files.
//! Only card contents travel; scheduling state stays in the database.

use crate::models::Deck;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("file error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid deck JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Exports a deck to a JSON file at the specified path.
pub fn export_json_to_path(deck: &Deck, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let json_string = serde_json::to_string_pretty(deck)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(json_string.as_bytes())?;
    log::info!("Deck '{}' exported to '{}'", deck.name, path.as_ref().display());
    Ok(())
}

/// Imports a deck from a JSON file.
/// Returns an error if the file doesn't exist or contains invalid JSON.
pub fn import_json(path: impl AsRef<Path>) -> Result<Deck, ExportError> {
    let mut file = File::open(path.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let deck: Deck = serde_json::from_str(&contents)?;

    log::info!("Deck '{}' imported from '{}'", deck.name, path.as_ref().display());
    Ok(deck)
}
