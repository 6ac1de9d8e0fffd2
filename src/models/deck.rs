//! Deck is a named set of card contents, the unit of import and export
use super::CardContent;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    pub flashcards: Vec<CardContent>,
}

impl Default for Deck {
    fn default() -> Self {
        Self {
            name: "My Deck".to_string(),
            flashcards: Vec::new(),
        }
    }
}
