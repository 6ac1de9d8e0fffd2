mod app;
use leitner_cards::*;

use app::FlashcardsApp;
use config::{CalendarMode, DEFAULT_CONFIG_FILE};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::load(Path::new(DEFAULT_CONFIG_FILE))?;
    let system_today = SystemClock.today();
    let store = SqliteStore::open(&config.database.path, system_today)?;

    if store.get_all_decks(&config.owner)?.is_empty() {
        let today = match config.calendar.mode {
            CalendarMode::Simulated => store.today(),
            CalendarMode::System => system_today,
        };
        let sample = Deck {
            name: "Polish Vocabulary".to_string(),
            flashcards: [("cześć", "hello"), ("dziękuję", "thank you"), ("proszę", "please")]
                .into_iter()
                .map(|(term, definition)| CardContent {
                    term: term.to_string(),
                    definition: definition.to_string(),
                })
                .collect(),
        };
        store.import_deck(&config.owner, &sample, today)?;
        log::info!("Sample data created");
    }

    let decks = store.get_all_decks(&config.owner)?;
    log::info!("Loaded {} decks for {}", decks.len(), config.owner);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([500.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Flashcards App",
        options,
        Box::new(|_cc| Ok(Box::new(FlashcardsApp::new(config, store)))),
    )?;
    Ok(())
}
