//! Main application UI and state management.
//! Handles deck management and review sessions; all scheduling goes through
//! `ReviewSession`, the UI only reports outcomes.

use eframe::egui;
use leitner_cards::clock::{Clock, SystemClock};
use leitner_cards::config::{CalendarMode, Config};
use leitner_cards::database::{FlashcardStore, SqliteStore};
use leitner_cards::export::json::{export_json_to_path, import_json};
use leitner_cards::models::{
    CardContent, Flashcard, LeitnerScheduler, Outcome, OutcomeReport, PendingUpdate, ReviewScope,
    ReviewSession, sync_pending,
};
use std::sync::Arc;

/// Application screen states
#[derive(Default)]
enum AppScreen {
    #[default]
    Main,
    Review,
}

/// Main application state
pub struct FlashcardsApp {
    config: Config,
    store: Arc<SqliteStore>,
    clock: Arc<dyn Clock>,
    scheduler: LeitnerScheduler,

    show_confirmation_dialog: bool,
    allowed_to_close: bool,

    decks: Vec<String>,
    due_counts: Vec<usize>,
    selected_deck_index: Option<usize>,
    deck_cards: Vec<Flashcard>,
    current_term: String,
    current_definition: String,
    new_deck_name: String,

    current_screen: AppScreen,
    review: Option<ReviewSession<SqliteStore>>,
    // Answers from closed sessions that the store has not accepted yet
    unsynced: Vec<PendingUpdate>,
    show_definition: bool,
    sync_message: Option<String>,

    show_export_dialog: bool,
    show_import_result_dialog: bool,
    import_result_message: String,
}

impl eframe::App for FlashcardsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        match self.current_screen {
            AppScreen::Main => self.render_main_screen(ctx),
            AppScreen::Review => self.render_review_screen(ctx),
        }

        // Handle window close requests with confirmation dialog
        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.show_confirmation_dialog = true;
        }

        if self.show_confirmation_dialog {
            egui::Window::new("Do you want to quit?")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    if self.has_unsynced() {
                        ui.label("Some answers have not been saved yet.");
                    }
                    ui.horizontal(|ui| {
                        if ui.button("No").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = false;
                        }

                        if ui.button("Yes").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = true;
                            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
        }

        if self.show_export_dialog {
            let mut export_deck_index: Option<usize> = None;
            let mut should_cancel = false;

            egui::Window::new("Export Deck")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Select a deck to export:");
                    ui.separator();

                    for (i, deck) in self.decks.iter().enumerate() {
                        if ui.button(deck.as_str()).clicked() {
                            export_deck_index = Some(i);
                        }
                    }

                    ui.separator();

                    if ui.button("Cancel").clicked() {
                        should_cancel = true;
                    }
                });

            if let Some(i) = export_deck_index {
                self.handle_export(i);
            }
            if should_cancel {
                self.show_export_dialog = false;
            }
        }

        if self.show_import_result_dialog {
            egui::Window::new("Import/Export Result")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&self.import_result_message);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.show_import_result_dialog = false;
                    }
                });
        }
    }
}

impl FlashcardsApp {
    pub fn new(config: Config, store: SqliteStore) -> Self {
        let store = Arc::new(store);
        let clock: Arc<dyn Clock> = match config.calendar.mode {
            CalendarMode::Simulated => store.clone() as Arc<dyn Clock>,
            CalendarMode::System => Arc::new(SystemClock),
        };
        let scheduler = LeitnerScheduler::new(config.scheduler.demotion);

        let mut app = Self {
            config,
            store,
            clock,
            scheduler,
            show_confirmation_dialog: false,
            allowed_to_close: false,
            decks: Vec::new(),
            due_counts: Vec::new(),
            selected_deck_index: None,
            deck_cards: Vec::new(),
            current_term: String::new(),
            current_definition: String::new(),
            new_deck_name: String::new(),
            current_screen: AppScreen::Main,
            review: None,
            unsynced: Vec::new(),
            show_definition: false,
            sync_message: None,
            show_export_dialog: false,
            show_import_result_dialog: false,
            import_result_message: String::new(),
        };
        app.reload_decks();
        if !app.decks.is_empty() {
            app.select_deck(0);
        }
        app
    }

    fn owner(&self) -> &str {
        &self.config.owner
    }

    fn has_unsynced(&self) -> bool {
        !self.unsynced.is_empty() || self.review.as_ref().is_some_and(|r| r.has_unsynced())
    }

    fn reload_decks(&mut self) {
        match self.store.get_all_decks(&self.config.owner) {
            Ok(decks) => self.decks = decks,
            Err(e) => log::error!("Failed to load decks: {e}"),
        }
        self.refresh_due_counts();
    }

    /// Recounts due cards per deck for the deck list.
    fn refresh_due_counts(&mut self) {
        let today = self.clock.today();
        self.due_counts = self
            .decks
            .iter()
            .map(|deck| {
                self.store
                    .due_count(&self.config.owner, deck, today)
                    .unwrap_or_else(|e| {
                        log::error!("Failed to count due cards of '{deck}': {e}");
                        0
                    })
            })
            .collect();
    }

    fn select_deck(&mut self, index: usize) {
        self.selected_deck_index = Some(index);
        self.reload_deck_cards();
    }

    fn selected_deck(&self) -> Option<&str> {
        self.selected_deck_index
            .and_then(|i| self.decks.get(i))
            .map(String::as_str)
    }

    fn reload_deck_cards(&mut self) {
        let Some(deck) = self.selected_deck().map(str::to_string) else {
            self.deck_cards.clear();
            return;
        };
        match self.store.get_flashcards(self.owner(), Some(&deck)) {
            Ok(cards) => self.deck_cards = cards,
            Err(e) => log::error!("Failed to load cards of '{deck}': {e}"),
        }
    }

    /// Renders the main screen with deck management interface
    fn render_main_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let today = self.clock.today();
            ui.horizontal(|ui| {
                ui.label(today.format("%Y-%m-%d").to_string());

                if self.config.calendar.mode == CalendarMode::Simulated
                    && ui.button("Next Day").clicked()
                {
                    if let Err(e) = self.store.advance_day() {
                        log::error!("Failed to advance calendar: {e}");
                    }
                    self.refresh_due_counts();
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Export Deck").clicked() {
                    self.show_export_dialog = true;
                }
                if ui.button("Import Deck").clicked() {
                    self.handle_import();
                }
            });

            ui.separator();

            ui.heading("Create New Deck");
            ui.horizontal(|ui| {
                ui.label("Deck name:");
                ui.text_edit_singleline(&mut self.new_deck_name);
                if ui.button("Create Deck").clicked() && !self.new_deck_name.is_empty() {
                    match self.store.new_deck(&self.config.owner, &self.new_deck_name) {
                        Ok(()) => {
                            self.new_deck_name.clear();
                            self.reload_decks();
                        }
                        Err(e) => {
                            log::error!("Failed to create deck '{}': {e}", self.new_deck_name)
                        }
                    }
                }
            });

            ui.separator();

            ui.heading(format!("Decks ({})", self.decks.len()));

            // We store actions to execute after UI rendering to avoid borrowing conflicts
            let mut action_select: Option<usize> = None;
            let mut action_review: Option<usize> = None;

            egui::ScrollArea::vertical()
                .id_salt("decks_list")
                .max_height(150.0)
                .show(ui, |ui| {
                    for (i, deck) in self.decks.iter().enumerate() {
                        let is_selected = self.selected_deck_index == Some(i);
                        let due = self.due_counts.get(i).copied().unwrap_or_default();
                        let label = format!("{}. {} ({} due)", i + 1, deck, due);

                        ui.horizontal(|ui| {
                            if ui.selectable_label(is_selected, label).clicked() {
                                action_select = Some(i);
                            }

                            if ui.add_enabled(due > 0, egui::Button::new("Review")).clicked() {
                                action_review = Some(i);
                            }
                        });
                    }
                });

            if let Some(i) = action_select {
                self.select_deck(i);
            }
            if let Some(i) = action_review {
                self.start_review(i);
            }

            ui.separator();

            let Some(deck_name) = self.selected_deck().map(str::to_string) else {
                ui.label("Select a deck to add flashcards");
                return;
            };

            ui.heading(format!("Selected Deck: {deck_name}"));

            ui.horizontal(|ui| {
                ui.label("Term:");
                ui.text_edit_singleline(&mut self.current_term);
            });
            ui.horizontal(|ui| {
                ui.label("Definition:");
                ui.text_edit_singleline(&mut self.current_definition);
            });
            if ui.button("Add Flashcard").clicked()
                && !self.current_term.is_empty()
                && !self.current_definition.is_empty()
            {
                let content = CardContent {
                    term: std::mem::take(&mut self.current_term),
                    definition: std::mem::take(&mut self.current_definition),
                };
                if let Err(e) = self
                    .store
                    .add_flashcard(&self.config.owner, &deck_name, &content, today)
                {
                    log::error!("Failed to add flashcard '{}': {e}", content.term);
                }
                self.reload_deck_cards();
                self.refresh_due_counts();
            }

            ui.separator();

            ui.heading(format!("Flashcards ({})", self.deck_cards.len()));

            let mut action_delete: Option<i64> = None;
            egui::ScrollArea::vertical()
                .id_salt("flashcards_list")
                .max_height(200.0)
                .show(ui, |ui| {
                    for (i, card) in self.deck_cards.iter().enumerate() {
                        ui.group(|ui| {
                            ui.horizontal(|ui| {
                                ui.label(format!("{}. {}", i + 1, card.content.term));
                                if ui.small_button("Delete").clicked() {
                                    action_delete = Some(card.id);
                                }
                            });
                            ui.label(format!("   Definition: {}", card.content.definition));
                            ui.label(format!(
                                "   Box {} · next review {}",
                                card.leitner_box, card.next_review_date
                            ));
                        });
                    }
                });

            if let Some(id) = action_delete {
                if let Err(e) = self.store.delete_flashcard(id) {
                    log::error!("Failed to delete flashcard {id}: {e}");
                }
                self.reload_deck_cards();
                self.refresh_due_counts();
            }
        });
    }

    /// Renders the review screen; gestures and layout only, outcomes go to the session
    fn render_review_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let mut action_toggle_def = false;
            let mut action_outcome: Option<Outcome> = None;
            let mut action_skip = false;
            let mut action_retry_sync = false;
            let mut action_restart = false;
            let mut action_back = false;

            let Some(session) = &self.review else {
                self.current_screen = AppScreen::Main;
                return;
            };

            let deck = session
                .scope()
                .and_then(|s| s.deck.clone())
                .unwrap_or_default();
            ui.heading(format!("Reviewing: {deck}"));
            ui.label(format!(
                "Progress: {} reviewed, {} remaining",
                session.reviewed_count(),
                session.remaining_count()
            ));

            if session.has_unsynced() {
                ui.horizontal(|ui| {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        format!("{} answers not saved yet", session.pending().len()),
                    );
                    if ui.small_button("Retry").clicked() {
                        action_retry_sync = true;
                    }
                });
            }
            if let Some(message) = &self.sync_message {
                ui.label(message);
            }

            ui.add_space(20.0);

            match session.current() {
                None => {
                    ui.heading("All done!");
                    ui.label("No more cards are due in this session.");
                    ui.add_space(20.0);
                    if ui.button("Start New Session").clicked() {
                        action_restart = true;
                    }
                }
                Some(card) => {
                    ui.group(|ui| {
                        ui.set_min_height(200.0);
                        ui.vertical_centered(|ui| {
                            ui.add_space(20.0);
                            ui.label(format!("Box {}", card.leitner_box));
                            ui.heading("Term:");
                            ui.label(&card.content.term);

                            ui.add_space(20.0);

                            if self.show_definition {
                                ui.heading("Definition:");
                                ui.label(&card.content.definition);
                            } else {
                                ui.label("(Click 'Show Definition' to reveal)");
                            }

                            ui.add_space(20.0);
                        });
                    });

                    ui.add_space(20.0);

                    if !self.show_definition {
                        ui.horizontal(|ui| {
                            if ui.button("Show Definition").clicked() {
                                action_toggle_def = true;
                            }
                            if ui.button("Skip").clicked() {
                                action_skip = true;
                            }
                        });
                    } else {
                        ui.label("Did you remember it?");
                        ui.horizontal(|ui| {
                            if ui.button("Forgotten").clicked() {
                                action_outcome = Some(Outcome::Forgotten);
                            }
                            if ui.button("Remembered").clicked() {
                                action_outcome = Some(Outcome::Remembered);
                            }
                        });
                    }
                }
            }

            ui.add_space(20.0);

            if ui.button("Back to Main Screen").clicked() {
                action_back = true;
            }

            // Execute deferred actions
            if action_toggle_def {
                self.show_definition = true;
            }
            if let Some(outcome) = action_outcome {
                self.report_outcome(outcome);
            }
            if action_skip {
                if let Some(Err(e)) = self.review.as_mut().map(|s| s.skip()) {
                    log::warn!("Skip ignored: {e}");
                }
                self.show_definition = false;
            }
            if action_retry_sync {
                if let Some(session) = self.review.as_mut() {
                    let left = session.retry_pending();
                    self.sync_message =
                        (left > 0).then(|| format!("{left} answers still not saved"));
                }
            }
            if action_restart {
                self.restart_review();
            }
            if action_back {
                self.leave_review();
            }
        });
    }

    fn report_outcome(&mut self, outcome: Outcome) {
        let Some(session) = self.review.as_mut() else {
            return;
        };
        match session.report_outcome(outcome) {
            Ok(OutcomeReport::Unsynced { error, .. }) => {
                self.sync_message = Some(format!("Last answer not saved: {error}"));
            }
            Ok(_) => self.sync_message = None,
            Err(e) => log::warn!("Outcome ignored: {e}"),
        }
        self.show_definition = false;
        self.refresh_due_counts();
    }

    /// Closes the review screen. Answers that still cannot be written stay
    /// with the app and are handed to the next session.
    fn leave_review(&mut self) {
        if let Some(mut session) = self.review.take() {
            session.retry_pending();
            self.unsynced.extend(session.take_pending());
        }
        if !self.unsynced.is_empty() {
            log::warn!("{} answers kept for a later sync", self.unsynced.len());
        }
        self.current_screen = AppScreen::Main;
        self.sync_message = None;
        self.reload_deck_cards();
        self.refresh_due_counts();
    }

    /// Starts a review session with the cards of a deck that are due today
    fn start_review(&mut self, deck_index: usize) {
        let Some(deck) = self.decks.get(deck_index).cloned() else {
            return;
        };
        let options = self.config.session.options();
        // Written before the due-set is read so that it reflects them
        let unsynced = std::mem::take(&mut self.unsynced);
        self.unsynced = sync_pending(&*self.store, unsynced, options.persist_attempts);

        let scope = ReviewScope {
            owner: self.config.owner.clone(),
            deck: Some(deck.clone()),
        };
        match ReviewSession::start(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.scheduler,
            scope,
            options,
        ) {
            Ok(mut session) => {
                session.adopt_pending(std::mem::take(&mut self.unsynced));
                self.sync_message = session
                    .has_unsynced()
                    .then(|| format!("{} earlier answers not saved yet", session.pending().len()));
                self.review = Some(session);
                self.show_definition = false;
                self.current_screen = AppScreen::Review;
            }
            Err(e) => log::error!("Failed to start review of '{deck}': {e}"),
        }
    }

    fn restart_review(&mut self) {
        let Some(session) = self.review.as_mut() else {
            return;
        };
        let left = session.retry_pending();
        match session.restart() {
            Ok(fresh) => {
                self.review = Some(fresh);
                self.show_definition = false;
                self.sync_message =
                    (left > 0).then(|| format!("{left} answers still not saved"));
            }
            Err(e) => log::error!("Failed to restart review: {e}"),
        }
        self.refresh_due_counts();
    }

    /// Handles deck export to JSON file
    fn handle_export(&mut self, deck_index: usize) {
        if let Some(deck_name) = self.decks.get(deck_index).cloned() {
            if let Some(path) = rfd::FileDialog::new()
                .set_file_name(format!("{deck_name}.json"))
                .add_filter("JSON files", &["json"])
                .save_file()
            {
                let result = self
                    .store
                    .load_deck(&self.config.owner, &deck_name)
                    .map_err(|e| e.to_string())
                    .and_then(|deck| {
                        export_json_to_path(&deck, &path).map_err(|e| e.to_string())
                    });
                self.import_result_message = match result {
                    Ok(()) => format!("Deck '{deck_name}' exported successfully!"),
                    Err(e) => format!("Export failed: {e}"),
                };
                self.show_import_result_dialog = true;
            }
        }
        self.show_export_dialog = false;
    }

    /// Handles deck import from JSON file
    fn handle_import(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON files", &["json"])
            .pick_file()
        else {
            return;
        };

        self.import_result_message = match import_json(&path) {
            Ok(deck) if self.decks.contains(&deck.name) => format!(
                "Deck '{}' already exists! Please rename it in the JSON file.",
                deck.name
            ),
            Ok(deck) => match self
                .store
                .import_deck(&self.config.owner, &deck, self.clock.today())
            {
                Ok(count) => {
                    self.reload_decks();
                    format!("Deck '{}' imported successfully with {count} cards!", deck.name)
                }
                Err(e) => format!("Failed to import deck '{}': {e}", deck.name),
            },
            Err(e) => format!(
                "Import failed: {e}\n\nPlease check if the file has correct structure:\n{{\n  \"name\": \"Deck Name\",\n  \"flashcards\": [...]\n}}"
            ),
        };
        self.show_import_result_dialog = true;
    }
}
