//! Terminal front-end
//!
//! `App` is plain state driven by key presses and controller notifications;
//! `run` wires it to the terminal and the controllers.

mod composer;
mod markdown;
mod ui;

pub use composer::{Composer, ComposerOutcome};

use crate::render::{project_conversation, ConversationListItem, ConversationView};
use crate::runtime::{Backend, ConversationController, UiEvent};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::Backend as TerminalBackend;
use ratatui::Terminal;
use std::io;
use tokio::sync::{broadcast, mpsc};

const SCROLL_STEP: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Composer,
}

/// What the run loop must do after a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Open(String),
    NewConversation,
    Refresh,
    Submit {
        conversation_id: Option<String>,
        text: String,
    },
}

pub struct App {
    pub items: Vec<ConversationListItem>,
    /// Highlighted sidebar entry
    pub cursor: usize,
    pub view: Option<ConversationView>,
    pub composer: Composer,
    pub focus: Focus,
    /// Rows scrolled up from the bottom of the transcript; 0 follows new content
    pub scroll_back: u16,
    pub status: Option<String>,
    quit: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            view: None,
            composer: Composer::new(),
            focus: Focus::Composer,
            scroll_back: 0,
            status: None,
            quit: false,
        }
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    #[must_use]
    pub fn current_id(&self) -> Option<&str> {
        self.view.as_ref().map(|v| v.id.as_str())
    }

    /// The displayed conversation is deliberating
    #[must_use]
    pub fn busy(&self) -> bool {
        self.view.as_ref().is_some_and(|v| v.in_flight)
    }

    /// Install a fresh projection of the workspace
    pub fn apply_snapshot(
        &mut self,
        items: Vec<ConversationListItem>,
        view: Option<ConversationView>,
    ) {
        let switched = view.as_ref().map(|v| &v.id) != self.view.as_ref().map(|v| &v.id);
        if switched {
            self.scroll_back = 0;
            if let Some(pos) = items.iter().position(|i| i.is_current) {
                self.cursor = pos;
            }
        }
        self.cursor = self.cursor.min(items.len().saturating_sub(1));
        self.items = items;
        self.view = view;
    }

    /// React to a controller notification. Returns whether a new snapshot is needed.
    pub fn on_event(&mut self, event: &UiEvent) -> bool {
        match event {
            UiEvent::ListChanged | UiEvent::CouncilDone { .. } => true,
            UiEvent::ConversationUpdated {
                conversation_id,
                follow,
            } => {
                if *follow && self.current_id() == Some(conversation_id.as_str()) {
                    self.scroll_back = 0;
                }
                true
            }
            UiEvent::StageFailed {
                conversation_id,
                stage,
                message,
            } => {
                if self.current_id() == Some(conversation_id.as_str()) {
                    self.status = Some(format!("Stage {} failed: {message}", stage.number()));
                }
                true
            }
            UiEvent::Diagnostic { message } => {
                self.status = Some(message.clone());
                false
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return Action::Quit;
        }

        match key.code {
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Sidebar => Focus::Composer,
                    Focus::Composer => Focus::Sidebar,
                };
                return Action::None;
            }
            KeyCode::PageUp => {
                self.scroll_back = self.scroll_back.saturating_add(SCROLL_STEP);
                return Action::None;
            }
            KeyCode::PageDown => {
                self.scroll_back = self.scroll_back.saturating_sub(SCROLL_STEP);
                return Action::None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => self.handle_sidebar_key(key),
            Focus::Composer => self.handle_composer_key(key),
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') => {
                self.quit = true;
                Action::Quit
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                }
                Action::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                Action::None
            }
            KeyCode::Enter => match self.items.get(self.cursor) {
                Some(item) => {
                    self.focus = Focus::Composer;
                    self.status = None;
                    Action::Open(item.id.clone())
                }
                None => Action::None,
            },
            KeyCode::Char('n') => {
                self.focus = Focus::Composer;
                Action::NewConversation
            }
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('i') => {
                self.focus = Focus::Composer;
                Action::None
            }
            _ => Action::None,
        }
    }

    fn handle_composer_key(&mut self, key: KeyEvent) -> Action {
        if key.code == KeyCode::Esc {
            self.focus = Focus::Sidebar;
            return Action::None;
        }
        match self.composer.handle_key(key, self.busy()) {
            ComposerOutcome::Submit(text) => {
                self.status = None;
                Action::Submit {
                    conversation_id: self.current_id().map(String::from),
                    text,
                }
            }
            ComposerOutcome::Changed | ComposerOutcome::Ignored => Action::None,
        }
    }
}

async fn sync<B: Backend + 'static>(app: &mut App, controller: &ConversationController<B>) {
    let items = controller.list().list().await;
    let view = {
        let ws = controller.list().workspace().read().await;
        ws.current().map(project_conversation)
    };
    app.apply_snapshot(items, view);
}

async fn perform<B: Backend + 'static>(
    app: &mut App,
    controller: &ConversationController<B>,
    action: Action,
) {
    let result = match action {
        Action::None | Action::Quit => return,
        Action::Open(id) => controller.list().open(&id).await,
        Action::NewConversation => controller.list().create_new().await.map(|_| ()),
        Action::Refresh => controller.list().refresh().await,
        Action::Submit {
            conversation_id,
            text,
        } => controller
            .submit(conversation_id.as_deref(), &text)
            .await
            .map(|_| ()),
    };

    if let Err(e) = result {
        if e.is_input_rejection() {
            tracing::debug!(error = %e, "Submission absorbed");
        } else {
            app.status = Some(e.to_string());
        }
    }
    sync(app, controller).await;
}

/// Read terminal events on a dedicated thread; crossterm's reader blocks
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Terminal input failed");
                break;
            }
        }
    });
    rx
}

/// Drive the interface until the user quits
///
/// # Errors
///
/// Terminal I/O failures while drawing.
pub async fn run<T, B>(
    terminal: &mut Terminal<T>,
    controller: &ConversationController<B>,
) -> io::Result<()>
where
    T: TerminalBackend,
    B: Backend + 'static,
{
    let mut app = App::new();
    let mut ui_events = controller.subscribe();
    let mut input = spawn_input_reader();
    sync(&mut app, controller).await;

    loop {
        terminal.draw(|f| ui::render(f, &app))?;

        tokio::select! {
            Some(event) = input.recv() => match event {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    let action = app.handle_key(key);
                    perform(&mut app, controller, action).await;
                }
                _ => {}
            },
            received = ui_events.recv() => match received {
                Ok(event) => {
                    if app.on_event(&event) {
                        sync(&mut app, controller).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "UI events lagged, resyncing");
                    sync(&mut app, controller).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            else => break,
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::Stage;

    fn item(id: &str, current: bool) -> ConversationListItem {
        ConversationListItem {
            id: id.to_string(),
            title: "New Conversation".to_string(),
            message_count: 0,
            is_current: current,
            unseen_activity: false,
            in_flight: false,
        }
    }

    fn view(id: &str, in_flight: bool) -> ConversationView {
        ConversationView {
            id: id.to_string(),
            title: "New Conversation".to_string(),
            messages: Vec::new(),
            in_flight,
            caption: None,
            is_empty: true,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_submit_targets_current_conversation() {
        let mut app = App::new();
        app.apply_snapshot(vec![item("conv-1", true)], Some(view("conv-1", false)));
        app.handle_key(key(KeyCode::Char('h')));
        app.handle_key(key(KeyCode::Char('i')));

        assert_eq!(
            app.handle_key(key(KeyCode::Enter)),
            Action::Submit {
                conversation_id: Some("conv-1".into()),
                text: "hi".into()
            }
        );
    }

    #[test]
    fn test_submit_without_conversation_creates_one() {
        let mut app = App::new();
        app.handle_key(key(KeyCode::Char('x')));
        assert_eq!(
            app.handle_key(key(KeyCode::Enter)),
            Action::Submit {
                conversation_id: None,
                text: "x".into()
            }
        );
    }

    #[test]
    fn test_busy_conversation_refuses_enter() {
        let mut app = App::new();
        app.apply_snapshot(vec![item("conv-1", true)], Some(view("conv-1", true)));
        app.handle_key(key(KeyCode::Char('x')));
        assert_eq!(app.handle_key(key(KeyCode::Enter)), Action::None);
    }

    #[test]
    fn test_background_update_keeps_scroll() {
        let mut app = App::new();
        app.apply_snapshot(
            vec![item("conv-1", true), item("conv-2", false)],
            Some(view("conv-1", false)),
        );
        app.handle_key(key(KeyCode::PageUp));
        assert_eq!(app.scroll_back, SCROLL_STEP);

        app.on_event(&UiEvent::ConversationUpdated {
            conversation_id: "conv-2".into(),
            follow: false,
        });
        assert_eq!(app.scroll_back, SCROLL_STEP);

        app.on_event(&UiEvent::ConversationUpdated {
            conversation_id: "conv-1".into(),
            follow: true,
        });
        assert_eq!(app.scroll_back, 0);
    }

    #[test]
    fn test_stage_failure_shown_for_current_only() {
        let mut app = App::new();
        app.apply_snapshot(vec![item("conv-1", true)], Some(view("conv-1", false)));

        app.on_event(&UiEvent::StageFailed {
            conversation_id: "conv-2".into(),
            stage: Stage::Rankings,
            message: "rate limited".into(),
        });
        assert_eq!(app.status, None);

        app.on_event(&UiEvent::StageFailed {
            conversation_id: "conv-1".into(),
            stage: Stage::Rankings,
            message: "rate limited".into(),
        });
        assert_eq!(app.status.as_deref(), Some("Stage 2 failed: rate limited"));
    }

    #[test]
    fn test_sidebar_navigation() {
        let mut app = App::new();
        app.apply_snapshot(
            vec![item("conv-1", false), item("conv-2", false)],
            None,
        );
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Sidebar);

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.cursor, 1);
        assert_eq!(app.handle_key(key(KeyCode::Enter)), Action::Open("conv-2".into()));
        assert_eq!(app.focus, Focus::Composer);
    }

    #[test]
    fn test_switching_conversation_moves_cursor() {
        let mut app = App::new();
        app.apply_snapshot(
            vec![item("conv-1", true), item("conv-2", false)],
            Some(view("conv-1", false)),
        );
        app.scroll_back = 7;
        app.apply_snapshot(
            vec![item("conv-1", false), item("conv-2", true)],
            Some(view("conv-2", false)),
        );
        assert_eq!(app.cursor, 1);
        assert_eq!(app.scroll_back, 0);
    }
}
