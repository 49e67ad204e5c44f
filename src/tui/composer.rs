//! Message input
//!
//! Plain Enter sends; Shift+Enter or Alt+Enter inserts a newline. Sending
//! is refused while the text is blank or the council is deliberating.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub const FIRST_PLACEHOLDER: &str = "What do you want to know?";
pub const FOLLOW_UP_PLACEHOLDER: &str = "Ask a follow-up question...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerOutcome {
    /// The text to submit; the composer is cleared
    Submit(String),
    Changed,
    Ignored,
}

#[derive(Debug, Default)]
pub struct Composer {
    text: String,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn can_send(&self, busy: bool) -> bool {
        !busy && !self.text.trim().is_empty()
    }

    #[must_use]
    pub fn placeholder(has_messages: bool) -> &'static str {
        if has_messages {
            FOLLOW_UP_PLACEHOLDER
        } else {
            FIRST_PLACEHOLDER
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, busy: bool) -> ComposerOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) => {
                if busy {
                    return ComposerOutcome::Ignored;
                }
                self.text.push('\n');
                ComposerOutcome::Changed
            }
            KeyCode::Enter => {
                if !self.can_send(busy) {
                    return ComposerOutcome::Ignored;
                }
                let text = std::mem::take(&mut self.text);
                ComposerOutcome::Submit(text.trim().to_string())
            }
            KeyCode::Char('u') if ctrl => {
                self.text.clear();
                ComposerOutcome::Changed
            }
            KeyCode::Char(c) if !ctrl && !busy => {
                self.text.push(c);
                ComposerOutcome::Changed
            }
            KeyCode::Backspace if !busy => {
                if self.text.pop().is_some() {
                    ComposerOutcome::Changed
                } else {
                    ComposerOutcome::Ignored
                }
            }
            _ => ComposerOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut Composer, text: &str) {
        for c in text.chars() {
            composer.handle_key(key(KeyCode::Char(c)), false);
        }
    }

    #[test]
    fn test_enter_submits_trimmed_text() {
        let mut composer = Composer::new();
        type_text(&mut composer, "  What is 2+2? ");
        assert_eq!(
            composer.handle_key(key(KeyCode::Enter), false),
            ComposerOutcome::Submit("What is 2+2?".into())
        );
        assert_eq!(composer.text(), "");
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let mut composer = Composer::new();
        type_text(&mut composer, "line one");
        let outcome = composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT), false);
        assert_eq!(outcome, ComposerOutcome::Changed);
        type_text(&mut composer, "line two");
        assert_eq!(composer.text(), "line one\nline two");
    }

    #[test]
    fn test_blank_or_busy_is_not_sent() {
        let mut composer = Composer::new();
        type_text(&mut composer, "   ");
        assert_eq!(
            composer.handle_key(key(KeyCode::Enter), false),
            ComposerOutcome::Ignored
        );

        type_text(&mut composer, "hello");
        assert!(!composer.can_send(true));
        assert_eq!(
            composer.handle_key(key(KeyCode::Enter), true),
            ComposerOutcome::Ignored
        );
        // Text survives a refused send
        assert_eq!(composer.text(), "   hello");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(Composer::placeholder(false), "What do you want to know?");
        assert_eq!(Composer::placeholder(true), "Ask a follow-up question...");
    }
}
