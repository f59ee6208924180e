//! Line-buffered terminal input with local echo.
//!
//! Keystrokes are collected into a pending line while a run is live. The
//! remote side only ever sees whole lines (on Enter) or an interrupt
//! (on Ctrl+C); everything else is local editing.

use crate::platform::keystrokes::sequence_end;

const INTERRUPT: char = '\x03';
const CARRIAGE_RETURN: char = '\r';
const BACKSPACE: char = '\x7f';
const ESCAPE: char = '\x1b';

pub const NEWLINE_ECHO: &str = "\r\n";
pub const ERASE_ECHO: &str = "\x08 \x08";
pub const INTERRUPT_ECHO: &str = "^C\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    /// A finished line, always terminated by `\n`.
    Commit(String),
    Interrupt,
}

/// Result of feeding one keystroke unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOutcome {
    /// Bytes to write back to the local terminal, in order.
    pub echo: Vec<String>,
    pub actions: Vec<LineAction>,
}

impl FeedOutcome {
    pub fn is_empty(&self) -> bool {
        self.echo.is_empty() && self.actions.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TerminalLineBuffer {
    pending: String,
    running: bool,
}

impl TerminalLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ending a run discards the pending line.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
        if !running {
            self.pending.clear();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Feeds one keystroke unit: a single character, a whole escape sequence,
    /// or a chunk of plain text that is handled character by character.
    /// Escape sequences anywhere in the unit are dropped whole.
    pub fn feed(&mut self, unit: &str) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        if !self.running {
            return outcome;
        }

        let mut rest = unit;
        while let Some(ch) = rest.chars().next() {
            if ch == ESCAPE {
                // An unfinished sequence swallows the rest of the unit.
                let skip = sequence_end(rest).unwrap_or(rest.len());
                rest = &rest[skip..];
                continue;
            }
            self.feed_char(ch, &mut outcome);
            rest = &rest[ch.len_utf8()..];
        }
        outcome
    }

    fn feed_char(&mut self, ch: char, outcome: &mut FeedOutcome) {
        match ch {
            INTERRUPT => {
                self.pending.clear();
                outcome.echo.push(INTERRUPT_ECHO.to_owned());
                outcome.actions.push(LineAction::Interrupt);
            }
            CARRIAGE_RETURN => {
                let mut line = std::mem::take(&mut self.pending);
                line.push('\n');
                outcome.echo.push(NEWLINE_ECHO.to_owned());
                outcome.actions.push(LineAction::Commit(line));
            }
            BACKSPACE => {
                if self.pending.pop().is_some() {
                    outcome.echo.push(ERASE_ECHO.to_owned());
                }
            }
            ' '..='~' => {
                self.pending.push(ch);
                outcome.echo.push(ch.to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LineAction, TerminalLineBuffer};

    #[test]
    fn pending_line_grows_with_printable_input() {
        let mut buffer = TerminalLineBuffer::new();
        buffer.set_running(true);
        buffer.feed("h");
        buffer.feed("i");
        assert_eq!(buffer.pending(), "hi");
    }

    #[test]
    fn backspace_on_empty_line_echoes_nothing() {
        let mut buffer = TerminalLineBuffer::new();
        buffer.set_running(true);
        assert!(buffer.feed("\x7f").is_empty());
    }

    #[test]
    fn stopping_discards_pending_line() {
        let mut buffer = TerminalLineBuffer::new();
        buffer.set_running(true);
        buffer.feed("abc");
        buffer.set_running(false);
        assert_eq!(buffer.pending(), "");
        assert!(buffer.feed("x").is_empty());
    }

    #[test]
    fn control_and_non_ascii_characters_are_ignored() {
        let mut buffer = TerminalLineBuffer::new();
        buffer.set_running(true);
        assert!(buffer.feed("\t").is_empty());
        assert!(buffer.feed("é").is_empty());
        assert_eq!(buffer.pending(), "");
    }

    #[test]
    fn chunk_with_enter_commits_mid_chunk() {
        let mut buffer = TerminalLineBuffer::new();
        buffer.set_running(true);
        let outcome = buffer.feed("1\r2");
        assert_eq!(outcome.actions, vec![LineAction::Commit("1\n".to_owned())]);
        assert_eq!(buffer.pending(), "2");
    }
}
