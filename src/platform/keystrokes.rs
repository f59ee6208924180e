//! Splits raw stdin bytes into keystroke units.
//!
//! A unit is one character or one complete escape sequence. Escape sequences
//! and UTF-8 characters may arrive split across reads; their tails stay
//! buffered until the rest arrives, or until the flush deadline passes (a lone
//! `ESC` press looks exactly like the start of a sequence).

use std::time::{Duration, Instant};

const ESC: u8 = 0x1b;
const BRACKETED_PASTE_START: &str = "\x1b[200~";
const BRACKETED_PASTE_END: &str = "\x1b[201~";

/// Default wait before an incomplete escape tail is emitted as-is.
pub const DEFAULT_ESCAPE_TIMEOUT_MS: u64 = 10;

#[derive(Debug, PartialEq, Eq)]
enum SequenceStatus {
    Complete,
    Incomplete,
}

#[derive(Debug)]
pub struct KeystrokeSplitter {
    pending: Vec<u8>,
    timeout: Duration,
    paste: Option<String>,
    flush_deadline: Option<Instant>,
}

impl Default for KeystrokeSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_TIMEOUT_MS)
    }
}

impl KeystrokeSplitter {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: Vec::new(),
            timeout: Duration::from_millis(timeout_ms),
            paste: None,
            flush_deadline: None,
        }
    }

    /// Feed one read's worth of bytes, returning every complete unit.
    pub fn process(&mut self, data: &[u8]) -> Vec<String> {
        self.flush_deadline = None;
        self.pending.extend_from_slice(data);

        let text = take_valid_utf8(&mut self.pending);
        let units = self.split(text);

        if !self.pending.is_empty() {
            self.flush_deadline = Some(Instant::now() + self.timeout);
        }
        units
    }

    /// Emits a stale incomplete tail once its deadline has passed.
    pub fn flush_due(&mut self, now: Instant) -> Vec<String> {
        match self.flush_deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Time of the next pending flush, if a tail is buffered.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.flush_deadline
    }

    /// Emits whatever is buffered as a single unit.
    pub fn flush(&mut self) -> Vec<String> {
        self.flush_deadline = None;
        if self.pending.is_empty() {
            return Vec::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        vec![tail]
    }

    pub fn clear(&mut self) {
        self.flush_deadline = None;
        self.pending.clear();
        self.paste = None;
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.paste.is_some()
    }

    fn split(&mut self, text: String) -> Vec<String> {
        let mut units = Vec::new();
        let mut rest = text.as_str();

        loop {
            if let Some(paste) = self.paste.as_mut() {
                match rest.find(BRACKETED_PASTE_END) {
                    Some(end) => {
                        paste.push_str(&rest[..end]);
                        rest = &rest[end + BRACKETED_PASTE_END.len()..];
                        if let Some(pasted) = self.paste.take() {
                            units.extend(paste_units(&pasted));
                        }
                        continue;
                    }
                    None => {
                        // A partial end marker waits for the next read.
                        let keep = partial_marker_len(rest, BRACKETED_PASTE_END);
                        let split = rest.len() - keep;
                        paste.push_str(&rest[..split]);
                        self.hold_back(&rest[split..]);
                        return units;
                    }
                }
            }

            if rest.is_empty() {
                return units;
            }

            if let Some(after) = rest.strip_prefix(BRACKETED_PASTE_START) {
                self.paste = Some(String::new());
                rest = after;
                continue;
            }

            let bytes = rest.as_bytes();
            if bytes[0] == ESC {
                match sequence_end(rest) {
                    Some(end) => {
                        units.push(rest[..end].to_owned());
                        rest = &rest[end..];
                    }
                    None => {
                        self.hold_back(rest);
                        return units;
                    }
                }
                continue;
            }

            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                units.push(ch.to_string());
            }
            rest = chars.as_str();
        }
    }

    /// Keeps `tail` for the next read, ahead of any bytes still waiting for
    /// UTF-8 completion.
    fn hold_back(&mut self, tail: &str) {
        if tail.is_empty() {
            return;
        }
        let mut held = tail.as_bytes().to_vec();
        held.extend_from_slice(&self.pending);
        self.pending = held;
    }
}

/// Length of the longest suffix of `text` that starts `marker`.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len().min(text.len() + 1))
        .rev()
        .find(|len| text.ends_with(&marker[..*len]))
        .unwrap_or(0)
}

/// Pasted text is replayed as typed keys; line feeds become Enter. Escape
/// sequences inside the paste are dropped.
fn paste_units(pasted: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut rest = pasted;
    while let Some(ch) = rest.chars().next() {
        let len = if ch == ESC as char {
            sequence_end(rest).unwrap_or(rest.len())
        } else {
            ch.len_utf8()
        };
        match ch {
            '\n' => units.push("\r".to_owned()),
            '\r' => {}
            _ if ch == ESC as char => {}
            _ => units.push(ch.to_string()),
        }
        rest = &rest[len..];
    }
    units
}

/// Drains the longest valid UTF-8 prefix, leaving an incomplete trailing
/// character (if any) in `pending`. Invalid bytes are replaced.
fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_owned();
            pending.clear();
            text
        }
        Err(error) if error.error_len().is_none() => {
            let valid = error.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

/// Byte length of the complete escape sequence at the start of `data`.
///
/// An `ESC` followed by a control character (Enter, Ctrl+C, another `ESC`)
/// is a lone escape press of length 1; the control character stands alone.
pub(crate) fn sequence_end(data: &str) -> Option<usize> {
    if data.as_bytes().get(1).is_some_and(u8::is_ascii_control) {
        return Some(1);
    }
    (2..=data.len())
        .filter(|end| data.is_char_boundary(*end))
        .find(|end| is_complete_sequence(&data[..*end]) == SequenceStatus::Complete)
}

fn is_complete_sequence(data: &str) -> SequenceStatus {
    if data.len() < 2 {
        return SequenceStatus::Incomplete;
    }

    let after = &data[1..];
    if after.starts_with('[') {
        if after.starts_with("[M") {
            return if data.len() >= 6 {
                SequenceStatus::Complete
            } else {
                SequenceStatus::Incomplete
            };
        }
        return is_complete_csi_sequence(data);
    }

    if after.starts_with(']') || after.starts_with('P') || after.starts_with('_') {
        return if data.ends_with("\x1b\\") || (after.starts_with(']') && data.ends_with('\x07')) {
            SequenceStatus::Complete
        } else {
            SequenceStatus::Incomplete
        };
    }

    if after.starts_with('O') {
        return if after.len() >= 2 {
            SequenceStatus::Complete
        } else {
            SequenceStatus::Incomplete
        };
    }

    // Alt+key: ESC followed by one printable character.
    SequenceStatus::Complete
}

fn is_complete_csi_sequence(data: &str) -> SequenceStatus {
    if data.len() < 3 {
        return SequenceStatus::Incomplete;
    }

    match data.as_bytes().last() {
        Some(last) if (0x40..=0x7e).contains(last) => SequenceStatus::Complete,
        _ => SequenceStatus::Incomplete,
    }
}
