use tracing::{debug, warn};

use crate::events::{OutputChannel, OutputEvent};

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";
const EXIT_EVENT: &str = "done";
const STDERR_EVENT: &str = "stderr";

/// Message recorded when the stream closes before the exit frame.
pub const UNEXPECTED_END_MESSAGE: &str = "stream ended unexpectedly";

/// Incremental decoder for the batch execution output stream.
///
/// Frames are separated by a blank line (LF or CRLF line ends). `event:` names the channel (default
/// `stdout`), `data:` lines are concatenated into the payload. Bytes are held
/// undecoded until a frame is complete, so chunks may split anywhere, including
/// inside a multi-byte character.
#[derive(Debug, Default)]
pub struct BatchStreamDecoder {
    buffer: Vec<u8>,
    next_sequence: u64,
    saw_exit: bool,
    finished: bool,
}

impl BatchStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed arbitrary bytes into the decoder and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<OutputEvent> {
        if self.finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some((split, separator_len)) = find_separator(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..split + separator_len).collect();
            let frame = String::from_utf8_lossy(&frame[..split]);
            if let Some(event) = self.decode_frame(&frame) {
                events.push(event);
            }
        }

        events
    }

    /// Decode a complete stream body in one shot.
    pub fn decode_all(input: &str) -> Vec<OutputEvent> {
        let mut decoder = Self::default();
        decoder.feed(input.as_bytes())
    }

    /// Terminates the run with a single error event.
    ///
    /// Returns `None` when the decoder already finished.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<OutputEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.buffer.clear();
        Some(self.next_event(OutputChannel::Error, message.into()))
    }

    /// Marks end of stream. An end without the exit frame, or with undecoded
    /// bytes left over, is reported through [`BatchStreamDecoder::fail`].
    pub fn finish(&mut self) -> Option<OutputEvent> {
        if self.finished {
            return None;
        }
        let leftover = !self.is_empty_buffer();
        if self.saw_exit && !leftover {
            self.finished = true;
            return None;
        }
        if leftover {
            warn!(bytes = self.buffer.len(), "batch stream closed mid-frame");
        }
        self.fail(UNEXPECTED_END_MESSAGE)
    }

    pub fn saw_exit(&self) -> bool {
        self.saw_exit
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    fn decode_frame(&mut self, frame: &str) -> Option<OutputEvent> {
        let Some(parsed) = parse_frame(frame) else {
            debug!(frame, "skipping frame without payload");
            return None;
        };

        let (channel, content) = match parsed.event.as_deref() {
            Some(STDERR_EVENT) => (OutputChannel::Stderr, decode_payload(&parsed.data)),
            Some(EXIT_EVENT) => {
                self.saw_exit = true;
                (
                    OutputChannel::Status,
                    format!("Process exited with code {}", parsed.data),
                )
            }
            _ => (OutputChannel::Stdout, decode_payload(&parsed.data)),
        };

        Some(self.next_event(channel, content))
    }

    fn next_event(&mut self, channel: OutputChannel, content: String) -> OutputEvent {
        let event = OutputEvent {
            sequence: self.next_sequence,
            channel,
            content,
        };
        self.next_sequence += 1;
        event
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Frame {
    event: Option<String>,
    data: String,
}

fn parse_frame(frame: &str) -> Option<Frame> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in frame.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = line.strip_prefix(EVENT_PREFIX) {
            let value = value.trim();
            if !value.is_empty() {
                event = Some(value.to_owned());
            }
        } else if let Some(value) = line.strip_prefix(DATA_PREFIX) {
            let value = value.strip_prefix(' ').unwrap_or(value);
            data.get_or_insert_with(String::new).push_str(value);
        }
    }

    let data = data.filter(|value| !value.is_empty())?;
    Some(Frame { event, data })
}

/// Payloads are JSON string literals; anything else is taken verbatim.
fn decode_payload(payload: &str) -> String {
    match serde_json::from_str::<String>(payload) {
        Ok(text) => text,
        Err(_) => payload.to_owned(),
    }
}

/// Start and length of the first blank line: `\n\n`, or `\n\r\n` when lines
/// end in CRLF. The frame keeps the `\r` before its last `\n`; line parsing
/// strips it.
fn find_separator(buffer: &[u8]) -> Option<(usize, usize)> {
    buffer
        .iter()
        .enumerate()
        .filter(|(_, byte)| **byte == b'\n')
        .find_map(|(index, _)| match &buffer[index + 1..] {
            [b'\n', ..] => Some((index, 2)),
            [b'\r', b'\n', ..] => Some((index, 3)),
            _ => None,
        })
}
