use serde::{Deserialize, Serialize};

/// Channel an output line was produced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannel {
    Stdout,
    Stderr,
    Status,
    System,
    Error,
}

impl OutputChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Status => "status",
            Self::System => "system",
            Self::Error => "error",
        }
    }
}

/// One line of run output. `sequence` is strictly increasing within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub sequence: u64,
    pub channel: OutputChannel,
    pub content: String,
}

/// Append-only output sequence for one run.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    events: Vec<OutputEvent>,
    next_sequence: u64,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line and returns the stored event.
    pub fn push(&mut self, channel: OutputChannel, content: impl Into<String>) -> &OutputEvent {
        let event = OutputEvent {
            sequence: self.next_sequence,
            channel,
            content: content.into(),
        };
        self.next_sequence += 1;
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Appends an event produced elsewhere, renumbering it into this log.
    pub fn append(&mut self, event: OutputEvent) -> &OutputEvent {
        self.push(event.channel, event.content)
    }

    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.next_sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputChannel, OutputLog};

    #[test]
    fn sequences_increase_and_restart_after_clear() {
        let mut log = OutputLog::new();
        log.push(OutputChannel::Stdout, "a");
        log.push(OutputChannel::Stderr, "b");
        let sequences: Vec<u64> = log.events().iter().map(|event| event.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.push(OutputChannel::System, "c").sequence, 0);
    }

    #[test]
    fn channel_names_are_stable() {
        let json = serde_json::to_string(&OutputChannel::Status).expect("serialize channel");
        assert_eq!(json, "\"status\"");
        assert_eq!(OutputChannel::Error.as_str(), "error");
    }
}
