//! Plain-text rendering of run output for the terminal.

use sandbox_api::{OutputChannel, OutputEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
}

/// Where and how to print one event. Program output passes through as-is;
/// status lines are tagged with their channel on a line of their own.
///
/// In raw mode tagged lines end in `\r\n`, the same line end the line buffer
/// echoes.
pub fn render(event: &OutputEvent, raw: bool) -> (Target, String) {
    let newline = if raw { "\r\n" } else { "\n" };
    match event.channel {
        OutputChannel::Stdout => (Target::Stdout, event.content.clone()),
        OutputChannel::Stderr => (Target::Stderr, event.content.clone()),
        channel => (
            Target::Stderr,
            format!("{newline}[{}] {}{newline}", channel.as_str(), event.content.trim_end()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{render, Target};
    use sandbox_api::{OutputChannel, OutputEvent};

    fn event(channel: OutputChannel, content: &str) -> OutputEvent {
        OutputEvent {
            sequence: 0,
            channel,
            content: content.to_owned(),
        }
    }

    #[test]
    fn program_output_is_untouched() {
        assert_eq!(
            render(&event(OutputChannel::Stdout, "hi\n"), false),
            (Target::Stdout, "hi\n".to_owned())
        );
        assert_eq!(
            render(&event(OutputChannel::Stderr, "oops"), true),
            (Target::Stderr, "oops".to_owned())
        );
    }

    #[test]
    fn status_lines_are_tagged() {
        assert_eq!(
            render(&event(OutputChannel::Status, "Process exited with code 0"), false),
            (
                Target::Stderr,
                "\n[status] Process exited with code 0\n".to_owned()
            )
        );
        assert_eq!(
            render(&event(OutputChannel::System, "terminated"), true).1,
            "\r\n[system] terminated\r\n"
        );
    }
}
