//! One-shot batch runs over the chunked execution stream.

use futures_util::StreamExt;
use sandbox_api::{BatchStreamDecoder, OutputChannel, OutputEvent};
use tracing::{debug, info, warn};

use crate::services::ExecutionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub events: usize,
    pub saw_exit: bool,
    /// The run ended with an `Error` event.
    pub failed: bool,
}

/// Runs `language` with `stdin` and hands every decoded event to `sink` in
/// arrival order. Failures become a single trailing `Error` event.
pub async fn run_batch<F>(
    service: &dyn ExecutionService,
    language: &str,
    stdin: &str,
    mut sink: F,
) -> BatchSummary
where
    F: FnMut(OutputEvent),
{
    let mut decoder = BatchStreamDecoder::new();
    let mut tally = Tally::default();
    let mut deliver = |event: OutputEvent, tally: &mut Tally| {
        tally.events += 1;
        tally.failed |= event.channel == OutputChannel::Error;
        sink(event);
    };

    info!(language, stdin_bytes = stdin.len(), "batch run started");
    match service.execute_stream(language, stdin).await {
        Ok(mut stream) => {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        debug!(bytes = bytes.len(), "batch chunk");
                        for event in decoder.feed(&bytes) {
                            deliver(event, &mut tally);
                        }
                    }
                    Err(error) => {
                        warn!(%error, "batch stream broke");
                        if let Some(event) = decoder.fail(format!("Stream error: {error}")) {
                            deliver(event, &mut tally);
                        }
                        break;
                    }
                }
            }
            if let Some(event) = decoder.finish() {
                deliver(event, &mut tally);
            }
        }
        Err(error) => {
            warn!(%error, "batch run could not start");
            if let Some(event) = decoder.fail(format!("Execution failed: {error}")) {
                deliver(event, &mut tally);
            }
        }
    }

    let summary = BatchSummary {
        events: tally.events,
        saw_exit: decoder.saw_exit(),
        failed: tally.failed,
    };
    info!(
        events = summary.events,
        saw_exit = summary.saw_exit,
        failed = summary.failed,
        "batch run finished"
    );
    summary
}

#[derive(Default)]
struct Tally {
    events: usize,
    failed: bool,
}
