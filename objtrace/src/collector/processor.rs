//! # Event Processing
//!
//! Drains the collector queue on a dedicated thread, parses each line with the
//! shared wire grammar and hands it to the selected [`Processor`].
//!
//! ## Processors
//!
//! - **stdout**: echo the raw line
//! - **json**: one JSON object per event
//! - **summary**: live object accounting, printed when the run ends
//! - **null**: discard (throughput testing)

use std::io::Write;
use std::thread::JoinHandle;

use clap::ValueEnum;
use crossbeam_channel::Receiver;
use log::{debug, warn};
use objtrace_common::WireEvent;

use crate::analysis::LiveObjectTracker;
use crate::domain::CollectorError;

use super::server::QueuedLine;

/// Allocation sites listed by the summary processor.
pub const SUMMARY_TOP_SITES: usize = 10;

/// Processor selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProcessorKind {
    Stdout,
    Json,
    Summary,
    Null,
}

/// Consumer of parsed events.
pub trait Processor: Send {
    /// Handle one event from `connection`. `raw` is the line as received,
    /// without the newline.
    ///
    /// # Errors
    /// Returns an error when output cannot be written.
    fn process(&mut self, connection: u64, raw: &str, event: &WireEvent) -> Result<(), CollectorError>;

    /// Called once after the queue closes.
    ///
    /// # Errors
    /// Returns an error when output cannot be written.
    fn finish(&mut self) -> Result<(), CollectorError> {
        Ok(())
    }
}

pub struct StdoutProcessor<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> StdoutProcessor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Processor for StdoutProcessor<W> {
    fn process(&mut self, _connection: u64, raw: &str, _event: &WireEvent) -> Result<(), CollectorError> {
        writeln!(self.out, "{raw}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CollectorError> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct JsonProcessor<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonProcessor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Processor for JsonProcessor<W> {
    fn process(&mut self, _connection: u64, _raw: &str, event: &WireEvent) -> Result<(), CollectorError> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CollectorError> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct SummaryProcessor<W: Write + Send> {
    tracker: LiveObjectTracker,
    out: W,
}

impl<W: Write + Send> SummaryProcessor<W> {
    pub fn new(out: W) -> Self {
        Self { tracker: LiveObjectTracker::new(), out }
    }
}

impl<W: Write + Send> Processor for SummaryProcessor<W> {
    fn process(&mut self, connection: u64, _raw: &str, event: &WireEvent) -> Result<(), CollectorError> {
        self.tracker.record(connection, event);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CollectorError> {
        write!(self.out, "{}", self.tracker.summary(SUMMARY_TOP_SITES))?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct NullProcessor;

impl Processor for NullProcessor {
    fn process(&mut self, _connection: u64, _raw: &str, _event: &WireEvent) -> Result<(), CollectorError> {
        Ok(())
    }
}

/// Build the processor for `kind`, writing to `out`.
#[must_use]
pub fn build_processor(kind: ProcessorKind, out: Box<dyn Write + Send>) -> Box<dyn Processor> {
    match kind {
        ProcessorKind::Stdout => Box::new(StdoutProcessor::new(out)),
        ProcessorKind::Json => Box::new(JsonProcessor::new(out)),
        ProcessorKind::Summary => Box::new(SummaryProcessor::new(out)),
        ProcessorKind::Null => Box::new(NullProcessor),
    }
}

/// Counters reported when the processor thread exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub processed: u64,
    pub parse_errors: u64,
    pub output_errors: u64,
}

/// Drain `queue` until every sender is gone.
pub fn run_processor(queue: &Receiver<QueuedLine>, processor: &mut dyn Processor) -> ProcessorStats {
    let mut stats = ProcessorStats::default();

    for QueuedLine { connection, line } in queue {
        let event = match line.parse::<WireEvent>() {
            Ok(event) => event,
            Err(e) => {
                stats.parse_errors += 1;
                warn!("Dropping malformed event line {line:?}: {}", CollectorError::from(e));
                continue;
            }
        };

        stats.processed += 1;
        if let Err(e) = processor.process(connection, &line, &event) {
            stats.output_errors += 1;
            warn!("Processor failed on event {}: {e}", event.id());
        }
    }

    if let Err(e) = processor.finish() {
        stats.output_errors += 1;
        warn!("Processor failed to finish: {e}");
    }
    debug!("Processor thread exiting: {stats:?}");
    stats
}

/// Run the processor on its own thread.
#[must_use]
pub fn spawn_processor(
    queue: Receiver<QueuedLine>,
    mut processor: Box<dyn Processor>,
) -> JoinHandle<ProcessorStats> {
    std::thread::spawn(move || run_processor(&queue, processor.as_mut()))
}
