use std::sync::Mutex;

/// One event on the progress channel between the engine and its caller.
///
/// This enum is the entire contract a front end needs to implement to render
/// progress for a run.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Human-readable stage description, optionally with an overall percent.
    Status {
        message: String,
        percent: Option<f32>,
    },
    /// Bare overall percentage, non-decreasing within one run.
    Progress(f32),
    /// Pass-through diagnostic line from a separation subprocess.
    RawOutput(String),
    Error(String),
    Success(String),
}

/// Receiver for [`ProgressEvent`]s. Implemented for any suitable closure.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that discards everything. Useful for headless callers and tests.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Wraps a sink and enforces the reporting contract for one run: percentages
/// are clamped to [0, 100] and never decrease.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: Mutex<f32>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: Mutex::new(0.0),
        }
    }

    fn advance(&self, percent: f32) -> f32 {
        let mut last = self.last.lock().expect("progress tracker poisoned");
        let value = percent.clamp(0.0, 100.0).max(*last);
        *last = value;
        value
    }

    pub fn status(&self, message: impl Into<String>, percent: Option<f32>) {
        let percent = percent.map(|p| self.advance(p));
        self.sink.emit(ProgressEvent::Status {
            message: message.into(),
            percent,
        });
    }

    pub fn progress(&self, percent: f32) {
        let value = self.advance(percent);
        self.sink.emit(ProgressEvent::Progress(value));
    }

    pub fn raw_line(&self, line: &str) {
        self.sink.emit(ProgressEvent::RawOutput(line.to_string()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.sink.emit(ProgressEvent::Error(message.into()));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.sink.emit(ProgressEvent::Success(message.into()));
    }

    /// A view of this tracker that maps a local 0–100% onto the overall
    /// `[start, end]` range. Used to scale a sub-task (e.g. separation) into
    /// its share of the whole run.
    pub fn span(&self, start: f32, end: f32) -> ProgressSpan<'_> {
        ProgressSpan {
            tracker: self,
            start,
            end,
            muted: false,
        }
    }

    /// A span that forwards raw output and status but drops percentages.
    /// Chunk workers use this: their aggregate progress is the fraction of
    /// completed chunks, not any single subprocess's percentage.
    pub fn muted_span(&self) -> ProgressSpan<'_> {
        ProgressSpan {
            tracker: self,
            start: 0.0,
            end: 0.0,
            muted: true,
        }
    }
}

/// Scaled view onto a [`ProgressTracker`] for one portion of the run.
pub struct ProgressSpan<'a> {
    tracker: &'a ProgressTracker<'a>,
    start: f32,
    end: f32,
    muted: bool,
}

impl ProgressSpan<'_> {
    /// Report local progress in 0–100 of this span.
    pub fn percent(&self, local: f32) {
        if self.muted {
            return;
        }
        let local = local.clamp(0.0, 100.0) / 100.0;
        self.tracker
            .progress(self.start + (self.end - self.start) * local);
    }

    pub fn status(&self, message: impl Into<String>) {
        self.tracker.status(message, None);
    }

    pub fn raw_line(&self, line: &str) {
        self.tracker.raw_line(line);
    }
}
