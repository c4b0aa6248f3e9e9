// Progress reporting.
//
// Components never read a process-wide verbosity flag. Each one is handed a
// `&dyn Reporter`; the CLI uses `LogReporter` (forwarding to the `log`
// facade, filtered by env_logger) and tests use `RecordingReporter`.

use std::fmt;
use std::sync::Mutex;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    ResolveTools,
    Extract,
    Patch,
    Merge,
    Cleanup,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolveTools => "tool resolution",
            Self::Extract => "extraction",
            Self::Patch => "patch",
            Self::Merge => "merge",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        })
    }
}

/// Sink for human-readable progress and failure messages.
///
/// Implementations must be shareable across the worker threads that run the
/// concurrent stages.
pub trait Reporter: Send + Sync {
    /// Progress line. Only shown when verbose output is enabled.
    fn info(&self, message: &str);

    /// Failure line. Always shown.
    fn error(&self, message: &str);

    /// Called when the orchestrator enters a stage.
    fn stage(&self, stage: Stage) {
        self.info(&format!("entering {stage} stage"));
    }
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }

    fn stage(&self, stage: Stage) {
        log::debug!("entering {stage} stage");
    }
}

/// A single captured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Info(String),
    Error(String),
    Stage(Stage),
}

/// Captures every message in order. Used by tests and by embedders that want
/// to render progress themselves.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Stages entered, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Stage(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Error(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        // A panicking worker must not hide the messages recorded before it.
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.lock().push(Event::Info(message.to_owned()));
    }

    fn error(&self, message: &str) {
        self.lock().push(Event::Error(message.to_owned()));
    }

    fn stage(&self, stage: Stage) {
        self.lock().push(Event::Stage(stage));
    }
}
