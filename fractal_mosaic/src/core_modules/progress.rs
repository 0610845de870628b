// THEORY:
// The engine talks back to its caller through two narrow channels and assumes
// nothing about who is listening.
//
// - `ProgressSink` receives `(completed, total)` after every block. Closures,
//   `ChannelProgress` and `NoProgress` implement it, so a UI, a log line, or
//   nobody at all can consume progress without the core changing.
// - `CancelToken` is a shared flag the caller can raise at any time. Workers
//   check it between blocks, so an abandoned invocation stops within one block
//   per worker and never returns a half-built image.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// How far a mosaic pass has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed share in `[0.0, 1.0]`. An empty pass counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}%)",
            self.completed,
            self.total,
            (self.fraction() * 100.0).floor() as u32
        )
    }
}

/// Anything that wants to hear about block completions.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Progress) {}
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

/// Forwards updates into a tokio channel, for consumers that prefer a stream.
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub mpsc::UnboundedSender<Progress>);

impl ChannelProgress {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, progress: Progress) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.0.send(progress);
    }
}

/// Cooperative cancellation flag shared between a caller and one invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
