//! Parallel catalog runner
//!
//! Pulls message pairs from a (possibly lazy) source, dispatches each to the
//! rule engine registered for its locale and hands the results to a sink.
//! Work is spread over a dedicated rayon pool; rule sets are shared
//! read-only and the sink serializes appends.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{Level, debug, info, span, warn};

use crate::{CatalintError, Diagnostic, MessagePair, Result, RuleEngine};

/// Progress reporting callback type
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Information about execution progress
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Number of catalog items pulled and processed so far
    pub processed: usize,
    /// Diagnostics produced so far
    pub diagnostics: usize,
    /// Elapsed time since start
    pub elapsed: Duration,
}

/// Cooperative cancellation flag.
///
/// Checked before each message is pulled from the source; messages already
/// being evaluated run to completion. A child token is cancelled with its
/// parent but cancelling the child leaves the parent alone.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.load(Ordering::SeqCst))
    }
}

/// Runner settings
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Worker threads; 1 evaluates on the calling thread
    pub jobs: usize,
    /// Sort collected diagnostics by catalog order
    pub ordered: bool,
    /// Treat messages whose locale has no rule set as item errors
    pub strict_locale: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            ordered: true,
            strict_locale: false,
        }
    }
}

/// Receives results as messages finish.
///
/// `sequence` is the pull order of the item the results belong to. Calls
/// arrive concurrently from worker threads.
pub trait DiagnosticSink: Sync {
    fn accept(&self, sequence: usize, diagnostics: Vec<Diagnostic>);

    fn item_error(&self, sequence: usize, error: CatalintError);
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<(usize, Vec<Diagnostic>)>>,
    errors: Mutex<Vec<(usize, CatalintError)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected results; `ordered` restores pull order
    pub fn into_parts(self, ordered: bool) -> (Vec<Diagnostic>, Vec<CatalintError>) {
        let mut batches = self
            .diagnostics
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut errors = self
            .errors
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if ordered {
            batches.sort_by_key(|(sequence, _)| *sequence);
            errors.sort_by_key(|(sequence, _)| *sequence);
        }

        (
            batches.into_iter().flat_map(|(_, batch)| batch).collect(),
            errors.into_iter().map(|(_, error)| error).collect(),
        )
    }
}

impl DiagnosticSink for CollectingSink {
    fn accept(&self, sequence: usize, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((sequence, diagnostics));
    }

    fn item_error(&self, sequence: usize, error: CatalintError) {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((sequence, error));
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Items pulled from the source (messages and unreadable entries)
    pub items: usize,
    /// Messages evaluated against a rule set
    pub evaluated: usize,
    /// Messages without a rule set for their locale
    pub skipped: usize,
    pub diagnostics: usize,
    pub errors: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Collected outcome of [`CatalogRunner::run`]
#[derive(Debug, Default)]
pub struct RunReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Per-item failures (unreadable entries, evaluation faults)
    pub errors: Vec<CatalintError>,
    pub stats: RunStats,
}

/// Outcome of processing a single pulled item
enum ItemOutcome {
    Evaluated(usize),
    Skipped,
    Failed,
}

/// Dispatches messages to per-locale rule engines
#[derive(Clone)]
pub struct CatalogRunner {
    engines: HashMap<String, Arc<dyn RuleEngine>>,
    config: RunnerConfig,
    progress: Option<ProgressCallback>,
    cancellation: CancellationToken,
}

impl CatalogRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            engines: HashMap::new(),
            config,
            progress: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Register the engine evaluating messages of `locale`
    pub fn with_engine(mut self, locale: impl Into<String>, engine: Arc<dyn RuleEngine>) -> Self {
        self.engines.insert(locale.into(), engine);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    /// Evaluate every message and collect the results
    pub fn run<I>(&self, messages: I) -> Result<RunReport>
    where
        I: Iterator<Item = Result<MessagePair>> + Send,
    {
        let sink = CollectingSink::new();
        let stats = self.run_into(messages, &sink)?;
        let (diagnostics, errors) = sink.into_parts(self.config.ordered);

        Ok(RunReport {
            diagnostics,
            errors,
            stats,
        })
    }

    /// Evaluate every message, streaming results into `sink`.
    ///
    /// With more than one job, results arrive in completion order.
    pub fn run_into<I, S>(&self, messages: I, sink: &S) -> Result<RunStats>
    where
        I: Iterator<Item = Result<MessagePair>> + Send,
        S: DiagnosticSink + ?Sized,
    {
        let span = span!(Level::DEBUG, "catalog_run", jobs = self.config.jobs);
        let _enter = span.enter();

        let start = Instant::now();
        let processed = AtomicUsize::new(0);
        let evaluated = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let diagnostics = AtomicUsize::new(0);
        let errors = AtomicUsize::new(0);

        let cancellation = &self.cancellation;
        let source = messages
            .enumerate()
            .take_while(|_| !cancellation.is_cancelled());

        let handle_item = |(sequence, item): (usize, Result<MessagePair>)| {
            match self.process_item(sequence, item, sink) {
                ItemOutcome::Evaluated(count) => {
                    evaluated.fetch_add(1, Ordering::Relaxed);
                    diagnostics.fetch_add(count, Ordering::Relaxed);
                }
                ItemOutcome::Skipped => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                ItemOutcome::Failed => {
                    errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(callback) = &self.progress {
                callback(ProgressInfo {
                    processed: done,
                    diagnostics: diagnostics.load(Ordering::Relaxed),
                    elapsed: start.elapsed(),
                });
            }
        };

        if self.config.jobs <= 1 {
            source.for_each(handle_item);
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .thread_name(|index| format!("catalint-worker-{index}"))
                .build()
                .map_err(|e| {
                    CatalintError::internal_error(format!("Cannot start worker pool: {e}"))
                })?;
            pool.install(|| source.par_bridge().for_each(handle_item));
        }

        let stats = RunStats {
            items: processed.into_inner(),
            evaluated: evaluated.into_inner(),
            skipped: skipped.into_inner(),
            diagnostics: diagnostics.into_inner(),
            errors: errors.into_inner(),
            cancelled: self.cancellation.is_cancelled(),
            elapsed: start.elapsed(),
        };

        info!(
            "Checked {} messages in {:?}: {} diagnostics, {} item errors",
            stats.evaluated, stats.elapsed, stats.diagnostics, stats.errors
        );
        if stats.cancelled {
            warn!("Run cancelled after {} items", stats.items);
        }

        Ok(stats)
    }

    /// Evaluate on a background thread, yielding results lazily.
    ///
    /// The stream yields per-item errors inline; call
    /// [`DiagnosticStream::finish`] to get the run statistics. Dropping the
    /// stream before `finish` stops the run from pulling further messages.
    pub fn stream<I>(&self, messages: I) -> DiagnosticStream
    where
        I: Iterator<Item = Result<MessagePair>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let mut runner = self.clone();
        let cancellation = self.cancellation.child();
        runner.cancellation = cancellation.clone();
        let handle = std::thread::Builder::new()
            .name("catalint-runner".to_string())
            .spawn(move || {
                let sink = ChannelSink { sender };
                runner.run_into(messages, &sink)
            });

        match handle {
            Ok(handle) => DiagnosticStream {
                receiver,
                handle: Some(handle),
                cancellation,
            },
            Err(e) => {
                let (sender, receiver) = mpsc::channel();
                let _ = sender.send(Err(CatalintError::internal_error(format!(
                    "Cannot start runner thread: {e}"
                ))));
                DiagnosticStream {
                    receiver,
                    handle: None,
                    cancellation,
                }
            }
        }
    }

    fn process_item<S>(&self, sequence: usize, item: Result<MessagePair>, sink: &S) -> ItemOutcome
    where
        S: DiagnosticSink + ?Sized,
    {
        let message = match item {
            Ok(message) => message,
            Err(error) => {
                debug!("Skipping unreadable item {}: {}", sequence, error);
                sink.item_error(sequence, error);
                return ItemOutcome::Failed;
            }
        };

        let Some(engine) = self.engines.get(&message.locale) else {
            if self.config.strict_locale {
                sink.item_error(
                    sequence,
                    CatalintError::evaluation_error(
                        &message.id,
                        format!("no rule set for locale '{}'", message.locale),
                    ),
                );
                return ItemOutcome::Failed;
            }
            debug!(
                "No rule set for locale '{}', skipping message {}",
                message.locale, message.id
            );
            return ItemOutcome::Skipped;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.evaluate(&message)));
        match outcome {
            Ok(Ok(diagnostics)) => {
                let count = diagnostics.len();
                sink.accept(sequence, diagnostics);
                ItemOutcome::Evaluated(count)
            }
            Ok(Err(error)) => {
                warn!("Evaluation failed for message {}: {}", message.id, error);
                sink.item_error(sequence, error);
                ItemOutcome::Failed
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "rule evaluation panicked".to_string());
                warn!("Evaluation panicked for message {}: {}", message.id, reason);
                sink.item_error(
                    sequence,
                    CatalintError::evaluation_error(&message.id, reason),
                );
                ItemOutcome::Failed
            }
        }
    }
}

struct ChannelSink {
    sender: mpsc::Sender<Result<Diagnostic>>,
}

impl DiagnosticSink for ChannelSink {
    fn accept(&self, _sequence: usize, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            // The receiver hung up; the remaining results have nowhere to go.
            if self.sender.send(Ok(diagnostic)).is_err() {
                return;
            }
        }
    }

    fn item_error(&self, _sequence: usize, error: CatalintError) {
        let _ = self.sender.send(Err(error));
    }
}

/// Lazy sequence of diagnostics produced by [`CatalogRunner::stream`]
pub struct DiagnosticStream {
    receiver: mpsc::Receiver<Result<Diagnostic>>,
    handle: Option<JoinHandle<Result<RunStats>>>,
    cancellation: CancellationToken,
}

impl DiagnosticStream {
    /// Drain what is left and return the run statistics
    pub fn finish(mut self) -> Result<RunStats> {
        for _ in self.receiver.iter() {}
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CatalintError::internal_error("runner thread panicked"))?,
            None => Err(CatalintError::internal_error("runner thread never started")),
        }
    }
}

impl Drop for DiagnosticStream {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Diagnostic stream dropped before finish; cancelling the run");
            self.cancellation.cancel();
        }
    }
}

impl Iterator for DiagnosticStream {
    type Item = Result<Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}
