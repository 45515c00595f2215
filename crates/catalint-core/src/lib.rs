//! Catalint Core
//!
//! Message model, diagnostics, lexicons, configuration, catalog reading and
//! the parallel catalog runner shared by the rule engine and the CLI.

pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod executor;
pub mod lexicon;
pub mod message;
pub mod result;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogFormat, JsonReader, PoReader, ReadOptions};
pub use config::{CatalintConfig, ConfigLoader, RuleSeverity};
pub use diagnostics::{Diagnostic, MatchedSpan, Severity};
pub use engine::RuleEngine;
pub use error::{CatalintError, ErrorKind};
pub use executor::{
    CancellationToken, CatalogRunner, CollectingSink, DiagnosticSink, DiagnosticStream,
    ProgressCallback, ProgressInfo, RunReport, RunStats, RunnerConfig,
};
pub use lexicon::{LexiconProvider, LexiconRegistry, WordList};
pub use message::{MessagePair, MessagePart};
pub use result::{Result, ResultExt};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalint=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
