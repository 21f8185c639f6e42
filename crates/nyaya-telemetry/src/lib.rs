mod journal;

pub use journal::{AnomalyJournal, JournalEntry, JournalLayer, JournalQuery, UNCLASSIFIED};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Emit JSON lines on stderr instead of human-readable text.
    pub json_output: bool,
    /// Where to keep the anomaly journal. `None` keeps nothing.
    pub journal_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::WARN,
            json_output: false,
            journal_path: None,
        }
    }
}

/// Keeps the journal reachable for the lifetime of the process.
pub struct TelemetryGuard {
    journal: Option<Arc<AnomalyJournal>>,
}

impl TelemetryGuard {
    pub fn journal(&self) -> Option<&AnomalyJournal> {
        self.journal.as_deref()
    }
}

fn default_directive(level: Level) -> String {
    level.as_str().to_ascii_lowercase()
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let directive = default_directive(config.log_level);
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive))
    };

    // Human-facing output goes to stdout; logs stay on stderr.
    let fmt_layer = if config.json_output {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
            .boxed()
    };

    // The journal sees warn+ regardless of the console level.
    let journal = config.journal_path.as_deref().and_then(|path| {
        AnomalyJournal::open(path)
            .map_err(|e| eprintln!("nyaya-telemetry: failed to open {}: {e}", path.display()))
            .ok()
            .map(Arc::new)
    });
    let journal_layer = journal.clone().map(JournalLayer::new);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(journal_layer)
        .init();

    TelemetryGuard { journal }
}
