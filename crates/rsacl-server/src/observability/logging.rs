//! Structured logging configuration.
//!
//! Provider operations are instrumented with `tracing` spans (`find_acl`,
//! `update_acl`, `delete_acl` ...) carrying the object identity. This module
//! installs the subscriber that renders them, as JSON for production or as
//! pretty text for development.
//!
//! The configured level applies to the rsacl crates only; everything else
//! logs at `warn` unless `RUST_LOG` says otherwise.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter, Layer, Registry,
};

/// Crates whose events follow [`LoggingConfig::default_level`].
const RSACL_TARGETS: [&str; 3] = ["rsacl_domain", "rsacl_storage", "rsacl_server"];

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub json_format: bool,
    /// Level for the rsacl crates when `RUST_LOG` is not set.
    pub default_level: Level,
    /// Emit span enter/exit events.
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    pub fn text() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }

    /// Filter directives used when `RUST_LOG` is absent, e.g.
    /// `warn,rsacl_domain=info,rsacl_storage=info,rsacl_server=info`.
    pub fn filter_directives(&self) -> String {
        let level = self.default_level.to_string().to_lowercase();
        std::iter::once("warn".to_string())
            .chain(RSACL_TARGETS.iter().map(|target| format!("{target}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }

    fn format_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_span_events(self.span_events())
            .with_target(true);
        if self.json_format {
            layer
                .json()
                .with_current_span(true)
                .with_file(false)
                .with_line_number(false)
                .boxed()
        } else {
            layer.pretty().boxed()
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case that subscriber is kept.
pub fn init_logging(config: LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let subscriber = tracing_subscriber::registry()
        .with(config.format_layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// JSON subscriber writing to `writer`, for capturing logs in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
