//! Logging and tracing configuration
//!
//! Structured logging uses the `tracing` crate. The library never installs a
//! subscriber on its own; binaries call [`init`] once at startup.
//!
//! # Environment Variable Control
//!
//! Set `RUST_LOG` to control log levels at runtime:
//! ```bash
//! RUST_LOG=debug office-repair in.docx out.docx
//! RUST_LOG=office_repair::archive=trace office-repair in.docx out.docx
//! RUST_LOG=warn office-repair in.docx out.docx
//! ```
//!
//! The caller-facing issue log is `RepairReport::per_entry_notes`; tracing
//! output is for diagnostics only.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging/tracing system
///
/// Call this once at application startup (in main.rs)
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default: info in release, debug in debug builds
        if cfg!(debug_assertions) {
            EnvFilter::new("office_repair=debug")
        } else {
            EnvFilter::new("office_repair=info")
        }
    });

    // Logs go to stderr; stdout is reserved for the JSON report
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Set as global default (ignore error if already set)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread IDs)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
