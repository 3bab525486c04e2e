// src/logging.rs

//! Diagnostic logging.
//!
//! Logs go to stderr so the report on stdout stays machine-readable.
//! Verbosity comes from `RUST_LOG` and defaults to `warn`.
//!
//! ```bash
//! RUST_LOG=scriptgrader=debug scriptgrader grade
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
