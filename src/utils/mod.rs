pub mod build_info;
pub mod persistence;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "ledger_core=info";

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with the default filter.
pub fn init_tracing() {
    init_tracing_with_filter(DEFAULT_LOG_FILTER);
}

/// Initializes the global tracing subscriber. `RUST_LOG` wins over `filter`
/// when set. Only the first call has any effect.
pub fn init_tracing_with_filter(filter: &str) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        // A subscriber installed by the host application takes precedence.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
