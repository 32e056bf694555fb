#![doc(test(attr(deny(warnings))))]

//! Ledger Core is a double-entry bookkeeping engine: multi-currency amounts,
//! self-balancing transactions, recurring schedules and budgets.

pub mod config;
pub mod currency;
pub mod errors;
pub mod import;
pub mod ledger;
pub mod storage;
pub mod utils;

use std::sync::Once;

pub use currency::{parse_amount, Amount, Currency, ExchangeRateProvider, RateBook};
pub use errors::{LedgerError, Result};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    init_with_config(&config::Config::default());
}

/// Same as [`init`], honouring the configured log filter.
pub fn init_with_config(config: &config::Config) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing_with_filter(&config.log_filter);
        tracing::info!(build = %utils::build_info::current().summary(), "ledger core initialized");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
