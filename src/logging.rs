use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so they do
/// not mix with MUCK output on stdout.
pub fn init_logger(config: &LoggingConfig, verbose: bool) {
    let default_directive = if verbose {
        "fuzzball=debug,telnet_negotiation=debug,info".to_string()
    } else {
        format!("fuzzball={},telnet_negotiation=warn,warn", config.level)
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    let registry = tracing_subscriber::registry().with(filter);

    // try_init: a second call (tests, embedding apps) is not an error
    let result = if config.json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer.compact()).try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Logger already initialised: {}", e);
    }
}
