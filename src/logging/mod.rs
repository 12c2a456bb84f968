use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Output goes to stderr so stdout stays clean for `--export` and JSON.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn default_directive(config: &LoggingConfig) -> String {
    format!("secretsync={}", config.level.as_filter())
}
