//! Tracing subscriber setup from the `logging` config section.

use parley_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter directives: `RUST_LOG` wins, then `--verbose`, then config.
pub fn filter_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.level.clone().unwrap_or_else(|| "info".to_string())
    };

    std::iter::once(level)
        .chain(config.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn init(config: &LoggingConfig, verbose: bool) {
    let directives = filter_directives(config, verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (config.format.as_str(), config.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
}
