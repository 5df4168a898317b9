use std::env;
use tracing_subscriber::{fmt, EnvFilter};

pub fn setup_logging() {
    // Check for a LOG_LEVEL environment variable, defaulting to INFO
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    // RUST_LOG wins when set; otherwise build a filter that limits noisy components
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(format!("rwalent_notifications={}", log_level));
        // Background polling is chatty and its failures are expected to be silent
        for directive in [
            "rwalent_notifications::poller=warn",
            "reqwest=warn",
            "hyper=warn",
        ] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    });

    // Initialize the subscriber with the filter
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        // Thread details add nothing for a single client session
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    tracing::info!("Logging initialized");
}
