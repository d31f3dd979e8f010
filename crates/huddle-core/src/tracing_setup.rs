use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_tracing() {
    init_tracing_with_service("huddle");
}

/// Install the global subscriber: stderr output filtered by `RUST_LOG`
/// (default `info`), plus a DEBUG file log when `HUDDLE_LOG_FILE` is set.
/// Calling it again after a subscriber is installed does nothing.
pub fn init_tracing_with_service(service_name: &str) {
    let file_logging = std::env::var("HUDDLE_LOG_FILE").ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.as_ref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Could not open log file {}: {}", log_path, e);
                None
            }
        }
    });

    let file_enabled = file.is_some();
    let installed = match file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
            registry.with(file_layer).try_init().is_ok()
        }
        None => registry.try_init().is_ok(),
    };

    if installed {
        tracing::debug!(service = service_name, "tracing initialised");
        if let (true, Some(log_path)) = (file_enabled, file_logging) {
            eprintln!("File logging enabled: {}", log_path);
        }
    }
}
