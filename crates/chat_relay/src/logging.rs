use std::io;

pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        // Use RUST_LOG if set
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(filter_for_verbosity(verbose_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        // stdout is left to the server's own output
        .with_writer(io::stderr)
        .init();
}

/// Map verbosity count to filters
fn filter_for_verbosity(verbose_level: u8) -> &'static str {
    match verbose_level {
        0 => "warn,chat_relay=info,llm=info",
        1 => "info,chat_relay=debug,llm=debug",
        _ => "debug,chat_relay=trace,llm=trace",
    }
}
