use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. JSON output is for log
/// aggregation; the pretty format is for a human at a terminal.
pub fn init_tracing(json_output: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mavgate=debug,gate_link=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_output {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}
