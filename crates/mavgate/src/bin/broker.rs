//! Standalone pub/sub broker for topologies where no external hub exists.

use gate_link::Broker;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn print_help() {
    println!(
        r#"broker - topic fan-out hub for mavgate bridges

USAGE:
    broker [OPTIONS]

OPTIONS:
    --bind <ADDR>   Listen address [default: 0.0.0.0:7600]
    --json-logs     Output logs in JSON format
    -h, --help      Print this help message
"#
    );
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut bind = "0.0.0.0:7600".to_string();
    let mut json_logs = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                if i + 1 < args.len() {
                    bind = args[i + 1].clone();
                    i += 1;
                }
            }
            "--json-logs" => {
                json_logs = true;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gate_link=debug"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }

    let broker = Broker::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind broker on {}: {}", bind, e));
    if let Err(e) = broker.run().await {
        tracing::error!(error = %e, "broker exited");
    }
}
