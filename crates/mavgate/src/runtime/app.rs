use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use gate_link::{BridgeConfig, BridgeEngine, PubSubConnector, UdpConnector};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run_from_args() {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return;
    }
    run(config).await;
}

pub async fn run(config: RuntimeConfig) {
    init_tracing(config.json_logs);
    telemetry::init();

    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let udp_bind: SocketAddr = config
        .udp_bind
        .parse()
        .unwrap_or_else(|e| panic!("Invalid --udp-bind {}: {}", config.udp_bind, e));
    let udp_peer: SocketAddr = config
        .udp_peer
        .parse()
        .unwrap_or_else(|e| panic!("Invalid --udp-peer {}: {}", config.udp_peer, e));

    let local = UdpConnector::new(udp_bind, udp_peer);
    let remote = PubSubConnector::new(
        config.broker.clone(),
        config.subscribe_topic.clone(),
        config.publish_topic.clone(),
    );

    let engine = BridgeEngine::new(
        local,
        remote,
        BridgeConfig {
            restart_backoff: Duration::from_millis(config.restart_backoff_ms),
            probe_cooldown: Duration::from_millis(config.probe_cooldown_ms),
            target_system: config.target_system,
            probe_request_msg_id: config.probe_msg_id,
        },
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let engine_handle = tokio::spawn(async move { engine.run(stop_rx).await });

    info!(
        udp_peer = %udp_peer,
        broker = %config.broker,
        subscribe = %config.subscribe_topic,
        publish = %config.publish_topic,
        "mavgate started"
    );

    match config.run_seconds {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(secs, "Run duration elapsed, shutting down");
                }
                r = tokio::signal::ctrl_c() => {
                    if let Err(e) = r {
                        warn!(error = %e, "Failed to listen for shutdown signal");
                    }
                    info!("Shutdown signal received");
                }
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
    }

    let _ = stop_tx.send(true);
    if let Err(e) = engine_handle.await {
        warn!(error = %e, "Bridge task ended abnormally");
    }
    info!("mavgate stopped");
}
