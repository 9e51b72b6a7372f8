//! Prometheus metrics for bridge observability.
//!
//! Counters cover the steady-state events (forward/skip/invalid/pong) and
//! the lifecycle (sessions, faults); gauges expose per-link and bridge
//! status.

use crate::endpoint::Role;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Valid frames forwarded from the local link to the remote link
pub static FRAMES_FORWARDED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_frames_forwarded_total",
        "Valid frames forwarded from the local link to the remote link",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Bytes of forwarded frames
pub static FORWARDED_BYTES: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_forwarded_bytes_total",
        "Wire bytes of frames forwarded to the remote link",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Invalid frames observed on the local link
pub static INVALID_FRAMES: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_invalid_frames_total",
        "Unparseable frames observed on the local link",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Keep-alive probes emitted
pub static PROBES_SENT: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_probes_sent_total",
        "Keep-alive probe frames sent on the local link",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Sends suppressed because an endpoint was not open
pub static SENDS_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_sends_skipped_total",
        "Sends dropped because the endpoint was not open or its queue was full",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Lifecycle attempts started
pub static SESSIONS_STARTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_sessions_started_total",
        "Bridge lifecycle attempts started",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Sessions ended by a connect failure or runtime fault
pub static SESSION_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mavgate_session_faults_total",
        "Sessions ended by a connect failure or runtime fault",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Local link status (1 = open, 0 = down)
pub static LOCAL_LINK_UP: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new("mavgate_local_link_up", "Local link status (1=open, 0=down)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Remote link status (1 = open, 0 = down)
pub static REMOTE_LINK_UP: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge =
        Gauge::new("mavgate_remote_link_up", "Remote link status (1=open, 0=down)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Bridge pump status (1 = active, 0 = not active)
pub static BRIDGE_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "mavgate_bridge_active",
        "Bridge pump status (1=both links open and pumping, 0=not active)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub fn link_up_gauge(role: Role) -> &'static Gauge {
    match role {
        Role::Local => &LOCAL_LINK_UP,
        Role::Remote => &REMOTE_LINK_UP,
    }
}

fn render_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Serve `/metrics`, `/health`, and `/ready` on a dedicated thread.
/// `/ready` reports 503 until the engine has attempted its first session.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let result = match request.url() {
                "/metrics" => match render_metrics() {
                    Ok(body) => {
                        let content_type = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        )
                        .unwrap();
                        request.respond(Response::from_data(body).with_header(content_type))
                    }
                    Err(e) => {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        )
                    }
                },
                "/health" => request.respond(Response::from_string("OK")),
                "/ready" if SESSIONS_STARTED.get() > 0 => {
                    request.respond(Response::from_string("Ready"))
                }
                "/ready" => {
                    request.respond(Response::from_string("Not Ready").with_status_code(503))
                }
                _ => request.respond(Response::from_string("Not Found").with_status_code(404)),
            };
            if let Err(e) = result {
                tracing::debug!("metrics response failed: {}", e);
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = FRAMES_FORWARDED.get();
    let _ = FORWARDED_BYTES.get();
    let _ = INVALID_FRAMES.get();
    let _ = PROBES_SENT.get();
    let _ = SENDS_SKIPPED.get();
    let _ = SESSIONS_STARTED.get();
    let _ = SESSION_FAULTS.get();
    let _ = LOCAL_LINK_UP.get();
    let _ = REMOTE_LINK_UP.get();
    let _ = BRIDGE_ACTIVE.get();
}
