//! The two-endpoint bridge engine.
//!
//! One engine owns one local link (the side carrying framed MAVLink bytes)
//! and one remote link (the pub/sub side carrying opaque payloads). The
//! lifecycle loops `Idle -> Connecting -> Active -> Draining -> Idle`
//! forever with a fixed backoff between attempts; an external stop signal
//! short-circuits to `Stopped` from any suspension point.
//!
//! While active, the pump decodes local traffic into frames, forwards
//! valid frames to the remote link, and routes invalid frames to the
//! keep-alive prober. Remote traffic passes through to the local link
//! verbatim. Frames are never retried; the only retried unit is the whole
//! session.

use crate::endpoint::{Connect, Endpoint, LinkEvent, Role};
use crate::metrics::{
    BRIDGE_ACTIVE, FORWARDED_BYTES, FRAMES_FORWARDED, INVALID_FRAMES, PROBES_SENT,
    SESSIONS_STARTED, SESSION_FAULTS,
};
use crate::prober::KeepAliveProber;
use mav_codec::{Frame, MavParser, MSG_ID_PROTOCOL_VERSION};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Fixed delay between the end of one session and the next attempt.
    pub restart_backoff: Duration,
    /// Minimum spacing between keep-alive probes.
    pub probe_cooldown: Duration,
    /// System id of the autopilot the probe addresses.
    pub target_system: u8,
    /// Message id the probe requests, PROTOCOL_VERSION unless configured.
    pub probe_request_msg_id: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            restart_backoff: Duration::from_millis(1000),
            probe_cooldown: Duration::from_millis(1000),
            target_system: 1,
            probe_request_msg_id: MSG_ID_PROTOCOL_VERSION,
        }
    }
}

enum SessionEnd {
    Fault,
    Stopped,
}

pub struct BridgeEngine<L, R> {
    local: L,
    remote: R,
    config: BridgeConfig,
}

impl<L: Connect, R: Connect> BridgeEngine<L, R> {
    pub fn new(local: L, remote: R, config: BridgeConfig) -> Self {
        Self {
            local,
            remote,
            config,
        }
    }

    /// Run the lifecycle until `stop` flips to true. Each iteration builds
    /// two fresh endpoints; faulted ones are discarded, never reused.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }

            SESSIONS_STARTED.inc();
            let mut local = Endpoint::new(Role::Local);
            let mut remote = Endpoint::new(Role::Remote);

            info!("connecting");
            let opened = tokio::select! {
                _ = wait_stop(&mut stop) => None,
                result = async {
                    // Concurrent opens; the first failure cancels the
                    // other so a hung side cannot stall the attempt.
                    tokio::try_join!(local.open(&self.local), remote.open(&self.remote))
                } => Some(result),
            };

            let end = match opened {
                None => SessionEnd::Stopped,
                Some(Err(e)) => {
                    warn!(error = %e, "connect failed");
                    SESSION_FAULTS.inc();
                    SessionEnd::Fault
                }
                Some(Ok(_)) => {
                    info!("bridge active");
                    BRIDGE_ACTIVE.set(1.0);
                    let end = self.pump(&mut local, &mut remote, &mut stop).await;
                    BRIDGE_ACTIVE.set(0.0);
                    end
                }
            };

            // Draining: tear down both sides regardless of which faulted.
            local.close();
            remote.close();

            match end {
                SessionEnd::Stopped => break,
                SessionEnd::Fault => {
                    debug!(
                        backoff_ms = self.config.restart_backoff.as_millis() as u64,
                        "waiting restart backoff"
                    );
                    tokio::select! {
                        _ = wait_stop(&mut stop) => break,
                        _ = sleep(self.config.restart_backoff) => {}
                    }
                }
            }
        }
        info!("bridge stopped");
    }

    /// The bidirectional message pump. Fresh parser and prober state per
    /// session. Each received chunk is processed to completion before the
    /// next event, preserving per-direction FIFO order.
    async fn pump(
        &self,
        local: &mut Endpoint,
        remote: &mut Endpoint,
        stop: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let mut parser = MavParser::new();
        let mut prober = KeepAliveProber::new(
            self.config.probe_cooldown,
            self.config.target_system,
            self.config.probe_request_msg_id,
        );

        loop {
            tokio::select! {
                _ = wait_stop(stop) => return SessionEnd::Stopped,
                event = local.next_event() => match event {
                    LinkEvent::Data(chunk) => {
                        for frame in parser.feed(&chunk) {
                            match frame {
                                Frame::Valid { name, payload } => {
                                    debug!(bytes = payload.len(), msg = name, "send");
                                    FRAMES_FORWARDED.inc();
                                    FORWARDED_BYTES.inc_by(payload.len() as u64);
                                    remote.send(&payload);
                                }
                                Frame::Invalid { raw } => {
                                    INVALID_FRAMES.inc();
                                    debug!(bytes = raw.len(), "invalid frame");
                                    if let Some(probe) = prober.notify_invalid() {
                                        debug!("pong");
                                        PROBES_SENT.inc();
                                        local.send(&probe);
                                    }
                                }
                            }
                        }
                    }
                    LinkEvent::Fault(reason) => {
                        warn!(link = "local", %reason, "link fault");
                        SESSION_FAULTS.inc();
                        return SessionEnd::Fault;
                    }
                },
                event = remote.next_event() => match event {
                    LinkEvent::Data(payload) => {
                        debug!(bytes = payload.len(), "recv");
                        local.send(&payload);
                    }
                    LinkEvent::Fault(reason) => {
                        warn!(link = "remote", %reason, "link fault");
                        SESSION_FAULTS.inc();
                        return SessionEnd::Fault;
                    }
                },
            }
        }
    }
}

async fn wait_stop(stop: &mut watch::Receiver<bool>) {
    // A dropped sender counts as a stop request.
    let _ = stop.wait_for(|stopped| *stopped).await;
}
