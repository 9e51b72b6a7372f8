//! Uniform wrapper around one transport connection.
//!
//! A transport (UDP socket, broker session) hands over a pair of bounded
//! channels on connect: an outbound sender for wire bytes and an event
//! receiver for inbound data and faults. The `Endpoint` layers the
//! lifecycle state machine on top and enforces the drop-on-send-while-down
//! policy: sending while the link is not `Open` is a counted no-op, never
//! an error and never a queue.

use crate::metrics::{link_up_gauge, SENDS_SKIPPED};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Bounded queue depth for both directions of a link. A full outbound
/// queue drops the frame rather than stalling the pump.
pub const LINK_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Asynchronous notification from a live link.
#[derive(Debug)]
pub enum LinkEvent {
    Data(Vec<u8>),
    Fault(String),
}

/// The capability set a connected transport exposes to the bridge.
pub struct LinkChannels {
    pub outbound: mpsc::Sender<Vec<u8>>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// A factory for link sessions. Called once per lifecycle attempt; a
/// transport's own connect timeout is the only timeout applied.
pub trait Connect: Send + Sync {
    fn connect(&self) -> impl Future<Output = Result<LinkChannels, LinkError>> + Send;
}

impl<C: Connect> Connect for std::sync::Arc<C> {
    fn connect(&self) -> impl Future<Output = Result<LinkChannels, LinkError>> + Send {
        (**self).connect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Local,
    Remote,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Local => f.write_str("local"),
            Role::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Closed,
    Opening,
    Open,
    Faulted,
}

/// One transport connection for one lifecycle attempt. Never reused: a
/// faulted endpoint stays faulted and the next attempt constructs a fresh
/// one.
pub struct Endpoint {
    role: Role,
    state: EndpointState,
    outbound: Option<mpsc::Sender<Vec<u8>>>,
    events: Option<mpsc::Receiver<LinkEvent>>,
    skipped: u64,
}

impl Endpoint {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: EndpointState::Closed,
            outbound: None,
            events: None,
            skipped: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Sends suppressed because the endpoint was not `Open`.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub async fn open<C: Connect>(&mut self, connector: &C) -> Result<(), LinkError> {
        self.state = EndpointState::Opening;
        match connector.connect().await {
            Ok(channels) => {
                self.outbound = Some(channels.outbound);
                self.events = Some(channels.events);
                self.state = EndpointState::Open;
                link_up_gauge(self.role).set(1.0);
                debug!(role = %self.role, "endpoint open");
                Ok(())
            }
            Err(e) => {
                self.state = EndpointState::Faulted;
                link_up_gauge(self.role).set(0.0);
                Err(e)
            }
        }
    }

    /// Fire-and-forget send. Dropped (and counted) when the endpoint is
    /// not `Open` or the outbound queue is full.
    pub fn send(&mut self, bytes: &[u8]) {
        if self.state != EndpointState::Open {
            self.skip(bytes.len(), "not open");
            return;
        }
        let Some(tx) = &self.outbound else {
            self.skip(bytes.len(), "not open");
            return;
        };
        match tx.try_send(bytes.to_vec()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => self.skip(bytes.len(), "queue full"),
            // The fault will surface through the event stream; until the
            // engine observes it this send is just a skip.
            Err(mpsc::error::TrySendError::Closed(_)) => self.skip(bytes.len(), "link gone"),
        }
    }

    /// Next data or fault notification. Observing a fault (or the link
    /// tasks ending) moves the endpoint to `Faulted`.
    pub async fn next_event(&mut self) -> LinkEvent {
        let Some(rx) = self.events.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Some(LinkEvent::Fault(reason)) => {
                self.fault();
                LinkEvent::Fault(reason)
            }
            Some(event) => event,
            None => {
                self.fault();
                LinkEvent::Fault("link tasks ended".to_string())
            }
        }
    }

    /// Idempotent teardown. Dropping the channel handles ends the
    /// transport tasks on their next poll.
    pub fn close(&mut self) {
        self.outbound = None;
        self.events = None;
        if self.state != EndpointState::Faulted {
            self.state = EndpointState::Closed;
        }
        link_up_gauge(self.role).set(0.0);
    }

    fn fault(&mut self) {
        self.state = EndpointState::Faulted;
        link_up_gauge(self.role).set(0.0);
    }

    fn skip(&mut self, bytes: usize, reason: &str) {
        self.skipped += 1;
        SENDS_SKIPPED.inc();
        debug!(role = %self.role, bytes, reason, "skip");
    }
}
