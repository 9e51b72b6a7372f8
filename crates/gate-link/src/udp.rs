//! UDP link to the MAVLink peer (autopilot or ground station).
//!
//! Binds a local socket and exchanges raw datagrams with one fixed peer
//! address. Every received datagram becomes one data event; the frame
//! boundaries inside it are the codec's business, not the transport's.

use crate::endpoint::{Connect, LinkChannels, LinkError, LinkEvent, LINK_QUEUE};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::info;

const RECV_BUFFER: usize = 2048;

#[derive(Debug, Clone)]
pub struct UdpConnector {
    pub bind: SocketAddr,
    pub peer: SocketAddr,
}

impl UdpConnector {
    pub fn new(bind: SocketAddr, peer: SocketAddr) -> Self {
        Self { bind, peer }
    }
}

impl Connect for UdpConnector {
    async fn connect(&self) -> Result<LinkChannels, LinkError> {
        let socket = Arc::new(UdpSocket::bind(self.bind).await?);
        info!(bind = %socket.local_addr()?, peer = %self.peer, "udp link open");

        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(LINK_QUEUE);
        let (ev_tx, ev_rx) = mpsc::channel::<LinkEvent>(LINK_QUEUE);

        let reader_socket = Arc::clone(&socket);
        let reader_events = ev_tx.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER];
            loop {
                tokio::select! {
                    // Endpoint closed: nobody listens anymore.
                    _ = reader_events.closed() => break,
                    received = reader_socket.recv_from(&mut buf) => match received {
                        Ok((n, _src)) => {
                            if reader_events
                                .send(LinkEvent::Data(buf[..n].to_vec()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = reader_events
                                .send(LinkEvent::Fault(format!("udp recv: {e}")))
                                .await;
                            break;
                        }
                    },
                }
            }
        });

        let peer = self.peer;
        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if let Err(e) = socket.send_to(&bytes, peer).await {
                    let _ = ev_tx
                        .send(LinkEvent::Fault(format!("udp send: {e}")))
                        .await;
                    break;
                }
            }
        });

        Ok(LinkChannels {
            outbound: out_tx,
            events: ev_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_addr() -> SocketAddr {
        // Bind-and-release to pick a free port, as the integration tests do.
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap()
    }

    #[tokio::test]
    async fn datagrams_flow_both_ways() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let link_addr = ephemeral_addr();

        let connector = UdpConnector::new(link_addr, peer_addr);
        let mut channels = connector.connect().await.unwrap();

        channels.outbound.send(vec![1, 2, 3]).await.unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(from, link_addr);

        peer.send_to(&[4, 5], link_addr).await.unwrap();
        match channels.events.recv().await.unwrap() {
            LinkEvent::Data(bytes) => assert_eq!(bytes, vec![4, 5]),
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bind_conflict_is_a_connect_error() {
        let held = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap();
        let connector = UdpConnector::new(addr, ephemeral_addr());
        assert!(connector.connect().await.is_err());
    }
}
