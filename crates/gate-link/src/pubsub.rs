//! Length-framed TCP pub/sub channel.
//!
//! The bridge publishes opaque payloads on one topic and subscribes to
//! another; the hub side does the reverse. The wire format is two frame
//! kinds, each length-prefixed:
//!
//! ```text
//! op: u8 (1 = SUBSCRIBE, 2 = PUBLISH)
//! topic_len: u16 BE, topic bytes (UTF-8)
//! payload_len: u32 BE, payload bytes (empty for SUBSCRIBE)
//! ```
//!
//! Client reconnection, credentials, and TLS are deliberately absent:
//! a broken session faults the endpoint and the engine's restart loop
//! builds a new one.

use crate::endpoint::{Connect, LinkChannels, LinkError, LinkEvent, LINK_QUEUE};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const OP_SUBSCRIBE: u8 = 1;
pub const OP_PUBLISH: u8 = 2;

const MAX_TOPIC_LEN: usize = 1024;
const MAX_PAYLOAD_LEN: usize = 1 << 20;

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    op: u8,
    topic: &str,
    payload: &[u8],
) -> io::Result<()> {
    if topic.len() > MAX_TOPIC_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "topic too long"));
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "payload too long"));
    }
    writer.write_u8(op).await?;
    writer.write_u16(topic.len() as u16).await?;
    writer.write_all(topic.as_bytes()).await?;
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<(u8, String, Vec<u8>)> {
    let op = reader.read_u8().await?;
    let topic_len = reader.read_u16().await? as usize;
    if topic_len > MAX_TOPIC_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "topic too long"));
    }
    let mut topic = vec![0u8; topic_len];
    reader.read_exact(&mut topic).await?;
    let topic = String::from_utf8(topic)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "topic not utf-8"))?;

    let payload_len = reader.read_u32().await? as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "payload too long"));
    }
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;
    Ok((op, topic, payload))
}

/// Client side: one broker session subscribed to `subscribe`, publishing
/// every outbound payload on `publish`.
#[derive(Debug, Clone)]
pub struct PubSubConnector {
    pub broker: String,
    pub subscribe: String,
    pub publish: String,
}

impl PubSubConnector {
    pub fn new(broker: String, subscribe: String, publish: String) -> Self {
        Self {
            broker,
            subscribe,
            publish,
        }
    }
}

impl Connect for PubSubConnector {
    async fn connect(&self) -> Result<LinkChannels, LinkError> {
        let stream = TcpStream::connect(&self.broker).await?;
        let (mut reader, mut writer) = stream.into_split();
        write_frame(&mut writer, OP_SUBSCRIBE, &self.subscribe, &[]).await?;
        info!(
            broker = %self.broker,
            subscribe = %self.subscribe,
            publish = %self.publish,
            "broker session open"
        );

        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(LINK_QUEUE);
        let (ev_tx, ev_rx) = mpsc::channel::<LinkEvent>(LINK_QUEUE);

        let reader_events = ev_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_events.closed() => break,
                    frame = read_frame(&mut reader) => match frame {
                        Ok((OP_PUBLISH, _topic, payload)) => {
                            if reader_events
                                .send(LinkEvent::Data(payload))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok((op, _, _)) => {
                            let _ = reader_events
                                .send(LinkEvent::Fault(format!("unexpected opcode {op}")))
                                .await;
                            break;
                        }
                        Err(e) => {
                            let _ = reader_events
                                .send(LinkEvent::Fault(format!("broker read: {e}")))
                                .await;
                            break;
                        }
                    },
                }
            }
        });

        let publish_topic = self.publish.clone();
        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, OP_PUBLISH, &publish_topic, &bytes).await {
                    let _ = ev_tx
                        .send(LinkEvent::Fault(format!("broker write: {e}")))
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

type TopicMap = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<(String, Vec<u8>)>>>>>;

/// Minimal hub: fans every published payload out to the current
/// subscribers of its topic. Slow or dead subscribers lose messages
/// rather than stalling the publisher.
pub struct Broker {
    listener: TcpListener,
    topics: TopicMap,
}

impl Broker {
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            topics: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "broker listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            debug!(%peer, "client connected");
            let topics = Arc::clone(&self.topics);
            tokio::spawn(serve_client(stream, peer, topics));
        }
    }
}

async fn serve_client(stream: TcpStream, peer: SocketAddr, topics: TopicMap) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<(String, Vec<u8>)>(LINK_QUEUE);

    tokio::spawn(async move {
        while let Some((topic, payload)) = rx.recv().await {
            if write_frame(&mut writer, OP_PUBLISH, &topic, &payload)
                .await
                .is_err()
            {
                break;
            }
        }
    });

    loop {
        match read_frame(&mut reader).await {
            Ok((OP_SUBSCRIBE, topic, _)) => {
                debug!(%peer, %topic, "subscribe");
                topics
                    .lock()
                    .unwrap()
                    .entry(topic)
                    .or_default()
                    .push(tx.clone());
            }
            Ok((OP_PUBLISH, topic, payload)) => {
                let mut map = topics.lock().unwrap();
                if let Some(subscribers) = map.get_mut(&topic) {
                    subscribers.retain(|sub| !sub.is_closed());
                    for sub in subscribers.iter() {
                        // Full queue: drop for that subscriber.
                        let _ = sub.try_send((topic.clone(), payload.clone()));
                    }
                    // A topic with no live subscribers left is forgotten.
                    if subscribers.is_empty() {
                        map.remove(&topic);
                    }
                }
            }
            Ok((op, _, _)) => {
                warn!(%peer, op, "unexpected opcode, dropping client");
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!(%peer, "client disconnected");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "client read error");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    async fn start_broker() -> SocketAddr {
        let broker = Broker::bind("127.0.0.1:0").await.unwrap();
        let addr = broker.local_addr().unwrap();
        tokio::spawn(broker.run());
        addr
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let addr = start_broker().await;

        let uplink = PubSubConnector::new(addr.to_string(), "to-thing".into(), "from-thing".into());
        let downlink =
            PubSubConnector::new(addr.to_string(), "from-thing".into(), "to-thing".into());

        let up = uplink.connect().await.unwrap();
        let mut down = downlink.connect().await.unwrap();

        // Give the broker a moment to register the subscription.
        tokio::time::sleep(Duration::from_millis(50)).await;

        up.outbound.send(vec![1, 2, 3]).await.unwrap();
        match timeout(Duration::from_secs(5), down.events.recv())
            .await
            .expect("publish timed out")
            .unwrap()
        {
            LinkEvent::Data(bytes) => assert_eq!(bytes, vec![1, 2, 3]),
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let addr = start_broker().await;

        let publisher = PubSubConnector::new(addr.to_string(), "unused".into(), "a".into());
        let other = PubSubConnector::new(addr.to_string(), "b".into(), "unused".into());

        let p = publisher.connect().await.unwrap();
        let mut o = other.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        p.outbound.send(vec![9]).await.unwrap();
        assert!(
            timeout(Duration::from_millis(200), o.events.recv())
                .await
                .is_err(),
            "subscriber of another topic must not receive"
        );
    }

    #[tokio::test]
    async fn fan_out_to_multiple_subscribers() {
        let addr = start_broker().await;

        let publisher = PubSubConnector::new(addr.to_string(), "unused".into(), "t".into());
        let sub_a = PubSubConnector::new(addr.to_string(), "t".into(), "unused".into());
        let sub_b = PubSubConnector::new(addr.to_string(), "t".into(), "unused".into());

        let p = publisher.connect().await.unwrap();
        let mut a = sub_a.connect().await.unwrap();
        let mut b = sub_b.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        p.outbound.send(vec![7, 7]).await.unwrap();
        for sub in [&mut a, &mut b] {
            match timeout(Duration::from_secs(5), sub.events.recv())
                .await
                .expect("fan-out timed out")
                .unwrap()
            {
                LinkEvent::Data(bytes) => assert_eq!(bytes, vec![7, 7]),
                other => panic!("expected data, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn oversized_topic_is_rejected_on_write() {
        let mut sink = tokio::io::sink();
        let topic = "t".repeat(MAX_TOPIC_LEN + 1);
        let err = write_frame(&mut sink, OP_PUBLISH, &topic, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn dead_topics_are_pruned_on_publish() {
        let broker = Broker::bind("127.0.0.1:0").await.unwrap();
        let addr = broker.local_addr().unwrap();
        let topics = Arc::clone(&broker.topics);
        tokio::spawn(broker.run());

        let sub = PubSubConnector::new(addr.to_string(), "t".into(), "unused".into());
        let channels = sub.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(topics.lock().unwrap().contains_key("t"));
        drop(channels);

        let publisher = PubSubConnector::new(addr.to_string(), "other".into(), "t".into());
        let p = publisher.connect().await.unwrap();

        // The dead subscriber surfaces over a few publishes: the first may
        // still land in the OS buffer before the write side fails.
        let mut pruned = false;
        for _ in 0..50 {
            p.outbound.send(vec![1]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !topics.lock().unwrap().contains_key("t") {
                pruned = true;
                break;
            }
        }
        assert!(pruned, "topic with no live subscribers should be removed");
    }

    #[tokio::test]
    async fn broker_eof_faults_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept, swallow the subscribe, then hang up.
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = stream.read(&mut buf).await;
            drop(stream);
        });

        let connector = PubSubConnector::new(addr.to_string(), "t".into(), "t".into());
        let mut channels = connector.connect().await.unwrap();
        match timeout(Duration::from_secs(5), channels.events.recv())
            .await
            .expect("fault timed out")
            .unwrap()
        {
            LinkEvent::Fault(reason) => assert!(reason.contains("broker read")),
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_refused_is_an_error() {
        // Bind-and-release to get a port nothing listens on.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let connector = PubSubConnector::new(addr.to_string(), "t".into(), "t".into());
        assert!(connector.connect().await.is_err());
    }
}
