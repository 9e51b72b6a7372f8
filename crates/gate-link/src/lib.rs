pub mod endpoint;
pub mod engine;
pub mod metrics;
pub mod prober;
pub mod pubsub;
pub mod udp;

pub use endpoint::{Connect, Endpoint, EndpointState, LinkChannels, LinkError, LinkEvent, Role};
pub use engine::{BridgeConfig, BridgeEngine};
pub use metrics::{init_metrics, serve_metrics};
pub use prober::KeepAliveProber;
pub use pubsub::{Broker, PubSubConnector};
pub use udp::UdpConnector;
