use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub udp_bind: String,
    pub udp_peer: String,
    pub broker: String,
    pub subscribe_topic: String,
    pub publish_topic: String,
    pub restart_backoff_ms: u64,
    pub probe_cooldown_ms: u64,
    pub target_system: u8,
    pub probe_msg_id: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            json_logs: false,
            metrics_addr: None,
            udp_bind: "0.0.0.0:14550".to_string(),
            udp_peer: "127.0.0.1:14555".to_string(),
            broker: "127.0.0.1:7600".to_string(),
            subscribe_topic: "to-thing".to_string(),
            publish_topic: "from-thing".to_string(),
            restart_backoff_ms: 1000,
            probe_cooldown_ms: 1000,
            target_system: 1,
            probe_msg_id: 300,
        }
    }
}

/// `--config` file shape; every field optional, flags override.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    udp_bind: Option<String>,
    udp_peer: Option<String>,
    broker: Option<String>,
    subscribe_topic: Option<String>,
    publish_topic: Option<String>,
    restart_backoff_ms: Option<u64>,
    probe_cooldown_ms: Option<u64>,
    target_system: Option<u8>,
    probe_msg_id: Option<u32>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();

        // The config file, when given, provides the baseline the flags
        // override, so it is applied first.
        let mut i = 1;
        while i < args.len() {
            if args[i] == "--config" && i + 1 < args.len() {
                cfg.apply_file(Path::new(&args[i + 1]));
            }
            i += 1;
        }

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" => {
                    // Already applied above.
                    i += 1;
                }
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--udp-bind" => {
                    if i + 1 < args.len() {
                        cfg.udp_bind = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--udp-peer" => {
                    if i + 1 < args.len() {
                        cfg.udp_peer = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--broker" => {
                    if i + 1 < args.len() {
                        cfg.broker = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--subscribe-topic" => {
                    if i + 1 < args.len() {
                        cfg.subscribe_topic = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--publish-topic" => {
                    if i + 1 < args.len() {
                        cfg.publish_topic = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--backoff-ms" => {
                    if i + 1 < args.len() {
                        cfg.restart_backoff_ms = args[i + 1].parse().unwrap_or(1000);
                        i += 1;
                    }
                }
                "--probe-cooldown-ms" => {
                    if i + 1 < args.len() {
                        cfg.probe_cooldown_ms = args[i + 1].parse().unwrap_or(1000);
                        i += 1;
                    }
                }
                "--sysid" => {
                    if i + 1 < args.len() {
                        cfg.target_system = args[i + 1].parse().unwrap_or(1);
                        i += 1;
                    }
                }
                "--probe-msg-id" => {
                    if i + 1 < args.len() {
                        cfg.probe_msg_id = args[i + 1].parse().unwrap_or(300);
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    fn apply_file(&mut self, path: &Path) {
        let text = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read config {}: {}", path.display(), e));
        let file: FileConfig = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("Failed to parse config {}: {}", path.display(), e));

        if let Some(v) = file.udp_bind {
            self.udp_bind = v;
        }
        if let Some(v) = file.udp_peer {
            self.udp_peer = v;
        }
        if let Some(v) = file.broker {
            self.broker = v;
        }
        if let Some(v) = file.subscribe_topic {
            self.subscribe_topic = v;
        }
        if let Some(v) = file.publish_topic {
            self.publish_topic = v;
        }
        if let Some(v) = file.restart_backoff_ms {
            self.restart_backoff_ms = v;
        }
        if let Some(v) = file.probe_cooldown_ms {
            self.probe_cooldown_ms = v;
        }
        if let Some(v) = file.target_system {
            self.target_system = v;
        }
        if let Some(v) = file.probe_msg_id {
            self.probe_msg_id = v;
        }
    }

    pub fn print_help() {
        println!(
            r#"mavgate - MAVLink <-> pub/sub telemetry bridge

USAGE:
    mavgate [OPTIONS]

OPTIONS:
    --config <PATH>           JSON config file; flags override its values
    --udp-bind <ADDR>         UDP bind address [default: 0.0.0.0:14550]
    --udp-peer <ADDR>         UDP peer (autopilot or GCS) [default: 127.0.0.1:14555]
    --broker <ADDR>           Pub/sub broker address [default: 127.0.0.1:7600]
    --subscribe-topic <NAME>  Topic to subscribe to [default: to-thing]
    --publish-topic <NAME>    Topic to publish frames on [default: from-thing]
    --backoff-ms <MS>         Restart delay after a session fault [default: 1000]
    --probe-cooldown-ms <MS>  Minimum spacing between keep-alive probes [default: 1000]
    --sysid <ID>              Target system id for probe frames [default: 1]
    --probe-msg-id <ID>       Message id the probe requests [default: 300]
    --json-logs               Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>     Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --run-seconds <SECS>      Run for a fixed duration then exit
    -h, --help                Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                  Set log filter (e.g., RUST_LOG=debug,mavgate=trace)

EXAMPLES:
    # Field bridge: autopilot UDP on one side, broker on the other
    mavgate --udp-peer 127.0.0.1:14555 --broker hub.example.net:7600 \
            --subscribe-topic to-thing --publish-topic from-thing

    # Hub bridge: same engine with the topics and peer swapped
    mavgate --udp-peer 127.0.0.1:14560 --broker 127.0.0.1:7600 \
            --subscribe-topic from-thing --publish-topic to-thing

    # Smoke run with metrics
    mavgate --run-seconds 10 --metrics-addr 0.0.0.0:9090
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("mavgate")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_without_flags() {
        let cfg = RuntimeConfig::from_args(&args(&[]));
        assert_eq!(cfg.udp_bind, "0.0.0.0:14550");
        assert_eq!(cfg.restart_backoff_ms, 1000);
        assert_eq!(cfg.target_system, 1);
        assert!(!cfg.show_help);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--udp-peer",
            "10.0.0.2:14555",
            "--broker",
            "hub:7600",
            "--subscribe-topic",
            "from-thing",
            "--publish-topic",
            "to-thing",
            "--backoff-ms",
            "250",
            "--sysid",
            "42",
            "--json-logs",
        ]));
        assert_eq!(cfg.udp_peer, "10.0.0.2:14555");
        assert_eq!(cfg.broker, "hub:7600");
        assert_eq!(cfg.subscribe_topic, "from-thing");
        assert_eq!(cfg.publish_topic, "to-thing");
        assert_eq!(cfg.restart_backoff_ms, 250);
        assert_eq!(cfg.target_system, 42);
        assert!(cfg.json_logs);
    }

    #[test]
    fn config_file_applies_and_flags_win() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"broker": "file-broker:7600", "restart_backoff_ms": 5000, "target_system": 9}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cfg = RuntimeConfig::from_args(&args(&["--config", &path, "--backoff-ms", "100"]));
        assert_eq!(cfg.broker, "file-broker:7600");
        assert_eq!(cfg.target_system, 9);
        // The flag beats the file.
        assert_eq!(cfg.restart_backoff_ms, 100);
    }

    #[test]
    #[should_panic(expected = "Failed to read config")]
    fn missing_config_file_panics() {
        RuntimeConfig::from_args(&args(&["--config", "/definitely/not/here.json"]));
    }

    #[test]
    fn help_flag_short_circuits() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--sysid", "5"]));
        assert!(cfg.show_help);
        assert_eq!(cfg.target_system, 1);
    }
}
