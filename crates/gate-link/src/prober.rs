//! Rate-limited keep-alive probing.
//!
//! Invalid frames usually mean the autopilot lost sync or was plugged in
//! mid-stream. Each one notifies the prober, which emits at most one probe
//! frame per cooldown window: a burst of garbage produces a single nudge,
//! while an isolated invalid frame after a quiet period still probes
//! immediately.

use mav_codec::ProbeBuilder;
use tokio::time::{Duration, Instant};

pub struct KeepAliveProber {
    builder: ProbeBuilder,
    cooldown: Duration,
    last_probe: Option<Instant>,
}

impl KeepAliveProber {
    pub fn new(cooldown: Duration, target_system: u8, request_msg_id: u32) -> Self {
        Self {
            builder: ProbeBuilder::new(target_system, request_msg_id),
            cooldown,
            last_probe: None,
        }
    }

    /// Called once per invalid frame. Returns the probe wire bytes when the
    /// cooldown window has passed, `None` otherwise.
    pub fn notify_invalid(&mut self) -> Option<Vec<u8>> {
        let now = Instant::now();
        if let Some(last) = self.last_probe {
            if now.duration_since(last) < self.cooldown {
                return None;
            }
        }
        self.last_probe = Some(now);
        Some(self.builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn first_invalid_probes_immediately() {
        let mut prober = KeepAliveProber::new(Duration::from_secs(1), 1, 300);
        assert!(prober.notify_invalid().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_produces_one_probe_per_window() {
        let mut prober = KeepAliveProber::new(Duration::from_secs(1), 1, 300);
        assert!(prober.notify_invalid().is_some());
        for _ in 0..50 {
            advance(Duration::from_millis(10)).await;
            assert!(prober.notify_invalid().is_none());
        }
        advance(Duration::from_millis(600)).await;
        assert!(prober.notify_invalid().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_then_invalid_probes_again() {
        let mut prober = KeepAliveProber::new(Duration::from_millis(100), 1, 300);
        assert!(prober.notify_invalid().is_some());
        advance(Duration::from_secs(60)).await;
        assert!(prober.notify_invalid().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_of_window_is_exclusive() {
        let mut prober = KeepAliveProber::new(Duration::from_millis(100), 1, 300);
        assert!(prober.notify_invalid().is_some());
        advance(Duration::from_millis(99)).await;
        assert!(prober.notify_invalid().is_none());
        advance(Duration::from_millis(1)).await;
        assert!(prober.notify_invalid().is_some());
    }
}
