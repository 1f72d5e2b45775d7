use log::debug;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Minimum spacing between two outgoing requests
pub struct PoliteDelay {
    delay: Duration,
    jitter: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl PoliteDelay {
    pub fn new(delay: Duration, jitter: Duration) -> Self {
        Self {
            delay,
            jitter,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the delay since the previous request has elapsed, then mark a new request
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let deadline = previous + self.delay + self.random_jitter();
            if deadline > Instant::now() {
                debug!("Polite delay: sleeping {:?}", deadline - Instant::now());
                sleep_until(deadline).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn random_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let millis = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}
