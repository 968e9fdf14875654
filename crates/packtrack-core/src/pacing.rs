//! Pacing between provider calls during a reconciliation pass.

use std::time::Duration;

use async_trait::async_trait;

/// Invoked by the engine between two shipments (never after the last one).
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pace(&self);
}

/// Sleep a fixed delay. Default one second keeps us under provider limits.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_secs(1))
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pace(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// No pacing at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pace(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_sleeps() {
        let t0 = Instant::now();
        FixedDelay(Duration::from_millis(1500)).pace().await;
        assert!(t0.elapsed() >= Duration::from_millis(1500));
    }
}
