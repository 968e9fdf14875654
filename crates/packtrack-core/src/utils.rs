use std::{future::Future, time::Duration};

use chrono::Utc;

use crate::{errors::Error, Result};

/// RFC3339 timestamp in UTC (for logs and API responses).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Bound an external call. Elapsed time becomes `Error::Timeout(what)`.
pub async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(r) => r,
        Err(_) => Err(Error::Timeout(what.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let r: Result<()> = with_timeout(Duration::from_millis(10), "store read", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(r, Err(Error::Timeout(w)) if w == "store read"));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let r = with_timeout(Duration::from_secs(1), "x", async { Ok(7) }).await;
        assert_eq!(r.unwrap(), 7);
    }
}
