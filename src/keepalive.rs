//! Periodic self-ping so hosting platforms that idle quiet services keep
//! this one awake.
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{info, warn};

pub async fn run(client: Client, url: Url, interval: Duration) {
    info!(%url, interval_secs = interval.as_secs(), "keepalive started");
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately; skip it so the service has time to bind
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match client.get(url.clone()).send().await {
            Ok(res) => info!(status = %res.status(), "keepalive ping"),
            Err(err) => warn!(?err, "keepalive ping failed"),
        }
    }
}
