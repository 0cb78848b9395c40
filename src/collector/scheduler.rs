use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::collector::pass::Source;
use crate::inventory::Connector;
use crate::point::Point;
use crate::{debug, error, info};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Starts one pass per source on every tick of `interval` until `shutdown`
/// fires. A pass still running from a previous tick is left alone, so passes
/// of a slow source may overlap.
pub async fn schedule(
    sources: Vec<Arc<Source>>,
    connector: Arc<dyn Connector>,
    interval: Duration,
    tx: mpsc::Sender<Point>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("scheduler stopping");
                return;
            }
            _ = ticker.tick() => {
                let now = unix_now();

                for source in &sources {
                    let source = source.clone();
                    let connector = connector.clone();
                    let tx = tx.clone();

                    tokio::spawn(async move {
                        match source.run_pass(connector.as_ref(), &tx, now).await {
                            Ok(stats) => debug!(vcenter = source.name(), ?stats, "pass finished"),
                            Err(e) => error!(vcenter = source.name(), "collection pass failed: {e}"),
                        }
                    });
                }

                info!(sources = sources.len(), "started collection passes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::pass::tests::{inventory, source};
    use crate::inventory::SnapshotConnector;

    #[tokio::test(start_paused = true)]
    async fn every_tick_starts_a_pass_per_source() {
        let connector: Arc<dyn Connector> = Arc::new(SnapshotConnector::fixed(inventory()));
        let sources = vec![Arc::new(source("")), Arc::new(source(""))];
        let (tx, mut rx) = mpsc::channel(16);
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn(schedule(
            sources,
            connector,
            Duration::from_secs(60),
            tx,
            shutdown,
        ));

        // first tick fires immediately
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        let start = tokio::time::Instant::now();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        stop.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_passes_keep_scheduler_running() {
        let connector: Arc<dyn Connector> = Arc::new(SnapshotConnector::new());
        let (tx, mut rx) = mpsc::channel(16);
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn(schedule(
            vec![Arc::new(source(""))],
            connector,
            Duration::from_secs(60),
            tx,
            shutdown,
        ));

        tokio::time::sleep(Duration::from_secs(150)).await;
        stop.send(true).unwrap();
        task.await.unwrap();

        // every pass failed to connect and nothing was sent
        assert!(rx.recv().await.is_none());
    }
}
