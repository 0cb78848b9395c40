//! Collection pipeline: scheduled passes over every vCenter feed a bounded
//! channel drained by a single dispatch loop.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::backend::Backend;
use crate::config::Config;
use crate::inventory::Connector;
use crate::{info, warn};

mod assemble;
mod dispatch;
mod graph;
mod pass;
mod query;
mod rollup;
mod scheduler;

use dispatch::Dispatcher;
use pass::Source;

/// Runs collection until `shutdown` fires. The backend must already be
/// initialized; it is disconnected after the final flush.
pub async fn run(
    config: &Config,
    connector: Arc<dyn Connector>,
    backend: Box<dyn Backend>,
    shutdown: watch::Receiver<bool>,
) {
    let general = config.general();

    // the channel is as deep as one batch
    let (tx, rx) = mpsc::channel(general.flush_size());

    let sources = config
        .vcenters()
        .iter()
        .map(|vcenter| Arc::new(Source::new(vcenter.clone(), general, config.metrics())))
        .collect::<Vec<_>>();

    for source in &sources {
        if let Err(e) = source.init(connector.as_ref()).await {
            warn!(
                vcenter = source.name(),
                "could not resolve metrics, retrying on the next pass: {e}"
            );
        }
    }

    info!(
        sources = sources.len(),
        interval = %humantime::format_duration(general.interval()),
        backend = backend.name(),
        "starting collection"
    );

    let scheduler = tokio::spawn(scheduler::schedule(
        sources,
        connector,
        general.interval(),
        tx,
        shutdown.clone(),
    ));

    Dispatcher::new(backend, general.flush_size())
        .run(rx, shutdown)
        .await;

    // passes in flight are not awaited
    scheduler.abort();
}
