use std::time::Duration;

use tokio::sync::{mpsc, OnceCell};

use crate::collector::assemble::Assembler;
use crate::collector::graph::ObjectGraph;
use crate::collector::query::{MetricPlan, Window};
use crate::config::{General, Metric, VCenter};
use crate::inventory::*;
use crate::point::Point;
use crate::{debug, error, info, warn};

/// One vCenter to poll, with the metrics configured for it.
///
/// The metric plan is resolved against the vCenter's counter catalogue the
/// first time a session succeeds and reused by every later pass. Everything
/// else a pass learns about the inventory is dropped when the pass ends.
pub struct Source {
    config: VCenter,
    metrics: Vec<Metric>,
    interval: Duration,
    domain: String,
    plan: OnceCell<MetricPlan>,
}

/// What a single pass did, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    pub objects: usize,
    pub queries: usize,
    pub results: usize,
    pub values: usize,
    pub points: usize,
    pub missing: usize,
}

impl Source {
    pub fn new(config: VCenter, general: &General, metrics: &[Metric]) -> Self {
        Self {
            config,
            metrics: metrics.to_vec(),
            interval: general.interval(),
            domain: general.domain().to_string(),
            plan: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.config.hostname()
    }

    /// Resolve the metric plan ahead of the first pass.
    pub async fn init(&self, connector: &dyn Connector) -> Result<(), InventoryError> {
        let session = connector.connect(&self.config).await?;

        let result = self.plan(session.as_ref()).await.map(|plan| {
            info!(
                vcenter = self.name(),
                groups = plan.groups().len(),
                "resolved metric definitions"
            );
        });

        self.logout(session.as_ref()).await;

        result
    }

    async fn plan(&self, session: &dyn Session) -> Result<&MetricPlan, InventoryError> {
        self.plan
            .get_or_try_init(|| async {
                let catalogue = session.counter_catalogue().await?;
                Ok(MetricPlan::resolve(self.name(), &self.metrics, &catalogue))
            })
            .await
    }

    async fn logout(&self, session: &dyn Session) {
        if let Err(e) = session.logout().await {
            error!(vcenter = self.name(), "error logging out: {e}");
        }
    }

    /// Run one collection pass, sending every assembled point to `tx`.
    /// `now` is the pass start in unix seconds.
    pub async fn run_pass(
        &self,
        connector: &dyn Connector,
        tx: &mpsc::Sender<Point>,
        now: i64,
    ) -> Result<PassStats, InventoryError> {
        debug!(vcenter = self.name(), username = self.config.username(), "connecting");

        let session = connector.connect(&self.config).await?;

        let result = self.collect(session.as_ref(), tx, now).await;

        self.logout(session.as_ref()).await;

        result
    }

    async fn collect(
        &self,
        session: &dyn Session,
        tx: &mpsc::Sender<Point>,
        now: i64,
    ) -> Result<PassStats, InventoryError> {
        let name = self.name();
        let mut stats = PassStats::default();

        let plan = self.plan(session).await?;
        let types = plan.object_types();

        // the object list only lives for this pass
        let mut objects = Vec::new();
        for datacenter in session.datacenters().await? {
            match session.container_view(&datacenter, &types).await {
                Ok(found) => objects.extend(found),
                Err(e) => {
                    error!(vcenter = name, object = %datacenter, "could not create container view: {e}");
                }
            }
        }

        if objects.is_empty() {
            error!(vcenter = name, "no objects found in any datacenter");
            return Ok(stats);
        }
        stats.objects = objects.len();

        let records = session.retrieve_properties(&objects, PROPERTY_SPECS).await?;
        let graph = ObjectGraph::build(name, records);

        let window = Window::ending_at(now, self.interval);
        let queries = plan.queries(&objects, window);

        if queries.is_empty() {
            info!(vcenter = name, "no queries created");
            return Ok(stats);
        }

        stats.queries = queries.len();
        info!(
            vcenter = name,
            queries = queries.len(),
            metrics = queries.iter().map(|q| q.metric_ids.len()).sum::<usize>(),
            "issuing performance queries"
        );

        let results = session.query_perf(&queries).await?;

        if results.is_empty() {
            error!(vcenter = name, "no result returned by queries");
        }

        let mut assembler = Assembler::new(name, &self.domain, &graph, plan, window.end);

        for metric in &results {
            stats.results += 1;

            if metric.series.is_empty() {
                warn!(vcenter = name, object = %metric.entity, "no values returned in query");
            }
            stats.values += metric.series.len();

            for point in assembler.assemble(metric) {
                if !point.has_value() {
                    stats.missing += 1;
                }

                if tx.send(point).await.is_err() {
                    debug!(vcenter = name, "dispatch stopped, abandoning pass");
                    return Ok(stats);
                }

                stats.points += 1;
            }
        }

        info!(
            vcenter = name,
            results = stats.results,
            values = stats.values,
            points = stats.points,
            without_value = stats.missing,
            "collection pass complete"
        );

        Ok(stats)
    }
}
