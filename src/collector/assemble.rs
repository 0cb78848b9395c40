use crate::collector::graph::{FolderPaths, ObjectGraph};
use crate::collector::query::MetricPlan;
use crate::collector::rollup::Rollup;
use crate::inventory::{EntityMetric, ManagedObjectRef, HOST_SYSTEM, VIRTUAL_MACHINE};
use crate::point::Point;
use crate::warn;

/// Joins the graph built for one pass with the series returned by the
/// performance queries of that pass.
pub struct Assembler<'a> {
    vcenter: String,
    domain: &'a str,
    graph: &'a ObjectGraph,
    plan: &'a MetricPlan,
    folders: FolderPaths,
    timestamp: i64,
}

/// Enrichment shared by every point of one entity.
struct Context {
    object_type: String,
    object_name: String,
    datastore: Vec<String>,
    esxi: String,
    cluster: String,
    network: Vec<String>,
    resource_pool: String,
    folder: String,
    vitags: Vec<String>,
    num_cpu: i32,
    memory_size_mb: i32,
}

fn strip_domain(name: &str, domain: &str) -> String {
    if domain.is_empty() {
        name.to_string()
    } else {
        name.replace(domain, "")
    }
}

impl<'a> Assembler<'a> {
    pub fn new(
        vcenter: &str,
        domain: &'a str,
        graph: &'a ObjectGraph,
        plan: &'a MetricPlan,
        timestamp: i64,
    ) -> Self {
        Self {
            vcenter: strip_domain(vcenter, domain),
            domain,
            graph,
            plan,
            folders: FolderPaths::default(),
            timestamp,
        }
    }

    fn context(&mut self, obj: &ManagedObjectRef) -> Context {
        let graph = self.graph;

        let esxi = if obj.is(VIRTUAL_MACHINE) {
            graph
                .host_of(obj)
                .and_then(|host| graph.name(host))
                .map(|name| strip_domain(name, self.domain).to_lowercase())
                .unwrap_or_default()
        } else {
            String::new()
        };

        let cluster = if obj.is(VIRTUAL_MACHINE) || obj.is(HOST_SYSTEM) {
            graph.cluster_of(&self.vcenter, obj).unwrap_or_default().to_string()
        } else {
            String::new()
        };

        Context {
            object_type: obj.kind.to_lowercase(),
            object_name: strip_domain(graph.name(obj).unwrap_or_default(), self.domain)
                .to_lowercase(),
            datastore: graph.datastores(obj),
            esxi,
            cluster,
            network: graph.networks(obj),
            resource_pool: graph.resource_pool(obj).to_string(),
            folder: self.folders.get(&self.vcenter, graph, obj).to_string(),
            vitags: graph.tags(obj),
            num_cpu: graph.num_cpu(obj),
            memory_size_mb: graph.memory_mb(obj),
        }
    }

    /// One point per series of `metric`. Series whose counter is not part of
    /// the plan are skipped.
    pub fn assemble(&mut self, metric: &EntityMetric) -> Vec<Point> {
        let context = self.context(&metric.entity);

        metric
            .series
            .iter()
            .filter_map(|series| {
                let Some(name) = self.plan.name(series.id.counter_id) else {
                    warn!(
                        vcenter = %self.vcenter,
                        object = %metric.entity,
                        "series returned for unrequested counter {}",
                        series.id.counter_id
                    );
                    return None;
                };

                let name = name.to_lowercase();
                let mut parts = name.splitn(3, '.');
                let group = parts.next().unwrap_or_default().to_string();
                let counter = parts.next().unwrap_or_default().to_string();
                let rollup = parts.next().unwrap_or_default().to_string();

                Some(Point {
                    vcenter: self.vcenter.clone(),
                    object_type: context.object_type.clone(),
                    object_name: context.object_name.clone(),
                    value: Rollup::from_metric(&name).aggregate(&series.values),
                    group,
                    counter,
                    rollup,
                    instance: series.id.instance.clone(),
                    datastore: context.datastore.clone(),
                    esxi: context.esxi.clone(),
                    cluster: context.cluster.clone(),
                    network: context.network.clone(),
                    resource_pool: context.resource_pool.clone(),
                    folder: context.folder.clone(),
                    vitags: context.vitags.clone(),
                    num_cpu: context.num_cpu,
                    memory_size_mb: context.memory_size_mb,
                    timestamp: self.timestamp,
                })
            })
            .collect()
    }
}
