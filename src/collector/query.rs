use std::collections::HashMap;
use std::time::Duration;

use crate::config::Metric;
use crate::inventory::*;
use crate::warn;

/// A configured metric definition with its counter key resolved against the
/// source's catalogue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMetric {
    pub metric: String,
    pub instances: String,
    pub key: i32,
}

/// Every resolved metric collected for one object type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricGroup {
    object_type: String,
    metrics: Vec<ResolvedMetric>,
}

impl MetricGroup {
    fn new(object_type: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            metrics: Vec::new(),
        }
    }

    fn add(&mut self, metric: &ResolvedMetric) {
        if !self.metrics.iter().any(|m| m.key == metric.key) {
            self.metrics.push(metric.clone());
        }
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    #[cfg(test)]
    pub fn metrics(&self) -> &[ResolvedMetric] {
        &self.metrics
    }

    fn metric_ids(&self) -> Vec<PerfMetricId> {
        self.metrics
            .iter()
            .map(|m| PerfMetricId {
                counter_id: m.key,
                instance: m.instances.clone(),
            })
            .collect()
    }
}

/// The metric groups of one source plus the reverse mapping used to decode
/// returned series.
#[derive(Clone, Debug, Default)]
pub struct MetricPlan {
    groups: Vec<MetricGroup>,
    names: HashMap<i32, String>,
}

impl MetricPlan {
    /// Match every configured definition against `catalogue`. Definitions
    /// with no matching counter are dropped.
    pub fn resolve(vcenter: &str, metrics: &[Metric], catalogue: &[PerfCounterInfo]) -> Self {
        let keys = catalogue
            .iter()
            .map(|counter| (counter.dotted_name(), counter.key))
            .collect::<HashMap<_, _>>();

        let mut plan = Self::default();

        for metric in metrics {
            for definition in metric.definitions() {
                let Some(key) = keys.get(definition.metric()).copied() else {
                    warn!(
                        vcenter,
                        metric = definition.metric(),
                        "metric not found in counter catalogue, it will not be collected"
                    );
                    continue;
                };

                let resolved = ResolvedMetric {
                    metric: definition.metric().to_string(),
                    instances: definition.instances().to_string(),
                    key,
                };

                plan.names.insert(key, resolved.metric.clone());

                for object_type in metric.object_types() {
                    plan.group_mut(object_type).add(&resolved);
                }
            }
        }

        plan
    }

    fn group_mut(&mut self, object_type: &str) -> &mut MetricGroup {
        let index = match self.groups.iter().position(|g| g.object_type == object_type) {
            Some(index) => index,
            None => {
                self.groups.push(MetricGroup::new(object_type));
                self.groups.len() - 1
            }
        };

        &mut self.groups[index]
    }

    pub fn groups(&self) -> &[MetricGroup] {
        &self.groups
    }

    /// Dotted name of the counter with `key`.
    pub fn name(&self, key: i32) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    /// Object types a container view must return: the inventory types used
    /// for enrichment plus every type with metrics to collect.
    pub fn object_types(&self) -> Vec<&str> {
        let mut types = INVENTORY_TYPES.to_vec();
        for group in &self.groups {
            if !types.contains(&group.object_type()) {
                types.push(group.object_type());
            }
        }
        types
    }

    /// One query per object whose type has metrics, in enumeration order.
    pub fn queries(&self, objects: &[ManagedObjectRef], window: Window) -> Vec<PerfQuerySpec> {
        objects
            .iter()
            .filter_map(|obj| {
                let group = self.groups.iter().find(|g| obj.is(&g.object_type))?;
                let metric_ids = group.metric_ids();

                if metric_ids.is_empty() {
                    return None;
                }

                Some(PerfQuerySpec {
                    entity: obj.clone(),
                    start: window.start,
                    end: window.end,
                    metric_ids,
                    interval_id: REALTIME_INTERVAL_ID,
                })
            })
            .collect()
    }
}

/// Closed query window in unix seconds. Both ends sit one second in the past
/// so the server has finished aggregating the samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    pub fn ending_at(now: i64, interval: Duration) -> Self {
        let end = now - 1;
        Self {
            start: end - interval.as_secs() as i64,
            end,
        }
    }
}
