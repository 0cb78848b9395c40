use super::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// A recorded inventory: objects with their properties, the counter catalogue
/// and the raw series the performance manager would return.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    datacenters: Vec<ManagedObjectRef>,
    #[serde(default)]
    objects: Vec<SnapshotObject>,
    #[serde(default)]
    counters: Vec<PerfCounterInfo>,
    #[serde(default)]
    series: Vec<SnapshotSeries>,
    // login accepted by the recorded vCenter, any login when absent
    #[serde(default)]
    credentials: Option<Credentials>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SnapshotObject {
    #[serde(rename = "ref")]
    obj: ManagedObjectRef,
    // datacenter whose container view includes this object
    datacenter: Option<ManagedObjectRef>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SnapshotSeries {
    entity: ManagedObjectRef,
    id: PerfMetricId,
    values: Vec<i64>,
}

impl Snapshot {
    pub async fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            InventoryError::Request(format!("unable to read snapshot {path:?}: {e}"))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            InventoryError::Request(format!("unable to decode snapshot {path:?}: {e}"))
        })
    }

    fn accepts(&self, vcenter: &VCenter) -> bool {
        self.credentials.as_ref().is_none_or(|c| {
            c.username == vcenter.username() && c.password == vcenter.password()
        })
    }
}

#[cfg(test)]
impl Snapshot {
    pub fn with_credentials(&mut self, username: &str, password: &str) -> &mut Self {
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn add_datacenter(&mut self, datacenter: &ManagedObjectRef) -> &mut Self {
        self.datacenters.push(datacenter.clone());
        self
    }

    pub fn add_object(
        &mut self,
        datacenter: Option<&ManagedObjectRef>,
        obj: &ManagedObjectRef,
        properties: Vec<(&str, PropertyValue)>,
    ) -> &mut Self {
        self.objects.push(SnapshotObject {
            obj: obj.clone(),
            datacenter: datacenter.cloned(),
            properties: properties
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        });
        self
    }

    pub fn add_counter(&mut self, key: i32, dotted_name: &str) -> &mut Self {
        let mut parts = dotted_name.splitn(3, '.');
        self.counters.push(PerfCounterInfo {
            key,
            group: parts.next().unwrap_or_default().to_string(),
            name: parts.next().unwrap_or_default().to_string(),
            rollup: parts.next().unwrap_or_default().to_string(),
        });
        self
    }

    pub fn add_series(
        &mut self,
        entity: &ManagedObjectRef,
        counter_id: i32,
        instance: &str,
        values: Vec<i64>,
    ) -> &mut Self {
        self.series.push(SnapshotSeries {
            entity: entity.clone(),
            id: PerfMetricId {
                counter_id,
                instance: instance.to_string(),
            },
            values,
        });
        self
    }
}

/// Serves sessions from snapshot documents.
///
/// Unless a fixed snapshot is supplied, each connect re-reads the file named
/// by the vCenter's `snapshot` setting.
#[derive(Default)]
pub struct SnapshotConnector {
    fixed: Option<Arc<Snapshot>>,
}

impl SnapshotConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the same in-memory snapshot for every vCenter.
    #[cfg(test)]
    pub fn fixed(snapshot: Snapshot) -> Self {
        Self {
            fixed: Some(Arc::new(snapshot)),
        }
    }
}

#[async_trait]
impl Connector for SnapshotConnector {
    async fn connect(&self, vcenter: &VCenter) -> Result<Box<dyn Session>, InventoryError> {
        let snapshot = match (&self.fixed, vcenter.snapshot()) {
            (Some(snapshot), _) => snapshot.clone(),
            (None, Some(path)) => {
                Arc::new(Snapshot::load(path).await.map_err(|e| InventoryError::Connect {
                    host: vcenter.hostname().to_string(),
                    reason: e.to_string(),
                })?)
            }
            (None, None) => {
                return Err(InventoryError::Unsupported(format!(
                    "no inventory snapshot configured for {}",
                    vcenter.hostname()
                )))
            }
        };

        if !snapshot.accepts(vcenter) {
            return Err(InventoryError::Connect {
                host: vcenter.hostname().to_string(),
                reason: format!("login failed for user {:?}", vcenter.username()),
            });
        }

        Ok(Box::new(SnapshotSession { snapshot }))
    }
}

struct SnapshotSession {
    snapshot: Arc<Snapshot>,
}

fn instance_matches(filter: &str, instance: &str) -> bool {
    filter == "*" || filter == instance
}

#[async_trait]
impl Session for SnapshotSession {
    async fn datacenters(&self) -> Result<Vec<ManagedObjectRef>, InventoryError> {
        Ok(self
            .snapshot
            .datacenters
            .iter()
            .filter(|dc| dc.is(DATACENTER))
            .cloned()
            .collect())
    }

    async fn container_view(
        &self,
        container: &ManagedObjectRef,
        types: &[&str],
    ) -> Result<Vec<ManagedObjectRef>, InventoryError> {
        Ok(self
            .snapshot
            .objects
            .iter()
            .filter(|o| o.datacenter.as_ref() == Some(container))
            .filter(|o| types.contains(&o.obj.kind.as_str()))
            .map(|o| o.obj.clone())
            .collect())
    }

    async fn retrieve_properties(
        &self,
        objects: &[ManagedObjectRef],
        specs: &[PropertySpec],
    ) -> Result<Vec<PropertyRecord>, InventoryError> {
        let mut records = Vec::new();

        for obj in objects {
            let Some(object) = self.snapshot.objects.iter().find(|o| &o.obj == obj) else {
                continue;
            };

            for (name, value) in &object.properties {
                let requested = specs
                    .iter()
                    .any(|spec| spec.applies_to(obj) && spec.paths.contains(&name.as_str()));

                if requested {
                    records.push(PropertyRecord::new(obj, name, value.clone()));
                }
            }
        }

        Ok(records)
    }

    async fn counter_catalogue(&self) -> Result<Vec<PerfCounterInfo>, InventoryError> {
        Ok(self.snapshot.counters.clone())
    }

    async fn query_perf(
        &self,
        queries: &[PerfQuerySpec],
    ) -> Result<Vec<EntityMetric>, InventoryError> {
        Ok(queries
            .iter()
            .map(|query| EntityMetric {
                entity: query.entity.clone(),
                series: self
                    .snapshot
                    .series
                    .iter()
                    .filter(|s| s.entity == query.entity)
                    .filter(|s| {
                        query.metric_ids.iter().any(|id| {
                            id.counter_id == s.id.counter_id
                                && instance_matches(&id.instance, &s.id.instance)
                        })
                    })
                    .map(|s| MetricSeries {
                        id: s.id.clone(),
                        values: s.values.clone(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn logout(&self) -> Result<(), InventoryError> {
        Ok(())
    }
}
