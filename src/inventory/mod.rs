//! The inventory and performance source a collection pass talks to.
//!
//! A [`Connector`] opens one [`Session`] per pass. The session exposes just
//! enough of the vSphere object model to enumerate managed objects, read their
//! properties and run counter queries over a time window.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::VCenter;

mod snapshot;

pub use snapshot::SnapshotConnector;
#[cfg(test)]
pub use snapshot::Snapshot;

pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
pub const HOST_SYSTEM: &str = "HostSystem";
pub const CLUSTER_COMPUTE_RESOURCE: &str = "ClusterComputeResource";
pub const COMPUTE_RESOURCE: &str = "ComputeResource";
pub const RESOURCE_POOL: &str = "ResourcePool";
pub const FOLDER: &str = "Folder";
pub const DATACENTER: &str = "Datacenter";

/// Object types every container view includes, whatever the metric groups.
pub const INVENTORY_TYPES: &[&str] = &[
    CLUSTER_COMPUTE_RESOURCE,
    "Datastore",
    HOST_SYSTEM,
    "DistributedVirtualPortgroup",
    "Network",
    RESOURCE_POOL,
    FOLDER,
];

/// Properties read for every object in scope.
pub const PROPERTY_SPECS: &[PropertySpec] = &[
    PropertySpec {
        kind: "ManagedEntity",
        paths: &["name", "parent", "tag"],
    },
    PropertySpec {
        kind: VIRTUAL_MACHINE,
        paths: &[
            "datastore",
            "network",
            "runtime.host",
            "summary.config.numCpu",
            "summary.config.memorySizeMB",
        ],
    },
    PropertySpec {
        kind: RESOURCE_POOL,
        paths: &["vm"],
    },
];

/// Sampling granularity of realtime counters, in seconds.
pub const REALTIME_INTERVAL_ID: i32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("could not connect to {host}: {reason}")]
    Connect { host: String, reason: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("{0}")]
    Unsupported(String),
}

/// Identifies one inventory object by type and opaque id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectRef {
    #[cfg(test)]
    pub fn new(kind: &str, value: &str) -> Self {
        Self {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
}

/// The shapes a property value can take.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Reference(ManagedObjectRef),
    References(Vec<ManagedObjectRef>),
    Tags(Vec<Tag>),
    Int32(i32),
}

impl PropertyValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Reference(_) => "reference",
            Self::References(_) => "list of references",
            Self::Tags(_) => "list of tags",
            Self::Int32(_) => "int32",
        }
    }
}

/// One property of one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub obj: ManagedObjectRef,
    pub name: String,
    pub value: PropertyValue,
}

impl PropertyRecord {
    pub fn new(obj: &ManagedObjectRef, name: &str, value: PropertyValue) -> Self {
        Self {
            obj: obj.clone(),
            name: name.to_string(),
            value,
        }
    }
}

/// Property paths to read for objects of `kind` ("ManagedEntity" applies to
/// every object).
#[derive(Clone, Copy, Debug)]
pub struct PropertySpec {
    pub kind: &'static str,
    pub paths: &'static [&'static str],
}

impl PropertySpec {
    pub fn applies_to(&self, obj: &ManagedObjectRef) -> bool {
        self.kind == "ManagedEntity" || obj.is(self.kind)
    }
}

/// One entry of the source's counter catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfCounterInfo {
    pub key: i32,
    pub group: String,
    pub name: String,
    pub rollup: String,
}

impl PerfCounterInfo {
    /// `group.counter.rollup`
    pub fn dotted_name(&self) -> String {
        format!("{}.{}.{}", self.group, self.name, self.rollup)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerfMetricId {
    pub counter_id: i32,
    #[serde(default)]
    pub instance: String,
}

/// A counter query for one entity over `[start, end]` (unix seconds).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerfQuerySpec {
    pub entity: ManagedObjectRef,
    pub start: i64,
    pub end: i64,
    pub metric_ids: Vec<PerfMetricId>,
    pub interval_id: i32,
}

/// Raw samples of one counter instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub id: PerfMetricId,
    pub values: Vec<i64>,
}

/// Every series returned for one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityMetric {
    pub entity: ManagedObjectRef,
    pub series: Vec<MetricSeries>,
}

/// An authenticated session with one vCenter.
#[async_trait]
pub trait Session: Send + Sync {
    /// Datacenters directly under the root folder.
    async fn datacenters(&self) -> Result<Vec<ManagedObjectRef>, InventoryError>;

    /// Every object of the given types found recursively under `container`.
    async fn container_view(
        &self,
        container: &ManagedObjectRef,
        types: &[&str],
    ) -> Result<Vec<ManagedObjectRef>, InventoryError>;

    async fn retrieve_properties(
        &self,
        objects: &[ManagedObjectRef],
        specs: &[PropertySpec],
    ) -> Result<Vec<PropertyRecord>, InventoryError>;

    async fn counter_catalogue(&self) -> Result<Vec<PerfCounterInfo>, InventoryError>;

    async fn query_perf(
        &self,
        queries: &[PerfQuerySpec],
    ) -> Result<Vec<EntityMetric>, InventoryError>;

    async fn logout(&self) -> Result<(), InventoryError>;
}

/// Opens sessions against the vCenters named in the configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, vcenter: &VCenter) -> Result<Box<dyn Session>, InventoryError>;
}
