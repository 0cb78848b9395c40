//! Reverse lookups over the flat property records of one pass.
//!
//! vSphere exposes no parent path for an object, only a `parent` reference, so
//! folder and resource pool paths are derived by walking those references. A
//! graph is built fresh for every pass and never shared across vCenters.

use std::collections::HashMap;

use crate::inventory::*;
use crate::{debug, error, warn};

/// Name of the hidden root folder holding a datacenter's virtual machines.
const VM_ROOT_FOLDER: &str = "vm";

/// Name of the hidden root resource pool of every cluster or host.
const ROOT_RESOURCE_POOL: &str = "Resources";

/// Why a parent walk stopped before reaching its root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gap {
    MissingName(ManagedObjectRef),
    MissingParent(ManagedObjectRef),
    NotAFolder(ManagedObjectRef),
}

/// The path accumulated by a parent walk, most significant segment first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Walk {
    pub path: String,
    pub gap: Option<Gap>,
}

impl Walk {
    fn new(mut segments: Vec<String>, gap: Option<Gap>) -> Self {
        segments.reverse();
        Self {
            path: segments.join("/"),
            gap,
        }
    }
}

#[derive(Debug, Default)]
pub struct ObjectGraph {
    names: HashMap<ManagedObjectRef, String>,
    parents: HashMap<ManagedObjectRef, ManagedObjectRef>,
    datastores: HashMap<ManagedObjectRef, Vec<ManagedObjectRef>>,
    networks: HashMap<ManagedObjectRef, Vec<ManagedObjectRef>>,
    hosts: HashMap<ManagedObjectRef, ManagedObjectRef>,
    children: HashMap<ManagedObjectRef, Vec<ManagedObjectRef>>,
    tags: HashMap<ManagedObjectRef, Vec<String>>,
    num_cpu: HashMap<ManagedObjectRef, i32>,
    memory_mb: HashMap<ManagedObjectRef, i32>,
    // virtual machine to the path of the resource pool holding it
    pools: HashMap<ManagedObjectRef, String>,
}

fn mismatch(vcenter: &str, record: &PropertyRecord, expected: &str) {
    error!(
        vcenter,
        object = %record.obj,
        property = %record.name,
        "property was not a {expected}, it was a {}",
        record.value.kind_name()
    );
}

impl ObjectGraph {
    pub fn build(vcenter: &str, records: Vec<PropertyRecord>) -> Self {
        let mut graph = Self::default();

        for record in records {
            let obj = record.obj.clone();

            match (record.name.as_str(), record.value) {
                ("name", PropertyValue::String(name)) => {
                    graph.names.insert(obj, name);
                }
                ("parent", PropertyValue::Reference(parent)) => {
                    graph.parents.insert(obj, parent);
                }
                ("runtime.host", PropertyValue::Reference(host)) => {
                    graph.hosts.insert(obj, host);
                }
                ("datastore", PropertyValue::References(refs)) => {
                    if !refs.is_empty() {
                        graph.datastores.insert(obj, refs);
                    }
                }
                ("network", PropertyValue::References(refs)) => {
                    if !refs.is_empty() {
                        graph.networks.insert(obj, refs);
                    }
                }
                // containers without virtual machines carry nothing to resolve
                ("vm", PropertyValue::References(refs)) => {
                    if !refs.is_empty() {
                        graph.children.insert(obj, refs);
                    }
                }
                ("tag", PropertyValue::Tags(tags)) => {
                    if !tags.is_empty() {
                        graph
                            .tags
                            .insert(obj, tags.into_iter().map(|t| t.key).collect());
                    }
                }
                ("summary.config.numCpu", PropertyValue::Int32(count)) => {
                    graph.num_cpu.insert(obj, count);
                }
                ("summary.config.memorySizeMB", PropertyValue::Int32(size)) => {
                    graph.memory_mb.insert(obj, size);
                }
                (name, value) => {
                    let record = PropertyRecord {
                        obj,
                        name: name.to_string(),
                        value,
                    };
                    match name {
                        "name" => mismatch(vcenter, &record, "string"),
                        "parent" | "runtime.host" => mismatch(vcenter, &record, "reference"),
                        "datastore" | "network" | "vm" => {
                            mismatch(vcenter, &record, "list of references")
                        }
                        "tag" => mismatch(vcenter, &record, "list of tags"),
                        "summary.config.numCpu" | "summary.config.memorySizeMB" => {
                            mismatch(vcenter, &record, "int32")
                        }
                        _ => error!(
                            vcenter,
                            object = %record.obj,
                            property = %record.name,
                            "unhandled property of type {}",
                            record.value.kind_name()
                        ),
                    }
                }
            }
        }

        graph.resolve_pools(vcenter);

        graph
    }

    fn resolve_pools(&mut self, vcenter: &str) {
        let mut pools = HashMap::new();

        for (container, children) in &self.children {
            if !container.is(RESOURCE_POOL) {
                continue;
            }

            let walk = self.pool_path(container);

            match &walk.gap {
                Some(Gap::MissingName(pool)) => {
                    error!(vcenter, object = %pool, "could not find name for resource pool")
                }
                Some(Gap::MissingParent(pool)) => {
                    error!(vcenter, object = %pool, "could not find parent of resource pool")
                }
                _ => {}
            }

            for child in children.iter().filter(|c| c.is(VIRTUAL_MACHINE)) {
                pools.insert(child.clone(), walk.path.clone());
            }
        }

        self.pools = pools;
    }

    /// Walks up through parent resource pools, stopping below the root pool.
    pub fn pool_path(&self, pool: &ManagedObjectRef) -> Walk {
        let mut segments = Vec::new();
        let mut current = pool;

        loop {
            let Some(name) = self.names.get(current) else {
                return Walk::new(segments, Some(Gap::MissingName(current.clone())));
            };

            if name == ROOT_RESOURCE_POOL {
                return Walk::new(segments, None);
            }

            segments.push(name.clone());

            let Some(parent) = self.parents.get(current) else {
                return Walk::new(segments, Some(Gap::MissingParent(current.clone())));
            };

            if !parent.is(RESOURCE_POOL) {
                return Walk::new(segments, None);
            }

            current = parent;
        }
    }

    /// Walks up through parent folders, stopping below the hidden `vm` folder.
    /// Hosts live outside the virtual machine folder tree and have no path.
    pub fn folder_path(&self, obj: &ManagedObjectRef) -> Walk {
        let mut segments = Vec::new();

        if obj.is(HOST_SYSTEM) {
            return Walk::default();
        }

        let Some(mut current) = self.parents.get(obj) else {
            return Walk::default();
        };

        loop {
            if !current.is(FOLDER) {
                return Walk::new(segments, Some(Gap::NotAFolder(current.clone())));
            }

            let Some(name) = self.names.get(current) else {
                return Walk::new(segments, Some(Gap::MissingName(current.clone())));
            };

            if name == VM_ROOT_FOLDER {
                return Walk::new(segments, None);
            }

            segments.push(name.clone());

            match self.parents.get(current) {
                Some(parent) => current = parent,
                None => return Walk::new(segments, Some(Gap::MissingParent(current.clone()))),
            }
        }
    }

    /// The cluster a virtual machine (through its host) or a host belongs to.
    /// Standalone hosts have no cluster.
    pub fn cluster_of(&self, vcenter: &str, obj: &ManagedObjectRef) -> Option<&str> {
        let host = if obj.is(VIRTUAL_MACHINE) {
            self.hosts.get(obj)?
        } else if obj.is(HOST_SYSTEM) {
            obj
        } else {
            return None;
        };

        let parent = self.parents.get(host)?;

        if parent.is(CLUSTER_COMPUTE_RESOURCE) {
            self.name(parent)
        } else {
            if !parent.is(COMPUTE_RESOURCE) {
                warn!(vcenter, object = %host, "parent of host was {parent}");
            }
            None
        }
    }

    pub fn name(&self, obj: &ManagedObjectRef) -> Option<&str> {
        self.names.get(obj).map(String::as_str)
    }

    pub fn host_of(&self, vm: &ManagedObjectRef) -> Option<&ManagedObjectRef> {
        self.hosts.get(vm)
    }

    pub fn datastores(&self, obj: &ManagedObjectRef) -> Vec<String> {
        self.names_of(self.datastores.get(obj))
    }

    pub fn networks(&self, obj: &ManagedObjectRef) -> Vec<String> {
        self.names_of(self.networks.get(obj))
    }

    pub fn tags(&self, obj: &ManagedObjectRef) -> Vec<String> {
        self.tags.get(obj).cloned().unwrap_or_default()
    }

    pub fn resource_pool(&self, obj: &ManagedObjectRef) -> &str {
        self.pools.get(obj).map(String::as_str).unwrap_or_default()
    }

    pub fn num_cpu(&self, obj: &ManagedObjectRef) -> i32 {
        self.num_cpu.get(obj).copied().unwrap_or_default()
    }

    pub fn memory_mb(&self, obj: &ManagedObjectRef) -> i32 {
        self.memory_mb.get(obj).copied().unwrap_or_default()
    }

    fn names_of(&self, refs: Option<&Vec<ManagedObjectRef>>) -> Vec<String> {
        refs.into_iter()
            .flatten()
            .filter_map(|r| self.names.get(r).cloned())
            .collect()
    }
}

/// Folder paths computed during one pass, so each object is walked once no
/// matter how many counters it reports.
#[derive(Debug, Default)]
pub struct FolderPaths {
    paths: HashMap<ManagedObjectRef, String>,
}

impl FolderPaths {
    pub fn get(&mut self, vcenter: &str, graph: &ObjectGraph, obj: &ManagedObjectRef) -> &str {
        self.paths.entry(obj.clone()).or_insert_with(|| {
            let walk = graph.folder_path(obj);

            match &walk.gap {
                Some(Gap::NotAFolder(parent)) if parent.is(DATACENTER) => {}
                Some(Gap::NotAFolder(parent)) => {
                    debug!(vcenter, object = %obj, "folder walk stopped at {parent}")
                }
                Some(Gap::MissingName(folder)) => {
                    warn!(vcenter, object = %obj, "folder name not found for {folder}")
                }
                Some(Gap::MissingParent(folder)) => {
                    warn!(vcenter, object = %obj, "no parent found for folder {folder}")
                }
                None => {}
            }

            walk.path
        })
    }
}
