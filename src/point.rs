/// Value carried by a point when the source returned no usable sample.
pub const NO_VALUE: i64 = -1;

/// One observation of one counter on one managed object, enriched with the
/// object's place in the inventory.
///
/// The series identity is the object (`vcenter`, `object_type`,
/// `object_name`), the counter key (`group`, `counter`, `rollup`) and the
/// `instance`. Points are never mutated after assembly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub vcenter: String,
    pub object_type: String,
    pub object_name: String,
    pub group: String,
    pub counter: String,
    pub rollup: String,
    pub instance: String,
    pub value: i64,
    pub datastore: Vec<String>,
    pub esxi: String,
    pub cluster: String,
    pub network: Vec<String>,
    pub resource_pool: String,
    pub folder: String,
    pub vitags: Vec<String>,
    pub num_cpu: i32,
    pub memory_size_mb: i32,
    /// Seconds since the unix epoch.
    pub timestamp: i64,
}

impl Point {
    /// The `group_counter_rollup` measurement name used by the line protocol
    /// backends.
    pub fn measurement(&self) -> String {
        format!("{}_{}_{}", self.group, self.counter, self.rollup)
    }

    pub fn has_value(&self) -> bool {
        self.value != NO_VALUE
    }
}
