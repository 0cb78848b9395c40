use super::*;

/// A set of counters collected for one or more object types.
#[derive(Clone, Debug, Deserialize)]
pub struct Metric {
    object_type: Vec<String>,
    #[serde(rename = "definition")]
    definitions: Vec<MetricDefinition>,
}

/// A counter named `group.counter.rollup` and the instances to query.
#[derive(Clone, Debug, Deserialize)]
pub struct MetricDefinition {
    metric: String,
    // empty for the aggregate instance, `*` for every instance
    #[serde(default)]
    instances: String,
}

impl Metric {
    #[cfg(test)]
    pub fn new(object_types: &[&str], definitions: Vec<MetricDefinition>) -> Self {
        Self {
            object_type: object_types.iter().map(|t| t.to_string()).collect(),
            definitions,
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.object_type.is_empty() {
            return Err(ConfigError::invalid("metric requires at least one object_type"));
        }

        for definition in &self.definitions {
            definition.check()?;
        }

        Ok(())
    }

    pub fn object_types(&self) -> &[String] {
        &self.object_type
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }
}

impl MetricDefinition {
    #[cfg(test)]
    pub fn new(metric: &str, instances: &str) -> Self {
        Self {
            metric: metric.to_string(),
            instances: instances.to_string(),
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        let parts = self.metric.split('.').collect::<Vec<_>>();

        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::invalid(format!(
                "metric {:?} is not of the form group.counter.rollup",
                self.metric
            )));
        }

        Ok(())
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn instances(&self) -> &str {
        &self.instances
    }
}
