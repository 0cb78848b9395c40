use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod backend;
mod general;
mod log;
mod metric;
mod vcenter;

pub use backend::{Backend, BackendKind};
pub use general::General;
pub use log::Log;
pub use metric::Metric;
#[cfg(test)]
pub use metric::MetricDefinition;
pub use vcenter::VCenter;

fn interval() -> String {
    "60s".into()
}

fn flush_size() -> usize {
    200
}

fn value_field() -> String {
    "Value".into()
}

fn prefix() -> String {
    "vsphere".into()
}

/// Sampling granularity of the realtime performance counters.
pub const MIN_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to open config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    general: General,
    #[serde(default)]
    log: Log,
    backend: Backend,
    #[serde(default, rename = "vcenter")]
    vcenters: Vec<VCenter>,
    #[serde(default, rename = "metric")]
    metrics: Vec<Metric>,
}

impl Config {
    /// Reads, parses and validates a config file. Backend settings found in
    /// the environment take precedence over the file.
    pub fn load(path: &dyn AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content)?;

        config.backend.apply_env(|name| std::env::var(name).ok());

        config.check()?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        self.general.check()?;
        self.backend.check()?;

        if self.vcenters.is_empty() {
            return Err(ConfigError::invalid("at least one [[vcenter]] is required"));
        }

        for vcenter in &self.vcenters {
            vcenter.check()?;
        }

        for metric in &self.metrics {
            metric.check()?;
        }

        Ok(())
    }

    pub fn general(&self) -> &General {
        &self.general
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn vcenters(&self) -> &[VCenter] {
        &self.vcenters
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE: &str = r#"
        [general]
        interval = "60s"
        domain = ".corp.local"

        [log]
        level = "debug"

        [backend]
        type = "ThinInfluxDB"
        hostname = "influx"
        port = 8086
        database = "vsphere"

        [[vcenter]]
        hostname = "vc1.corp.local"
        username = "reader"
        password = "secret"

        [[metric]]
        object_type = ["VirtualMachine", "HostSystem"]
        definition = [
            { metric = "cpu.usage.average", instances = "" },
            { metric = "net.bytesRx.average", instances = "*" },
        ]
    "#;

    #[test]
    fn parses_full_document() {
        let config = Config::parse(EXAMPLE).unwrap();
        config.check().unwrap();

        assert_eq!(config.general().interval(), Duration::from_secs(60));
        assert_eq!(config.general().domain(), ".corp.local");
        assert_eq!(config.general().flush_size(), 200);
        assert_eq!(config.log().level(), tracing::Level::DEBUG);
        assert_eq!(config.backend().kind(), BackendKind::ThinInfluxDb);
        assert_eq!(config.backend().value_field(), "Value");
        assert_eq!(config.vcenters().len(), 1);
        assert_eq!(config.metrics()[0].definitions().len(), 2);
        assert_eq!(
            config.metrics()[0].object_types(),
            &["VirtualMachine".to_string(), "HostSystem".to_string()]
        );
    }

    #[test]
    fn zero_flush_size_falls_back_to_default() {
        let content = EXAMPLE.replace("interval = \"60s\"", "interval = \"60s\"\nflush_size = 0");
        let config = Config::parse(&content).unwrap();
        assert_eq!(config.general().flush_size(), 200);
    }

    #[test]
    fn unknown_backend_kind_is_rejected() {
        let content = EXAMPLE.replace("ThinInfluxDB", "prometheus");
        assert!(matches!(
            Config::parse(&content),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_vcenter_is_rejected() {
        let content = EXAMPLE.replace("[[vcenter]]", "[unused]");
        let config = Config::parse(&content).unwrap();
        assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn short_interval_is_rejected() {
        let content = EXAMPLE.replace("\"60s\"", "\"5s\"");
        let config = Config::parse(&content).unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn malformed_metric_name_is_rejected() {
        let content = EXAMPLE.replace("cpu.usage.average", "cpu.usage");
        let config = Config::parse(&content).unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();

        let config = Config::load(&file.path()).unwrap();
        assert_eq!(config.vcenters()[0].hostname(), "vc1.corp.local");
    }

    #[test]
    fn load_reports_missing_file() {
        let result = Config::load(&"/nonexistent/vsphere-collector.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
