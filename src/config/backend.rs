use super::*;
use serde::Deserializer;

/// The kind of metrics backend points are shipped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Plaintext `path value timestamp` lines over a persistent socket.
    Graphite,
    /// Line protocol over HTTP, built as structured points.
    InfluxDb,
    /// Gzip-compressed line protocol over HTTP with retry on busy servers.
    ThinInfluxDb,
}

impl BackendKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "graphite" => Some(Self::Graphite),
            "influxdb" => Some(Self::InfluxDb),
            "thininfluxdb" => Some(Self::ThinInfluxDb),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graphite => "graphite",
            Self::InfluxDb => "influxdb",
            Self::ThinInfluxDb => "thininfluxdb",
        }
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::from_str(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("backend {value} unknown")))
    }
}

#[derive(Debug, Deserialize)]
pub struct Backend {
    #[serde(rename = "type")]
    kind: BackendKind,
    hostname: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    database: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default = "value_field")]
    value_field: String,
    // reduce array valued tags to their first element
    #[serde(default)]
    no_array: bool,
    #[serde(default)]
    encrypted: bool,
    #[serde(default = "prefix")]
    prefix: String,
}

impl Backend {
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() {
            return Err(ConfigError::invalid("backend hostname is required"));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid("backend port is required"));
        }

        match self.kind {
            BackendKind::Graphite => {}
            BackendKind::InfluxDb | BackendKind::ThinInfluxDb => {
                if self.database.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "{} backend requires a database",
                        self.kind.as_str()
                    )));
                }
            }
        }

        if self.kind == BackendKind::ThinInfluxDb && self.port < 1000 {
            return Err(ConfigError::invalid(
                "thininfluxdb backend port must be in the range 1000..=65535",
            ));
        }

        if self.value_field.is_empty() {
            return Err(ConfigError::invalid("backend value_field must not be empty"));
        }

        Ok(())
    }

    /// Overrides fields from `BACKEND_<FIELD>` variables. Values that fail to
    /// parse are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |field: &str| lookup(&format!("BACKEND_{field}")).filter(|v| !v.is_empty());

        if let Some(kind) = lookup("TYPE").and_then(|v| BackendKind::from_str(&v)) {
            self.kind = kind;
        }
        if let Some(hostname) = lookup("HOSTNAME") {
            self.hostname = hostname;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(database) = lookup("DATABASE") {
            self.database = database;
        }
        if let Some(username) = lookup("USERNAME") {
            self.username = username;
        }
        if let Some(password) = lookup("PASSWORD") {
            self.password = password;
        }
        if let Some(value_field) = lookup("VALUEFIELD") {
            self.value_field = value_field;
        }
        if let Some(prefix) = lookup("PREFIX") {
            self.prefix = prefix;
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn value_field(&self) -> &str {
        &self.value_field
    }

    pub fn no_array(&self) -> bool {
        self.no_array
    }

    pub fn encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Base URL of an HTTP backend, without path.
    pub fn base_url(&self) -> String {
        let scheme = if self.encrypted() { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.hostname, self.port)
    }
}

#[cfg(test)]
impl Backend {
    pub fn for_test(kind: BackendKind, hostname: &str, port: u16) -> Self {
        Self {
            kind,
            hostname: hostname.to_string(),
            port,
            database: "vsphere".to_string(),
            username: "writer".to_string(),
            password: "secret".to_string(),
            value_field: value_field(),
            no_array: false,
            encrypted: false,
            prefix: prefix(),
        }
    }
}
