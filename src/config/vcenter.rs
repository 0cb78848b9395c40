use super::*;

/// Connection parameters for one vCenter.
#[derive(Clone, Debug, Deserialize)]
pub struct VCenter {
    hostname: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    // recorded inventory document served instead of a live session
    #[serde(default)]
    snapshot: Option<PathBuf>,
}

impl VCenter {
    #[cfg(test)]
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            username: String::new(),
            password: String::new(),
            snapshot: None,
        }
    }

    #[cfg(test)]
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    #[cfg(test)]
    pub fn with_snapshot(mut self, snapshot: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() {
            return Err(ConfigError::invalid("vcenter hostname is required"));
        }

        Ok(())
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn snapshot(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }
}
