use super::*;

#[derive(Debug, Deserialize)]
pub struct General {
    // how often every vcenter is polled
    #[serde(default = "interval")]
    interval: String,

    // suffix removed from vcenter, object and host names
    #[serde(default)]
    domain: String,

    // number of points buffered before a batch is sent to the backend
    #[serde(default = "flush_size")]
    flush_size: usize,
}

impl Default for General {
    fn default() -> Self {
        Self {
            interval: interval(),
            domain: String::new(),
            flush_size: flush_size(),
        }
    }
}

impl General {
    pub fn check(&self) -> Result<(), ConfigError> {
        let interval = self
            .interval
            .parse::<humantime::Duration>()
            .map_err(|e| ConfigError::invalid(format!("interval couldn't be parsed: {e}")))?;

        if *interval < MIN_INTERVAL {
            return Err(ConfigError::invalid(format!(
                "interval is too short. Minimum interval is: {}",
                humantime::format_duration(MIN_INTERVAL)
            )));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        self.interval
            .parse::<humantime::Duration>()
            .map(Into::into)
            .unwrap_or(MIN_INTERVAL)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn flush_size(&self) -> usize {
        if self.flush_size == 0 {
            flush_size()
        } else {
            self.flush_size
        }
    }
}
