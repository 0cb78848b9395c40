use super::*;
use serde::Deserializer;
use tracing::Level;

#[derive(Debug, Deserialize)]
pub struct Log {
    #[serde(deserialize_with = "level")]
    #[serde(default = "log_level")]
    level: Level,
}

impl Default for Log {
    fn default() -> Self {
        Self { level: log_level() }
    }
}

impl Log {
    pub fn level(&self) -> Level {
        self.level
    }
}

// accepts error, warn, info, debug or trace in any case
fn level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value
        .parse::<Level>()
        .map_err(|_| serde::de::Error::custom(format!("unknown log level: {value}")))
}

fn log_level() -> Level {
    Level::INFO
}
