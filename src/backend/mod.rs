//! Metrics backends points are shipped to.
//!
//! The dispatch loop only sees the [`Backend`] trait. One implementation
//! exists per [`BackendKind`], created by [`for_kind`].

use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::CONTENT_ENCODING;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::config::{self, BackendKind};
use crate::point::Point;

mod graphite;
mod influxdb;
pub mod lineproto;
mod thininflux;

pub use graphite::Graphite;
pub use influxdb::InfluxDb;
pub use thininflux::ThinInfluxDb;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend is not initialized")]
    NotInitialized,
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("compression failed: {0}")]
    Compression(std::io::Error),
    #[error("unacceptable request: {0}")]
    Unacceptable(String),
    #[error("unauthorized access: check credentials and db")]
    Unauthorized,
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    #[error("server busy: {0}")]
    ServerBusy(String),
    #[error("unexpected status {status}: {body}")]
    Unexpected { status: u16, body: String },
}

/// A connection to one metrics backend.
///
/// Only the dispatch loop calls into a backend, so calls never overlap.
#[async_trait]
pub trait Backend: Send {
    fn name(&self) -> &'static str;

    /// Set up the connection or client from the backend settings.
    async fn initialize(&mut self, config: &config::Backend) -> Result<(), BackendError>;

    /// Deliver one batch. A failed batch is not retried by the caller.
    async fn send_batch(&mut self, points: &[Point]) -> Result<(), BackendError>;

    async fn disconnect(&mut self);
}

pub fn for_kind(kind: BackendKind) -> Box<dyn Backend> {
    match kind {
        BackendKind::Graphite => Box::new(Graphite::default()),
        BackendKind::InfluxDb => Box::new(InfluxDb::default()),
        BackendKind::ThinInfluxDb => Box::new(ThinInfluxDb::default()),
    }
}

/// Build and initialize the backend selected in `config`.
pub async fn connect(config: &config::Backend) -> Result<Box<dyn Backend>, BackendError> {
    let mut backend = for_kind(config.kind());
    backend.initialize(config).await?;
    Ok(backend)
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "Error")]
    error: String,
}

/// Decodes the body of a failed InfluxDB write. The body may be gzipped and
/// is expected to be `{"error": "..."}`; anything else is returned as text.
fn decode_error(body: &[u8], gzipped: bool) -> String {
    let mut decoded = Vec::new();
    let body = if gzipped && GzDecoder::new(body).read_to_end(&mut decoded).is_ok() {
        &decoded[..]
    } else {
        body
    };

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

async fn error_message(response: Response) -> Result<String, BackendError> {
    let gzipped = response
        .headers()
        .get(CONTENT_ENCODING)
        .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"));
    let body = response.bytes().await?;

    Ok(decode_error(&body, gzipped))
}

/// Maps the status of an InfluxDB write to its outcome.
fn classify(status: StatusCode, message: String) -> Result<(), BackendError> {
    match status {
        StatusCode::NO_CONTENT => Ok(()),
        StatusCode::BAD_REQUEST => Err(BackendError::Unacceptable(message)),
        StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
        StatusCode::NOT_FOUND => Err(BackendError::DatabaseNotFound(message)),
        StatusCode::INTERNAL_SERVER_ERROR => Err(BackendError::ServerBusy(message)),
        status => Err(BackendError::Unexpected {
            status: status.as_u16(),
            body: message,
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_are_decoded() {
        assert_eq!(decode_error(b"  gateway exploded\n", false), "gateway exploded");
        assert_eq!(decode_error(br#"{"error":"timeout"}"#, false), "timeout");
        assert_eq!(decode_error(br#"{"Error":"timeout"}"#, true), "timeout");
    }

    #[test]
    fn statuses_are_classified() {
        assert!(classify(StatusCode::NO_CONTENT, String::new()).is_ok());
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, String::new()),
            Err(BackendError::Unauthorized)
        ));
        assert!(matches!(
            classify(StatusCode::OK, String::new()),
            Err(BackendError::Unexpected { status: 200, .. })
        ));
    }

    #[test]
    fn factory_matches_kind() {
        assert_eq!(for_kind(BackendKind::Graphite).name(), "graphite");
        assert_eq!(for_kind(BackendKind::InfluxDb).name(), "influxdb");
        assert_eq!(for_kind(BackendKind::ThinInfluxDb).name(), "thininfluxdb");
    }

    #[tokio::test]
    async fn sending_before_initialize_fails() {
        for kind in [
            BackendKind::Graphite,
            BackendKind::InfluxDb,
            BackendKind::ThinInfluxDb,
        ] {
            let mut backend = for_kind(kind);
            assert!(matches!(
                backend.send_batch(&[Point::default()]).await,
                Err(BackendError::NotInitialized)
            ));
        }
    }
}
