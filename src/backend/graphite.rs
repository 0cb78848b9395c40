use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::{Backend, BackendError};
use crate::config;
use crate::point::Point;
use crate::{debug, error, info, warn};

/// Carbon plaintext protocol over a persistent TCP connection.
#[derive(Default)]
pub struct Graphite {
    address: String,
    prefix: String,
    stream: Option<TcpStream>,
}

/// `prefix.vcenter.type.name.group.counter.rollup[.instance]`
fn path(prefix: &str, point: &Point) -> String {
    let mut path = format!(
        "{prefix}.{}.{}.{}.{}.{}.{}",
        point.vcenter, point.object_type, point.object_name, point.group, point.counter, point.rollup
    );

    if !point.instance.is_empty() {
        path.push('.');
        path.push_str(&point.instance.to_lowercase().replace('.', "_"));
    }

    path
}

fn render(prefix: &str, points: &[Point]) -> String {
    let mut body = String::new();
    for point in points {
        body.push_str(&format!(
            "{} {} {}\n",
            path(prefix, point),
            point.value,
            point.timestamp
        ));
    }
    body
}

impl Graphite {
    async fn connect(&mut self) -> Result<(), BackendError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| BackendError::Connect {
                address: self.address.clone(),
                source,
            })?;

        self.stream = Some(stream);

        Ok(())
    }
}

#[async_trait]
impl Backend for Graphite {
    fn name(&self) -> &'static str {
        "graphite"
    }

    async fn initialize(&mut self, config: &config::Backend) -> Result<(), BackendError> {
        info!("initializing graphite backend");

        self.address = format!("{}:{}", config.hostname(), config.port());
        self.prefix = config.prefix().to_string();

        if let Err(e) = self.connect().await {
            error!("error connecting to graphite: {e}");
            return Err(e);
        }

        Ok(())
    }

    async fn send_batch(&mut self, points: &[Point]) -> Result<(), BackendError> {
        if self.address.is_empty() {
            return Err(BackendError::NotInitialized);
        }

        if points.is_empty() {
            return Ok(());
        }

        let body = render(&self.prefix, points);

        if self.stream.is_none() {
            self.connect().await?;
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(BackendError::NotInitialized);
        };

        let result = match stream.write_all(body.as_bytes()).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("error sending metrics, trying to reconnect: {e}");
            self.stream = None;
            if let Err(e) = self.connect().await {
                error!("could not connect to graphite: {e}");
            }
            return Err(BackendError::Io(e));
        }

        debug!(points = points.len(), "sent batch to graphite");

        Ok(())
    }

    async fn disconnect(&mut self) {
        info!("disconnecting from graphite");

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                error!("error disconnecting from graphite: {e}");
            }
        }
    }
}
