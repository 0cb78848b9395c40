use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};

use crate::backend::Backend;
use crate::point::Point;
use crate::{debug, error, info};

/// How long a partial buffer may wait for more points before it is sent.
pub const IDLE_FLUSH: Duration = Duration::from_secs(5);

/// The single consumer of the point channel. Buffers points and hands them to
/// the backend in batches of at most `flush_size`.
pub struct Dispatcher {
    backend: Box<dyn Backend>,
    buffer: Vec<Point>,
    flush_size: usize,
}

impl Dispatcher {
    pub fn new(backend: Box<dyn Backend>, flush_size: usize) -> Self {
        Self {
            backend,
            buffer: Vec::with_capacity(flush_size),
            flush_size,
        }
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        debug!(
            backend = self.backend.name(),
            points = self.buffer.len(),
            "sending batch"
        );

        if let Err(e) = self.backend.send_batch(&self.buffer).await {
            error!(
                backend = self.backend.name(),
                points = self.buffer.len(),
                "error sending batch: {e}"
            );
        }

        // sent or not, the batch is released
        self.buffer.clear();
    }

    async fn push(&mut self, point: Point) {
        self.buffer.push(point);

        if self.buffer.len() >= self.flush_size {
            self.flush().await;
        }
    }

    /// Runs until `shutdown` fires or every sender is gone, then sends what
    /// is left and disconnects the backend.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Point>, mut shutdown: watch::Receiver<bool>) {
        let idle = sleep(IDLE_FLUSH);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("shutdown requested, sending remaining points");

                    // points already queued are part of the final flush
                    while let Ok(point) = rx.try_recv() {
                        self.push(point).await;
                    }

                    break;
                }
                point = rx.recv() => match point {
                    Some(point) => {
                        idle.as_mut().reset(Instant::now() + IDLE_FLUSH);
                        self.push(point).await;
                    }
                    None => break,
                },
                _ = &mut idle, if !self.buffer.is_empty() => {
                    debug!("no points for {IDLE_FLUSH:?}, flushing partial buffer");
                    self.flush().await;
                }
            }
        }

        self.flush().await;
        self.backend.disconnect().await;
    }
}
