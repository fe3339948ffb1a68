use crate::metrics::registry::ExporterMetrics;
use crate::metrics::render::CONTENT_TYPE;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, Error)]
pub enum MetricsServerError {
    #[error("can't bind metrics listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Minimal pull endpoint serving `GET /metrics`.
pub struct MetricsServer {
    bind: String,
    metrics: Arc<ExporterMetrics>,
}

impl MetricsServer {
    pub fn new(bind: impl Into<String>, metrics: Arc<ExporterMetrics>) -> Self {
        Self {
            bind: bind.into(),
            metrics,
        }
    }

    pub async fn start(self) -> Result<MetricsServerHandle, MetricsServerError> {
        let listener =
            TcpListener::bind(&self.bind)
                .await
                .map_err(|source| MetricsServerError::Bind {
                    addr: self.bind.clone(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let metrics = self.metrics;

        tracing::info!(addr = %local_addr, "metrics listener started");

        let join = tokio::spawn(async move {
            let mut connections = JoinSet::new();

            loop {
                tokio::select! {
                    accept = listener.accept() => {
                        match accept {
                            Ok((socket, peer)) => {
                                let metrics = Arc::clone(&metrics);
                                connections.spawn(async move {
                                    if let Err(err) = handle_connection(socket, &metrics).await {
                                        tracing::debug!(error = %err, peer = %peer, "metrics connection failed");
                                    }
                                });
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "metrics listener accept failed");
                            }
                        }
                    }
                    // Reap finished connections so the set doesn't grow.
                    Some(_) = connections.join_next(), if !connections.is_empty() => {}
                    _ = shutdown_rx.changed() => break,
                }
            }

            // Stop accepting, then let in-flight scrapes finish.
            drop(listener);
            while connections.join_next().await.is_some() {}
        });

        Ok(MetricsServerHandle {
            join,
            local_addr,
            shutdown_tx,
        })
    }
}

pub struct MetricsServerHandle {
    join: JoinHandle<()>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
}

impl MetricsServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait up to `grace` for in-flight ones.
    ///
    /// Connections still open after the grace period are aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);

        let mut join = self.join;
        match tokio::time::timeout(grace, &mut join).await {
            Ok(_) => tracing::info!("metrics listener stopped"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "metrics listener did not drain in time, aborting"
                );
                join.abort();
            }
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    metrics: &ExporterMetrics,
) -> std::io::Result<()> {
    let mut buf = [0_u8; 8192];
    let read_len = socket.read(&mut buf).await?;
    if read_len == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..read_len]);
    let first_line = request.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let path = target.split_once('?').map_or(target, |(path, _)| path);

    let response = match (method, path) {
        ("GET", "/metrics") => {
            let body = metrics.render_prometheus();
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {CONTENT_TYPE}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
        }
        _ => {
            let body = "not found";
            format!(
                "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
        }
    };

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;

    Ok(())
}
