use crate::{
    config::ListenerConfig,
    connection::{Pipeline, forward_stream},
    error::TransportError,
    sink::Sink,
};
use anomaly::Thresholds;
use log::{error, info, warn};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::oneshot, task::JoinSet};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP listener that forwards every producer connection to a sink.
pub struct Forwarder {
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    shutdown_grace: Duration,
}

impl Forwarder {
    /// Binds the configured address. A failure here is fatal for the service.
    pub async fn bind(
        config: &ListenerConfig,
        thresholds: Thresholds,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, TransportError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;

        Ok(Forwarder {
            listener,
            pipeline: Arc::new(Pipeline {
                framing: config.framing,
                thresholds: Arc::new(thresholds),
                sink,
                failure_backoff: config.failure_backoff(),
            }),
            shutdown_grace: config.shutdown_grace(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts producers until `shutdown` fires or its sender is dropped.
    ///
    /// Each connection is served on its own task, so a slow producer or sink
    /// never holds up the accept loop. Readings from one connection reach the
    /// sink in the order they were sent. After shutdown no new connections are
    /// accepted and open ones get the grace period to finish before they are
    /// aborted.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) -> Result<(), TransportError> {
        info!(
            "Listening for {} telemetry on {}",
            self.pipeline.framing,
            self.local_addr()?
        );

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        error!("Connection task failed: {}", e);
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("{}: client connected", peer);

                            let pipeline = self.pipeline.clone();
                            connections.spawn(async move {
                                let peer = peer.to_string();
                                let stats = forward_stream(stream, &peer, &pipeline).await;
                                info!("{}: session summary: {}", peer, stats);
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        drop(self.listener);
        drain(connections, self.shutdown_grace).await;

        Ok(())
    }
}

async fn drain(mut connections: JoinSet<()>, grace: Duration) {
    if connections.is_empty() {
        return;
    }

    info!(
        "Waiting up to {:?} for {} open connections",
        grace,
        connections.len()
    );

    let finished = tokio::time::timeout(grace, async {
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                error!("Connection task failed: {}", e);
            }
        }
    })
    .await;

    if finished.is_err() {
        warn!("Aborting {} connections still open", connections.len());
        connections.shutdown().await;
    }
}
