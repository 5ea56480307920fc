//! Accept loop: owns the listener, the registry, and server shutdown.

use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::session;
use castrel_core::{RelayError, RelayResult};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// The castrel relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a server instance with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(config.max_clients));
        Self {
            config,
            registry,
            shutdown_tx: broadcast::channel(1).0,
        }
    }

    /// Bind the listening socket. Failure here is fatal to the server.
    pub async fn bind(&self) -> RelayResult<TcpListener> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Transport(format!("bind {addr} failed: {e}")))?;
        info!(addr = %listener.local_addr()?, max_clients = self.config.max_clients, "castrel-server listening");
        Ok(listener)
    }

    /// Accept connections until `shutdown` completes, then close the accept
    /// point and tear down every still-registered session.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> RelayResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        sessions.spawn(session::run(
                            stream,
                            peer_addr,
                            self.registry.clone(),
                            self.shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },

                // Reap finished session tasks so the set does not grow
                // unbounded over the server's lifetime.
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        // Close the accept point first, then wake every session loop so each
        // removes itself and drops its transport.
        drop(listener);
        let _ = self.shutdown_tx.send(());
        while sessions.join_next().await.is_some() {}
        info!("all sessions drained");

        Ok(())
    }

    /// Accept connections until ctrl-c or SIGTERM.
    pub async fn run_until_signal(self, listener: TcpListener) -> RelayResult<()> {
        self.run_until(listener, shutdown_signal()).await
    }
}

/// Wait for SIGTERM or ctrl-c.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
        info!("received shutdown signal");
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
