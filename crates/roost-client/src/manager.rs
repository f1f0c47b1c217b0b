//! Supervising manager: spawns connection engines and binds each to a set
//! of external liveness tokens.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::Error;
use crate::types::{ConnectOptions, ServerSpec};

enum ManagerCommand {
    Start {
        servers: Option<Vec<ServerSpec>>,
        monitors: Vec<CancellationToken>,
        reply: oneshot::Sender<Result<Connection, Error>>,
    },
    End {
        id: Uuid,
        reason: String,
    },
    AddMonitors {
        id: Uuid,
        monitors: Vec<CancellationToken>,
    },
    MonitorTripped {
        id: Uuid,
    },
    Shutdown,
}

/// Cloneable handle to the manager task.
///
/// The manager is not on the data path: requests flow through the
/// `Connection` handles it returns.
#[derive(Clone)]
pub struct ConnectionManager {
    tx: mpsc::UnboundedSender<ManagerCommand>,
}

impl ConnectionManager {
    pub fn new(defaults: Vec<ServerSpec>) -> Self {
        Self::with_options(defaults, ConnectOptions::default())
    }

    pub fn with_options(
        defaults: Vec<ServerSpec>,
        options: ConnectOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(defaults, options, tx.clone(), rx));
        Self { tx }
    }

    /// Spawns an engine against `servers` (or the defaults) and registers a
    /// death-watch on every monitor token. A cancelled monitor ends the
    /// connection with reason `"essential process died"`.
    pub async fn start_connection(
        &self,
        servers: Option<Vec<ServerSpec>>,
        monitors: Vec<CancellationToken>,
    ) -> Result<Connection, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ManagerCommand::Start { servers, monitors, reply: reply_tx })
            .map_err(|_| Error::EngineGone)?;
        reply_rx.await.map_err(|_| Error::EngineGone)?
    }

    /// Terminates a tracked engine and forgets the association.
    pub fn end_connection(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) {
        let _ = self
            .tx
            .send(ManagerCommand::End { id, reason: reason.into() });
    }

    /// Installs additional death-watches attributed to a tracked engine.
    pub fn add_monitors(
        &self,
        id: Uuid,
        monitors: Vec<CancellationToken>,
    ) {
        let _ = self.tx.send(ManagerCommand::AddMonitors { id, monitors });
    }

    /// Stops the manager, terminating every tracked engine.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ManagerCommand::Shutdown);
    }
}

struct Tracked {
    conn: Connection,
    watchers: Vec<JoinHandle<()>>,
}

impl Tracked {
    fn stop(
        self,
        reason: &str,
    ) {
        self.conn.die(reason);
        for watcher in self.watchers {
            watcher.abort();
        }
    }
}

async fn run(
    defaults: Vec<ServerSpec>,
    options: ConnectOptions,
    tx: mpsc::UnboundedSender<ManagerCommand>,
    mut rx: mpsc::UnboundedReceiver<ManagerCommand>,
) {
    let mut connections: HashMap<Uuid, Tracked> = HashMap::new();
    info!(
        "connection manager started: default_servers={}",
        defaults.len()
    );

    while let Some(cmd) = rx.recv().await {
        match cmd {
            ManagerCommand::Start { servers, monitors, reply } => {
                let list = servers.unwrap_or_else(|| defaults.clone());
                match Connection::connect_with(&list, options.clone()).await {
                    Ok(conn) => {
                        let id = conn.id();
                        let watchers: Vec<JoinHandle<()>> = monitors
                            .into_iter()
                            .map(|token| spawn_monitor(id, token, tx.clone()))
                            .collect();
                        info!(
                            "connection started: id={id}, monitors={}",
                            watchers.len()
                        );
                        connections
                            .insert(id, Tracked { conn: conn.clone(), watchers });
                        let _ = reply.send(Ok(conn));
                    }
                    Err(err) => {
                        warn!("connection start failed: error={err}");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            ManagerCommand::End { id, reason } => {
                if let Some(tracked) = connections.remove(&id) {
                    info!("connection ended: id={id}, reason={reason}");
                    tracked.stop(&reason);
                }
            }
            ManagerCommand::AddMonitors { id, monitors } => {
                if let Some(tracked) = connections.get_mut(&id) {
                    for token in monitors {
                        tracked
                            .watchers
                            .push(spawn_monitor(id, token, tx.clone()));
                    }
                } else {
                    warn!("monitors for unknown connection ignored: id={id}");
                }
            }
            ManagerCommand::MonitorTripped { id } => {
                if let Some(tracked) = connections.remove(&id) {
                    warn!("monitored identity died: id={id}");
                    tracked.stop("essential process died");
                }
            }
            ManagerCommand::Shutdown => break,
        }
    }

    for (_, tracked) in connections.drain() {
        tracked.stop("manager shutdown");
    }
    info!("connection manager stopped");
}

fn spawn_monitor(
    id: Uuid,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<ManagerCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        token.cancelled().await;
        // must not block the manager loop; this is just a message send
        let _ = tx.send(ManagerCommand::MonitorTripped { id });
    })
}
