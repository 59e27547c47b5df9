//! # Peernet Node
//!
//! Wiring and orchestration for one Peernet overlay node: socket I/O,
//! inbound dispatch, and the background tasks that keep the peer list,
//! DHT, and in-flight sequences alive (spec §9).
//!
//! [`PeernetNode`] owns the [`Backend`] and the lifecycle of its background
//! tasks; everything that actually decides what a packet means lives in
//! [`peernet_routing`] and is only wired together here.

pub mod backend;
pub mod block;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keystore;
pub mod tasks;

pub use backend::{Backend, NullStore};
pub use config::PeernetConfig;
pub use error::{NodeError, NodeResult};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use peernet_core::identity::NodeId;
use peernet_core::traits::{BlockSource, ValueStore};

/// A running (or not-yet-started) Peernet node: an [`Arc<Backend>`] plus the
/// lifecycle of its background tasks.
pub struct PeernetNode {
    backend: Arc<Backend>,
    started: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    task_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl PeernetNode {
    /// Bind sockets and load (or generate) the node identity. Does not yet
    /// start background tasks; call [`start`](Self::start) for that.
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub async fn new(config: PeernetConfig) -> NodeResult<Self> {
        let backend = Arc::new(Backend::new(config).await?);
        info!(node_id = %backend.local_node_id(), "node created");
        Ok(Self::from_backend(backend))
    }

    /// Bind sockets with application-supplied `BlockSource`/`ValueStore`
    /// collaborators instead of the no-op defaults.
    pub async fn with_collaborators(
        config: PeernetConfig,
        value_store: Arc<dyn ValueStore>,
        block_source: Arc<dyn BlockSource>,
    ) -> NodeResult<Self> {
        let backend = Arc::new(Backend::with_collaborators(config, value_store, block_source).await?);
        info!(node_id = %backend.local_node_id(), "node created");
        Ok(Self::from_backend(backend))
    }

    fn from_backend(backend: Arc<Backend>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            backend,
            started: AtomicBool::new(false),
            shutdown_tx,
            task_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Start the packet readers, auto-ping loop, and sequence sweeper.
    #[instrument(skip(self))]
    pub async fn start(&self) -> NodeResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }

        let handles = tasks::spawn_all(self.backend.clone(), &self.shutdown_tx);
        *self.task_handles.lock().unwrap() = handles;

        info!("node started");
        Ok(())
    }

    /// Signal every background task to stop and wait for them to finish.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> NodeResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(());
        let handles = std::mem::take(&mut *self.task_handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }

        info!("node stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn node_id(&self) -> NodeId {
        self.backend.local_node_id()
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}
