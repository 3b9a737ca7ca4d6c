//! Worker lifecycle host.
//!
//! Drives one worker version through `parsed → installing → installed
//! (waiting) → activating → activated`. Each phase awaits its handler before
//! the state advances. Activation holds the fetch gate for its whole duration
//! so no fetch is intercepted while stale generations are still being
//! deleted. A phase whose future is dropped rolls the state back.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use super::{ActivationReport, InstallOutcome, OfflineCacheManager, Served};
use crate::Error;
use crate::cache::CacheStorage;
use crate::network::Network;

/// Lifecycle events a worker reacts to.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn on_install(&self) -> InstallOutcome;

    async fn on_activate(&self) -> ActivationReport;

    /// Intercepted fetch, only dispatched once the worker is active.
    async fn on_fetch(&self, request: &Url) -> Result<Served, Error>;

    /// Fetch for a page this worker does not control yet.
    async fn on_uncontrolled_fetch(&self, request: &Url) -> Result<Served, Error>;
}

#[async_trait]
impl<S: CacheStorage, N: Network> LifecycleHandler for OfflineCacheManager<S, N> {
    async fn on_install(&self) -> InstallOutcome {
        self.install().await
    }

    async fn on_activate(&self) -> ActivationReport {
        self.activate().await
    }

    async fn on_fetch(&self, request: &Url) -> Result<Served, Error> {
        self.handle_fetch(request).await
    }

    async fn on_uncontrolled_fetch(&self, request: &Url) -> Result<Served, Error> {
        self.fetch_network(request).await
    }
}

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take control.
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        };
        f.write_str(name)
    }
}

/// Hosts one worker version and gates its phases.
///
/// The state lives behind a plain mutex that is never held across an await.
/// `gate` is held for writing for the whole activation phase and for reading
/// by every fetch. Installs do not take it.
pub struct WorkerHost<H> {
    handler: H,
    state: Mutex<WorkerState>,
    gate: RwLock<()>,
}

fn lock(state: &Mutex<WorkerState>) -> MutexGuard<'_, WorkerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-flight phase. Dropped before `finish`, it puts the state back to
/// where the phase started, so a cancelled install or activation can be
/// retried.
struct Phase<'a> {
    state: &'a Mutex<WorkerState>,
    rollback: Option<WorkerState>,
}

impl Phase<'_> {
    fn finish(mut self, next: WorkerState) {
        self.rollback = None;
        *lock(self.state) = next;
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.rollback.take() {
            let mut state = lock(self.state);
            let cancelled = *state;
            tracing::warn!(from = %cancelled, to = %previous, "Lifecycle phase cancelled; state restored");
            *state = previous;
        }
    }
}

impl<H: LifecycleHandler> WorkerHost<H> {
    pub fn new(handler: H) -> Self {
        Self { handler, state: Mutex::new(WorkerState::Parsed), gate: RwLock::new(()) }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    fn begin(&self, action: &str, allowed: &[WorkerState], during: WorkerState) -> Result<Phase<'_>, Error> {
        let mut state = lock(&self.state);
        if !allowed.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot {action} from {}", *state)));
        }
        let previous = std::mem::replace(&mut *state, during);
        Ok(Phase { state: &self.state, rollback: Some(previous) })
    }

    /// Run the install phase.
    ///
    /// Allowed from `parsed`, or again from `installed` to retry an update
    /// that was skipped. A skipped precache still ends in `installed`; the
    /// activation that follows keeps the previous static generation.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        let phase = self.begin("install", &[WorkerState::Parsed, WorkerState::Installed], WorkerState::Installing)?;
        tracing::info!("Install");
        let outcome = self.handler.on_install().await;
        phase.finish(WorkerState::Installed);

        Ok(outcome)
    }

    /// Run the activation phase. Fetches wait until it completes.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _gate = self.gate.write().await;
        let phase = self.begin("activate", &[WorkerState::Installed], WorkerState::Activating)?;
        tracing::info!("Activate");
        let report = self.handler.on_activate().await;
        phase.finish(WorkerState::Activated);

        Ok(report)
    }

    /// Route a request through the worker if it is active, otherwise
    /// straight to the network.
    pub async fn fetch(&self, request: &Url) -> Result<Served, Error> {
        let gate = self.gate.read().await;
        if self.state() == WorkerState::Activated {
            self.handler.on_fetch(request).await
        } else {
            drop(gate);
            self.handler.on_uncontrolled_fetch(request).await
        }
    }
}
