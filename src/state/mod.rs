pub mod geo;
pub mod progression;
pub mod race;
mod sse;
pub mod tracker;

#[cfg(test)]
pub mod test_support;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dao::race_store::RaceStore;

pub use self::sse::SseHub;
use self::sse::SseState;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the storage handle, broadcast hubs, and
/// per-team mutation gates.
pub struct AppState {
    race_store: RwLock<Option<Arc<dyn RaceStore>>>,
    sse: SseState,
    team_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            race_store: RwLock::new(None),
            sse: SseState::new(16),
            team_gates: DashMap::new(),
            degraded: degraded_tx,
            config,
        })
    }

    /// Application configuration resolved at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current race store, if one is installed.
    pub async fn race_store(&self) -> Option<Arc<dyn RaceStore>> {
        let guard = self.race_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new race store implementation and leave degraded mode.
    pub async fn install_race_store(&self, store: Arc<dyn RaceStore>) {
        {
            let mut guard = self.race_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current race store and enter degraded mode.
    pub async fn clear_race_store(&self) {
        {
            let mut guard = self.race_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Mutation gate for one team. Progression writes for the same team
    /// serialize on this lock; different teams proceed in parallel.
    pub fn team_gate(&self, team_id: Uuid) -> Arc<Mutex<()>> {
        self.team_gates
            .entry(team_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
