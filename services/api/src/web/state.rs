//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of live consultations.

use crate::config::Config;
use dream_weaver_core::{Consultation, DreamInterpreter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// How often the sweeper looks for idle consultations.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub interpreter: Arc<DreamInterpreter>,
    pub consultations: Arc<ConsultationRegistry>,
}

impl AppState {
    pub fn new(config: Arc<Config>, interpreter: Arc<DreamInterpreter>) -> Self {
        let consultations = Arc::new(ConsultationRegistry::new(
            config.consultation_idle_timeout,
            config.max_consultations,
        ));
        Self {
            config,
            interpreter,
            consultations,
        }
    }
}

//=========================================================================================
// ConsultationRegistry (One Entry per Visitor)
//=========================================================================================

struct RegistryEntry {
    consultation: Arc<Mutex<Consultation>>,
    last_access: Instant,
}

/// Each consultation owns its own session, so visitors never share model context.
/// Handlers lock a consultation only to begin or finish a step, never across a
/// model request.
///
/// Entries untouched for `idle_timeout` are evicted by [`ConsultationRegistry::evict_idle`],
/// and no more than `capacity` consultations exist at once.
pub struct ConsultationRegistry {
    inner: RwLock<HashMap<Uuid, RegistryEntry>>,
    idle_timeout: Duration,
    capacity: usize,
}

impl ConsultationRegistry {
    pub fn new(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            idle_timeout,
            capacity,
        }
    }

    /// Opens a new consultation, or returns `None` when the registry is full.
    pub async fn create(&self) -> Option<Uuid> {
        let mut entries = self.inner.write().await;
        if entries.len() >= self.capacity {
            warn!(
                "Refusing new consultation: {} already open.",
                entries.len()
            );
            return None;
        }
        let consultation = Consultation::new();
        let id = consultation.id();
        entries.insert(
            id,
            RegistryEntry {
                consultation: Arc::new(Mutex::new(consultation)),
                last_access: Instant::now(),
            },
        );
        info!("Created consultation {}.", id);
        Some(id)
    }

    /// Looks a consultation up and marks it as recently used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Consultation>>> {
        let mut entries = self.inner.write().await;
        let entry = entries.get_mut(&id)?;
        entry.last_access = Instant::now();
        Some(entry.consultation.clone())
    }

    /// Resets and forgets a consultation. Returns `false` if it did not exist.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.inner.write().await.remove(&id);
        match removed {
            Some(entry) => {
                entry.consultation.lock().await.reset();
                info!("Removed consultation {}.", id);
                true
            }
            None => false,
        }
    }

    /// Resets and forgets every consultation idle for longer than the timeout.
    /// Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        let expired: Vec<(Uuid, Arc<Mutex<Consultation>>)> = {
            let mut entries = self.inner.write().await;
            let now = Instant::now();
            let stale: Vec<Uuid> = entries
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.last_access) >= self.idle_timeout)
                .map(|(id, _)| *id)
                .collect();
            stale
                .into_iter()
                .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.consultation)))
                .collect()
        };

        for (id, consultation) in &expired {
            consultation.lock().await.reset();
            info!("Evicted idle consultation {}.", id);
        }
        expired.len()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Runs `evict_idle` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    info!(
                        "Sweep evicted {} consultations, {} still open.",
                        evicted,
                        registry.count().await
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConsultationRegistry {
        ConsultationRegistry::new(Duration::from_secs(60), 2)
    }

    #[tokio::test]
    async fn create_get_remove() {
        let registry = registry();
        let id = registry.create().await.unwrap();
        assert!(registry.get(id).await.is_some());
        assert_eq!(registry.count().await, 1);

        assert!(registry.remove(id).await);
        assert!(registry.get(id).await.is_none());
        assert!(!registry.remove(id).await);
    }

    #[tokio::test]
    async fn full_registry_refuses_new_consultations() {
        let registry = registry();
        assert!(registry.create().await.is_some());
        assert!(registry.create().await.is_some());
        assert!(registry.create().await.is_none());
        assert_eq!(registry.count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_consultations_are_evicted_and_used_ones_kept() {
        let registry = registry();
        let stale = registry.create().await.unwrap();
        let busy = registry.create().await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(registry.get(busy).await.is_some());
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.evict_idle().await, 1);
        assert!(registry.get(stale).await.is_none());
        assert!(registry.get(busy).await.is_some());
        // Eviction frees capacity.
        assert!(registry.create().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_in_the_background() {
        let registry = Arc::new(registry());
        let id = registry.create().await.unwrap();
        let sweeper = registry.spawn_sweeper(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(75)).await;

        assert!(registry.get(id).await.is_none());
        assert_eq!(registry.count().await, 0);
        sweeper.abort();
    }
}
