//! Shared application state for the observer server.
//!
//! [`AppState`] holds the broadcast channel for day events and the
//! in-memory snapshot the REST endpoints serve. Reads never block the
//! tick: the engine pushes a fresh snapshot once per committed day.

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use aicity_types::{CitySnapshot, ObserverEvent, VaultState};

/// Capacity of the broadcast channel for day events.
///
/// A subscriber that falls behind by more than this many messages
/// receives a `Lagged` error, skips to the newest message, and must
/// re-sync via the snapshot endpoint.
pub const BROADCAST_CAPACITY: usize = 256;

/// Shared state for the axum application.
///
/// Wrapped in [`Arc`] and injected via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for day events.
    pub tx: broadcast::Sender<ObserverEvent>,
    /// The latest committed-day snapshot.
    pub snapshot: Arc<RwLock<CitySnapshot>>,
}

impl AppState {
    /// Create state with an empty pre-genesis snapshot.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            snapshot: Arc::new(RwLock::new(empty_snapshot())),
        }
    }

    /// Subscribe to the live feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverEvent> {
        self.tx.subscribe()
    }

    /// Push one event to all connected observers. Never blocks; a send
    /// error only means nobody is listening.
    pub fn publish(&self, event: ObserverEvent) {
        let _ = self.tx.send(event);
    }

    /// Replace the served snapshot at a day boundary.
    pub async fn update_snapshot(&self, snapshot: CitySnapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_snapshot() -> CitySnapshot {
    CitySnapshot {
        day: 0,
        agents: Vec::new(),
        vault: VaultState {
            total_supply: 0,
            circulating: 0,
            vault_balance: 0,
        },
        assets: Vec::new(),
        relationships: Vec::new(),
        last_newspaper: String::new(),
        graveyard_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_fine() {
        let state = AppState::new();
        state.publish(ObserverEvent::TimePhase {
            day: 1,
            phase: aicity_types::TimePhase::Morning,
        });
    }

    #[tokio::test]
    async fn snapshot_updates_are_visible() {
        let state = AppState::new();
        let mut snapshot = empty_snapshot();
        snapshot.day = 7;
        state.update_snapshot(snapshot).await;
        assert_eq!(state.snapshot.read().await.day, 7);
    }
}
