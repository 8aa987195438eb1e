//! The observer channel: a push WebSocket feed of day events plus a
//! snapshot endpoint for late joiners.
//!
//! The engine emits day events through [`LiveObserver`], which forwards
//! into a bounded broadcast channel. Slow observers are dropped from the
//! live feed by the channel's lag semantics and must re-sync via
//! `GET /api/state`; they never block the tick.

pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::serve;
pub use state::AppState;

use std::sync::Arc;

use aicity_core::scheduler::ObserverSink;
use aicity_types::ObserverEvent;

/// The engine-side sink: forwards day events into the broadcast channel
/// and refreshes the snapshot when a `state` frame comes through.
pub struct LiveObserver {
    state: Arc<AppState>,
    runtime: tokio::runtime::Handle,
}

impl LiveObserver {
    pub fn new(state: Arc<AppState>, runtime: tokio::runtime::Handle) -> Self {
        Self { state, runtime }
    }
}

impl ObserverSink for LiveObserver {
    fn emit(&mut self, event: &ObserverEvent) {
        if let ObserverEvent::State { data, .. } = event {
            let state = Arc::clone(&self.state);
            let snapshot = data.clone();
            self.runtime.spawn(async move {
                state.update_snapshot(snapshot).await;
            });
        }
        self.state.publish(event.clone());
    }
}
