//! Shared player state
//!
//! Thread-safe shared state coordinating the playback engine, its scheduled
//! highlight timers, and event subscribers. The engine is the only writer;
//! timer callbacks read the player state at fire time to decide whether they
//! are still allowed to take effect.

use tokio::sync::{broadcast, RwLock};

use crate::events::{PlayerEvent, PlayerState};

/// Shared state accessible by the engine, its timers, and event subscribers
pub struct SharedState {
    /// Current player state
    pub player_state: RwLock<PlayerState>,

    /// Event broadcaster for UI-bridge subscribers
    pub event_tx: broadcast::Sender<PlayerEvent>,
}

impl SharedState {
    /// Create new shared state; the player starts `Idle` until a queue loads
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            player_state: RwLock::new(PlayerState::Idle),
            event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: PlayerEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    /// Get current player state
    pub async fn get_player_state(&self) -> PlayerState {
        *self.player_state.read().await
    }

    /// Set player state
    pub async fn set_player_state(&self, state: PlayerState) {
        *self.player_state.write().await = state;
    }

    /// Whether playback is currently active
    pub async fn is_playing(&self) -> bool {
        self.get_player_state().await == PlayerState::Playing
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
