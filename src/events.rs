//! Event types for the readalong player
//!
//! The engine communicates with the rendering/UI side exclusively through
//! these events, broadcast via the bus owned by [`SharedState`](crate::state::SharedState).
//! The renderer subscribes and applies highlight toggles and control-state
//! updates; nothing in the engine touches the page directly.

use serde::{Deserialize, Serialize};

/// Player state enumeration
///
/// `Idle` until a queue is loaded, then `Paused` ⇄ `Playing` during normal
/// use. `Ended` is reached when the closing clip finishes and is left only
/// by a seek (which restarts playback) or a fresh load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// No queue loaded
    Idle,
    /// Queue loaded, clip position retained, nothing scheduled
    Paused,
    /// Active clip running, highlights armed
    Playing,
    /// Closing clip finished; terminal until seek or reload
    Ended,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "Idle"),
            PlayerState::Paused => write!(f, "Paused"),
            PlayerState::Playing => write!(f, "Playing"),
            PlayerState::Ended => write!(f, "Ended"),
        }
    }
}

/// Events broadcast by the playback engine
///
/// Serializable (tagged by `type`) so a host can forward them over SSE or a
/// websocket unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Player state changed (load, play, pause, end)
    PlaybackStateChanged {
        /// State before the transition
        old_state: PlayerState,
        /// State after the transition
        new_state: PlayerState,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A narrated segment's clip started from the beginning
    ///
    /// `section_index` is the renderer's section id for the segment, so the
    /// UI can correlate it with its click targets.
    SegmentStarted {
        section_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The closing clip started (queue exhausted)
    ClosingClipStarted {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A fragment's narration began
    ///
    /// The renderer must apply the highlight style to the element with this
    /// fragment id and smooth-scroll it into view, centered.
    HighlightActivated {
        fragment_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A fragment's narration ended (or its highlight was torn down early
    /// by a pause/seek/rate change); the renderer removes the style
    HighlightDeactivated {
        fragment_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback rate changed; applies to the active clip and all future
    /// highlight scheduling
    RateChanged {
        rate: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback jumped to the segment at `segment_index` in the loaded
    /// queue
    Seeked {
        segment_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The closing clip finished; the player is in its terminal state
    PlaybackEnded {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::SegmentStarted { .. } => "SegmentStarted",
            PlayerEvent::ClosingClipStarted { .. } => "ClosingClipStarted",
            PlayerEvent::HighlightActivated { .. } => "HighlightActivated",
            PlayerEvent::HighlightDeactivated { .. } => "HighlightDeactivated",
            PlayerEvent::RateChanged { .. } => "RateChanged",
            PlayerEvent::Seeked { .. } => "Seeked",
            PlayerEvent::PlaybackEnded { .. } => "PlaybackEnded",
        }
    }
}
