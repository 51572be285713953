//! # readalong
//!
//! Playback engine for narrated documents with synchronized text
//! highlighting.
//!
//! **Purpose:** Sequence pre-recorded per-section audio clips end-to-end,
//! derive per-fragment highlight timing from externally supplied alignment
//! data, keep those timers correct across pause/resume/seek/rate changes,
//! and chain into a closing clip when the document completes.
//!
//! The engine neither decodes audio nor renders text: clips are driven
//! through the [`playback::AudioClip`] trait and the UI applies highlights
//! by subscribing to the [`events::PlayerEvent`] broadcast.

pub mod config;
pub mod error;
pub mod events;
pub mod manuscript;
pub mod playback;
pub mod state;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use events::{PlayerEvent, PlayerState};
pub use playback::{AudioClip, PlaybackEngine, PlaybackQueue};
pub use state::SharedState;
