//! Playback and highlight synchronization
//!
//! Sequences segment clips end-to-end, derives per-fragment highlight
//! timers from alignment data, and keeps those timers correct across
//! pause/resume/seek/rate changes.

pub mod alignment;
pub mod clip;
pub mod engine;
pub mod highlight;
pub mod queue;
pub mod timer;

pub use alignment::{AlignmentEntry, AlignmentSet};
pub use clip::{AudioClip, TimedClip};
pub use engine::PlaybackEngine;
pub use highlight::{HighlightScheduler, ScheduledHighlight};
pub use queue::{MediaResolver, PlaybackQueue, Segment};
pub use timer::TimerHandle;
