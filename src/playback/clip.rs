//! Playable clip handles
//!
//! The engine drives audio through the [`AudioClip`] trait and never touches
//! decoding or output devices itself; the host supplies handles backed by
//! whatever audio subsystem it uses. [`TimedClip`] is the built-in wall-clock
//! simulation used by the demo binary and the test suite.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};

use crate::playback::timer::TimerHandle;

/// A playable audio clip handle
///
/// Position is reported in clip-time milliseconds and must be retained
/// across `pause`/`play` cycles. `rewind` stops the clip and resets its
/// position to zero. Completion is signalled on the broadcast channel
/// returned by `subscribe_ended`; a clip emits at most one completion per
/// playthrough (a rewind starts a new playthrough).
pub trait AudioClip: Send + Sync {
    /// Start or resume playback from the current position
    fn play(&self);

    /// Pause playback, retaining the current position
    fn pause(&self);

    /// Stop playback and reset position to zero
    fn rewind(&self);

    /// Apply a playback-rate multiplier, effective immediately
    fn set_rate(&self, rate: f64);

    /// Current position in clip time, milliseconds
    fn position_ms(&self) -> u64;

    /// Subscribe to the completion signal
    fn subscribe_ended(&self) -> broadcast::Receiver<()>;
}

struct ClipState {
    playing: bool,
    rate: f64,
    /// Position at the moment of the last play/pause/rate change
    position_ms: f64,
    /// Set while playing; position advances from `position_ms` by
    /// wall-clock elapsed time scaled by `rate`
    resumed_at: Option<Instant>,
    /// Pending completion timer while playing
    ended_task: Option<TimerHandle>,
}

impl ClipState {
    fn current_position_ms(&self, duration_ms: u64) -> f64 {
        let pos = match self.resumed_at {
            Some(at) => self.position_ms + at.elapsed().as_secs_f64() * 1000.0 * self.rate,
            None => self.position_ms,
        };
        pos.min(duration_ms as f64)
    }
}

/// Clock-driven clip simulation
///
/// "Plays" by advancing its position with the tokio clock, honoring pause
/// and rate changes, and signals completion when the position reaches the
/// configured duration. Under a paused test clock this makes whole
/// playthroughs deterministic.
pub struct TimedClip {
    duration_ms: u64,
    ended_tx: broadcast::Sender<()>,
    state: Arc<Mutex<ClipState>>,
}

impl TimedClip {
    pub fn new(duration_ms: u64) -> Arc<Self> {
        let (ended_tx, _) = broadcast::channel(4);
        Arc::new(Self {
            duration_ms,
            ended_tx,
            state: Arc::new(Mutex::new(ClipState {
                playing: false,
                rate: 1.0,
                position_ms: 0.0,
                resumed_at: None,
                ended_task: None,
            })),
        })
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    /// Arm the completion timer for the remaining clip time at the current
    /// rate. Caller holds the state lock.
    fn arm_ended_task(&self, state: &mut ClipState) {
        let remaining_ms = (self.duration_ms as f64 - state.position_ms).max(0.0) / state.rate;
        let shared = Arc::clone(&self.state);
        let ended_tx = self.ended_tx.clone();
        let duration_ms = self.duration_ms;

        state.ended_task = Some(TimerHandle::after(
            Duration::from_secs_f64(remaining_ms / 1000.0),
            async move {
                {
                    let mut state = shared.lock().unwrap();
                    state.playing = false;
                    state.position_ms = duration_ms as f64;
                    state.resumed_at = None;
                }
                let _ = ended_tx.send(());
            },
        ));
    }

    /// Fold elapsed playing time into `position_ms`. Caller holds the lock.
    fn fold_position(&self, state: &mut ClipState) {
        state.position_ms = state.current_position_ms(self.duration_ms);
        state.resumed_at = state.playing.then(Instant::now);
    }
}

impl AudioClip for TimedClip {
    fn play(&self) {
        let mut state = self.state.lock().unwrap();
        if state.playing {
            return;
        }
        state.playing = true;
        state.resumed_at = Some(Instant::now());
        self.arm_ended_task(&mut state);
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.playing {
            return;
        }
        self.fold_position(&mut state);
        state.playing = false;
        state.resumed_at = None;
        state.ended_task = None;
    }

    fn rewind(&self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.position_ms = 0.0;
        state.resumed_at = None;
        state.ended_task = None;
    }

    fn set_rate(&self, rate: f64) {
        let mut state = self.state.lock().unwrap();
        self.fold_position(&mut state);
        state.rate = rate;
        if state.playing {
            self.arm_ended_task(&mut state);
        }
    }

    fn position_ms(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.current_position_ms(self.duration_ms) as u64
    }

    fn subscribe_ended(&self) -> broadcast::Receiver<()> {
        self.ended_tx.subscribe()
    }
}
