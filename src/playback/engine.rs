//! Playback engine orchestration
//!
//! The state machine that owns the playback session: which clip is active,
//! whether playback is running, the position in the queue, the playback
//! rate, and the set of pending highlight and advance timers. All user
//! intents (play, pause, seek, rate change) and the clip-completion signal
//! funnel through here, and every transition that invalidates prior
//! scheduling cancels the timers it armed before arming new ones. A stale
//! timer firing after its state is gone is a correctness bug, so teardown
//! is total: highlights, the inter-segment silence timer, and the
//! completion watcher all live in the session and are dropped together.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::events::{PlayerEvent, PlayerState};
use crate::playback::clip::AudioClip;
use crate::playback::highlight::{HighlightScheduler, ScheduledHighlight};
use crate::playback::queue::{PlaybackQueue, Segment};
use crate::playback::timer::TimerHandle;
use crate::state::SharedState;

/// Mutable playback session, owned exclusively by the engine
struct Session {
    /// Queue as loaded; seeks slice suffixes from this, so repeated seeks
    /// keep indexing the full document
    loaded: Option<PlaybackQueue>,

    /// Queue view for the current playthrough (suffix of `loaded`)
    active: Option<PlaybackQueue>,

    /// Index of the active segment within `active`
    segment_index: usize,

    /// Clip currently owned by the session (segment or closing clip)
    active_clip: Option<Arc<dyn AudioClip>>,

    /// True once the closing clip has been handed the session
    on_closing: bool,

    /// Playback-rate multiplier applied to clips and scheduling math
    rate: f64,

    /// Live highlight timers for the active segment
    pending_highlights: Vec<ScheduledHighlight>,

    /// Set when a segment is freshly entered (load/advance/seek); the next
    /// `play()` announces it and clears the flag, so a pause/resume within
    /// the same playthrough never re-announces
    announce_segment: bool,

    /// Pending inter-segment silence timer, if a clip just completed
    advance_timer: Option<TimerHandle>,

    /// Task watching the active clip's completion signal
    ended_watcher: Option<TimerHandle>,
}

/// Playback controller
///
/// Sequences segment clips end-to-end with a fixed silence gap between
/// them, chains into the closing clip when the queue is exhausted, and
/// drives the [`HighlightScheduler`] so highlight timers always reflect the
/// live clip position and rate.
pub struct PlaybackEngine {
    state: Arc<SharedState>,
    scheduler: HighlightScheduler,
    inter_segment_silence: Duration,
    session: Mutex<Session>,
}

impl PlaybackEngine {
    /// Create a new engine in the `Idle` state
    pub fn new(config: &PlayerConfig, state: Arc<SharedState>) -> Arc<Self> {
        Arc::new(Self {
            scheduler: HighlightScheduler::new(Arc::clone(&state)),
            state,
            inter_segment_silence: config.inter_segment_silence(),
            session: Mutex::new(Session {
                loaded: None,
                active: None,
                segment_index: 0,
                active_clip: None,
                on_closing: false,
                rate: config.default_rate,
                pending_highlights: Vec::new(),
                announce_segment: false,
                advance_timer: None,
                ended_watcher: None,
            }),
        })
    }

    /// Load a queue, replacing any previous document wholesale
    ///
    /// Leaves the player `Paused` at segment 0 with nothing armed; the
    /// first `play()` starts the first clip. With an empty queue the
    /// closing clip (if any) becomes the active clip directly.
    pub async fn load(&self, queue: PlaybackQueue) {
        let mut session = self.session.lock().await;
        self.teardown(&mut session);

        // The abandoned document's clip must not keep playing underneath
        // the new one
        if let Some(clip) = session.active_clip.take() {
            clip.rewind();
        }

        session.segment_index = 0;
        session.on_closing = queue.is_empty() && queue.closing_clip().is_some();
        session.active_clip = match queue.get(0) {
            Some(segment) => Some(Arc::clone(&segment.clip)),
            None => queue.closing_clip().cloned(),
        };
        session.announce_segment = !queue.is_empty();
        info!("Loaded queue: {} segments", queue.len());
        session.loaded = Some(queue.clone());
        session.active = Some(queue);
        drop(session);

        self.set_state(PlayerState::Paused).await;
    }

    /// Start or resume playback
    ///
    /// Silent no-op without an active clip (nothing loaded, or terminal
    /// state reached). Applies the session rate, resumes the clip from its
    /// retained position, rearms highlights for the remainder of the active
    /// segment, and watches the clip's completion signal.
    pub async fn play(self: &Arc<Self>) {
        let mut session = self.session.lock().await;
        let Some(clip) = session.active_clip.clone() else {
            debug!("Play ignored: no active clip");
            return;
        };

        self.set_state(PlayerState::Playing).await;

        clip.set_rate(session.rate);

        // Cancel-before-rearm: any timers from a previous arming pass must
        // be gone before this one schedules
        let mut pending = std::mem::take(&mut session.pending_highlights);
        self.scheduler.cancel_all(&mut pending);

        session.ended_watcher = Some(self.spawn_ended_watcher(&clip));
        clip.play();

        if !session.on_closing {
            let segment = session
                .active
                .as_ref()
                .and_then(|q| q.get(session.segment_index))
                .cloned();
            if let Some(segment) = segment {
                let position_ms = clip.position_ms();
                if session.announce_segment {
                    session.announce_segment = false;
                    self.state.broadcast_event(PlayerEvent::SegmentStarted {
                        section_index: segment.section_index,
                        timestamp: chrono::Utc::now(),
                    });
                }
                debug!(
                    "Arming segment {} from {}ms at rate {}",
                    segment.section_index, position_ms, session.rate
                );
                session.pending_highlights =
                    self.scheduler.arm(&segment, position_ms, session.rate);
            }
        }
    }

    /// Pause playback, retaining the clip position
    ///
    /// Cancels all pending highlights, the silence-gap timer, and the
    /// completion watcher; they are re-derived from the retained position
    /// on the next `play()`. Idempotent; silent no-op without an active
    /// clip.
    pub async fn pause(&self) {
        let mut session = self.session.lock().await;
        let Some(clip) = session.active_clip.clone() else {
            debug!("Pause ignored: no active clip");
            return;
        };

        clip.pause();
        self.teardown(&mut session);
        drop(session);

        self.set_state(PlayerState::Paused).await;
    }

    /// Change the playback rate
    ///
    /// Applies to the active clip immediately and to all future scheduling
    /// math. While playing, highlights for the remainder of the active
    /// segment are rearmed at the new rate from the clip's current
    /// position. Silent no-op without an active clip.
    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidRate(rate));
        }

        let mut session = self.session.lock().await;
        let Some(clip) = session.active_clip.clone() else {
            debug!("Rate change ignored: no active clip");
            return Ok(());
        };

        session.rate = rate;
        clip.set_rate(rate);

        let mut pending = std::mem::take(&mut session.pending_highlights);
        self.scheduler.cancel_all(&mut pending);

        if self.state.is_playing().await && !session.on_closing {
            let segment = session
                .active
                .as_ref()
                .and_then(|q| q.get(session.segment_index))
                .cloned();
            if let Some(segment) = segment {
                session.pending_highlights =
                    self.scheduler.arm(&segment, clip.position_ms(), rate);
            }
        }

        info!("Playback rate set to {}", rate);
        self.state.broadcast_event(PlayerEvent::RateChanged {
            rate,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Jump to the segment at `segment_index` in the loaded queue and start
    /// playing it from the beginning
    ///
    /// Indexes the queue as loaded, so repeated seeks address the whole
    /// document. Out-of-range indices (and seeks before any load) are
    /// no-ops. A seek always (re)starts playback, including from `Ended`.
    pub async fn seek(self: &Arc<Self>, segment_index: usize) {
        let mut session = self.session.lock().await;
        let Some(loaded) = session.loaded.clone() else {
            debug!("Seek ignored: no queue loaded");
            return;
        };
        let Some(suffix) = loaded.slice_from(segment_index) else {
            debug!("Seek ignored: segment index {} out of range", segment_index);
            return;
        };

        if let Some(clip) = &session.active_clip {
            clip.rewind();
        }
        self.teardown(&mut session);

        session.segment_index = 0;
        session.on_closing = false;
        session.announce_segment = true;
        // slice_from only returns non-empty suffixes
        session.active_clip = suffix.get(0).map(|s| Arc::clone(&s.clip));
        if let Some(clip) = &session.active_clip {
            clip.rewind();
        }
        session.active = Some(suffix);
        drop(session);

        info!("Seek to segment {}", segment_index);
        self.state.broadcast_event(PlayerEvent::Seeked {
            segment_index,
            timestamp: chrono::Utc::now(),
        });
        self.play().await;
    }

    /// Active segment of the current playthrough, if any
    pub async fn active_segment(&self) -> Option<Arc<Segment>> {
        let session = self.session.lock().await;
        session
            .active
            .as_ref()
            .and_then(|q| q.get(session.segment_index))
            .cloned()
    }

    /// Current playback rate
    pub async fn rate(&self) -> f64 {
        self.session.lock().await.rate
    }

    /// Clip completion, reported by the watcher task
    ///
    /// For a segment clip, arms the inter-segment silence timer that will
    /// advance the queue; for the closing clip, reaches the terminal state.
    async fn on_clip_ended(self: &Arc<Self>) {
        let mut session = self.session.lock().await;

        if session.on_closing {
            debug!("Closing clip finished");
            session.active_clip = None;
            let mut pending = std::mem::take(&mut session.pending_highlights);
            self.scheduler.cancel_all(&mut pending);
            drop(session);

            self.set_state(PlayerState::Ended).await;
            self.state.broadcast_event(PlayerEvent::PlaybackEnded {
                timestamp: chrono::Utc::now(),
            });
            return;
        }

        debug!(
            "Segment clip finished; advancing after {:?} silence",
            self.inter_segment_silence
        );
        let engine = Arc::clone(self);
        session.advance_timer = Some(TimerHandle::after(
            self.inter_segment_silence,
            async move {
                engine.advance().await;
            },
        ));
    }

    /// Move to the next segment, or chain into the closing clip
    ///
    /// Runs inside the silence timer's task, so a pause or seek during the
    /// gap cancels it before it gets here.
    async fn advance(self: &Arc<Self>) {
        let mut session = self.session.lock().await;
        let Some(active) = session.active.clone() else {
            return;
        };

        let next = session.segment_index + 1;
        if let Some(segment) = active.get(next) {
            session.segment_index = next;
            session.announce_segment = true;
            let clip = Arc::clone(&segment.clip);
            // Fresh playthrough regardless of what an earlier pass left
            clip.rewind();
            session.active_clip = Some(clip);
            drop(session);

            self.play().await;
        } else if let Some(closing) = active.closing_clip() {
            info!("Queue exhausted; starting closing clip");
            session.on_closing = true;
            let clip = Arc::clone(closing);
            clip.rewind();
            session.active_clip = Some(clip);
            drop(session);

            self.state.broadcast_event(PlayerEvent::ClosingClipStarted {
                timestamp: chrono::Utc::now(),
            });
            self.play().await;
        } else {
            info!("Queue exhausted; no closing clip configured");
            session.active_clip = None;
            drop(session);

            self.set_state(PlayerState::Ended).await;
            self.state.broadcast_event(PlayerEvent::PlaybackEnded {
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Cancel everything the session has armed
    ///
    /// Leaves no timer that could fire against the state being replaced.
    fn teardown(&self, session: &mut Session) {
        let mut pending = std::mem::take(&mut session.pending_highlights);
        self.scheduler.cancel_all(&mut pending);
        session.advance_timer = None;
        session.ended_watcher = None;
    }

    /// Watch `clip`'s completion signal and report it back to the engine
    fn spawn_ended_watcher(self: &Arc<Self>, clip: &Arc<dyn AudioClip>) -> TimerHandle {
        let mut ended_rx = clip.subscribe_ended();
        let engine = Arc::clone(self);
        TimerHandle::spawn(async move {
            if ended_rx.recv().await.is_ok() {
                engine.on_clip_ended().await;
            }
        })
    }

    /// Transition the shared player state, emitting the change event
    async fn set_state(&self, new_state: PlayerState) {
        let old_state = self.state.get_player_state().await;
        if old_state == new_state {
            return;
        }
        self.state.set_player_state(new_state).await;
        info!("Player state changed: {} -> {}", old_state, new_state);
        self.state.broadcast_event(PlayerEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::alignment::{AlignmentEntry, AlignmentSet};
    use crate::playback::clip::TimedClip;

    fn segment(section_index: usize, entries: Vec<AlignmentEntry>, clip_ms: u64) -> Arc<Segment> {
        let clip = TimedClip::new(clip_ms);
        let fragment_ids = (0..entries.len())
            .map(|i| crate::manuscript::fragment_id(section_index, i))
            .collect();
        Arc::new(Segment {
            section_index,
            fragment_ids,
            alignment: AlignmentSet::new(entries),
            clip,
        })
    }

    fn closing_clip(duration_ms: u64) -> Arc<dyn AudioClip> {
        TimedClip::new(duration_ms)
    }

    fn two_segment_queue() -> PlaybackQueue {
        PlaybackQueue::new(
            vec![
                segment(
                    0,
                    vec![AlignmentEntry {
                        start: 0,
                        length: 300,
                    }],
                    1_000,
                ),
                segment(
                    1,
                    vec![AlignmentEntry {
                        start: 100,
                        length: 200,
                    }],
                    600,
                ),
            ],
            Some(closing_clip(400)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_enters_paused() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));

        assert_eq!(state.get_player_state().await, PlayerState::Idle);
        engine.load(two_segment_queue()).await;
        assert_eq!(state.get_player_state().await, PlayerState::Paused);
        assert_eq!(engine.active_segment().await.unwrap().section_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_stops_previous_clip() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));

        let first = two_segment_queue();
        let old_clip = Arc::clone(&first.get(0).unwrap().clip);
        engine.load(first).await;
        engine.play().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(old_clip.position_ms(), 200);

        // Wholesale replacement: the abandoned clip stops advancing
        engine.load(two_segment_queue()).await;
        assert_eq!(old_clip.position_ms(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(old_clip.position_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_announced_once_per_entry() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));
        let mut rx = state.subscribe_events();

        engine.load(two_segment_queue()).await;
        engine.play().await;
        // Pause at position 0 and resume within the same playthrough
        engine.pause().await;
        engine.play().await;

        let mut announced = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PlayerEvent::SegmentStarted { .. }) {
                announced += 1;
            }
        }
        assert_eq!(announced, 1);

        // Re-entering the segment announces it again
        engine.seek(0).await;
        let mut announced = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PlayerEvent::SegmentStarted { .. }) {
                announced += 1;
            }
        }
        assert_eq!(announced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_without_queue_is_noop() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));

        engine.play().await;
        assert_eq!(state.get_player_state().await, PlayerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_pause_cycle() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));
        engine.load(two_segment_queue()).await;

        engine.play().await;
        assert_eq!(state.get_player_state().await, PlayerState::Playing);

        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.pause().await;
        assert_eq!(state.get_player_state().await, PlayerState::Paused);

        // Pausing while paused leaves state unchanged
        engine.pause().await;
        assert_eq!(state.get_player_state().await, PlayerState::Paused);

        // Resume retains the clip position
        engine.play().await;
        let clip = engine.active_segment().await.unwrap().clip.clone();
        assert_eq!(clip.position_ms(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rate_validation() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));

        assert!(matches!(
            engine.set_rate(0.0).await,
            Err(Error::InvalidRate(_))
        ));
        assert!(matches!(
            engine.set_rate(-1.5).await,
            Err(Error::InvalidRate(_))
        ));
        assert!(matches!(
            engine.set_rate(f64::NAN).await,
            Err(Error::InvalidRate(_))
        ));

        // Valid rate with no active clip is a silent no-op
        engine.set_rate(2.0).await.unwrap();
        assert_eq!(engine.rate().await, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_out_of_range_is_noop() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));

        // Before any load
        engine.seek(0).await;
        assert_eq!(state.get_player_state().await, PlayerState::Idle);

        engine.load(two_segment_queue()).await;
        engine.seek(5).await;
        assert_eq!(state.get_player_state().await, PlayerState::Paused);
        assert_eq!(engine.active_segment().await.unwrap().section_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_restarts_playback_at_segment() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));
        engine.load(two_segment_queue()).await;

        engine.seek(1).await;
        assert_eq!(state.get_player_state().await, PlayerState::Playing);
        assert_eq!(engine.active_segment().await.unwrap().section_index, 1);

        // Repeated seeks keep indexing the loaded queue
        engine.seek(0).await;
        assert_eq!(engine.active_segment().await.unwrap().section_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_without_closing_clip_stays_inert() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));

        engine.load(PlaybackQueue::new(Vec::new(), None)).await;
        assert_eq!(state.get_player_state().await, PlayerState::Paused);

        engine.play().await;
        assert_eq!(state.get_player_state().await, PlayerState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_with_closing_clip_plays_it() {
        let state = Arc::new(SharedState::new());
        let engine = PlaybackEngine::new(&PlayerConfig::default(), Arc::clone(&state));
        let mut rx = state.subscribe_events();

        engine
            .load(PlaybackQueue::new(Vec::new(), Some(closing_clip(300))))
            .await;
        engine.play().await;
        assert_eq!(state.get_player_state().await, PlayerState::Playing);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(state.get_player_state().await, PlayerState::Ended);

        let mut saw_ended = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PlayerEvent::PlaybackEnded { .. }) {
                saw_ended = true;
            }
        }
        assert!(saw_ended);
    }
}
