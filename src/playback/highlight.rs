//! Highlight scheduling
//!
//! Derives cancellable activation/deactivation timers for the fragments of
//! one segment from the clip's live position and the playback rate. Offsets
//! are always recomputed from the current clip position at arm time rather
//! than stored as absolute deadlines, so pause/resume and rate changes never
//! need to track accumulated paused time; the engine simply cancels and
//! rearms.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::Duration;
use tracing::trace;

use crate::events::PlayerEvent;
use crate::playback::queue::Segment;
use crate::playback::timer::TimerHandle;
use crate::state::SharedState;

/// Live highlight timers for one fragment
///
/// Owns the activation and deactivation timers; dropping the value cancels
/// both. `lit` tracks whether activation has fired without its matching
/// deactivation, so a teardown can clear a visible highlight instead of
/// leaving it stuck.
pub struct ScheduledHighlight {
    fragment_id: String,
    activation: TimerHandle,
    deactivation: TimerHandle,
    lit: Arc<AtomicBool>,
}

impl ScheduledHighlight {
    pub fn fragment_id(&self) -> &str {
        &self.fragment_id
    }
}

/// Computes and arms highlight timers against the shared player state
pub struct HighlightScheduler {
    state: Arc<SharedState>,
}

impl HighlightScheduler {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// Arm highlight timers for the remainder of `segment`
    ///
    /// For each fragment, the activation delay is
    /// `(start - clip_position_ms) / rate`; fragments whose start already
    /// elapsed are skipped for this playthrough (they will not highlight
    /// again until a seek restarts the segment). Deactivation follows
    /// activation after `length / rate`.
    ///
    /// Since alignment starts are non-decreasing, the armed activations
    /// fire in fragment order by construction.
    ///
    /// Both callbacks check the shared state at fire time: once playback
    /// stops, a still-pending activation must not highlight in the
    /// background.
    pub fn arm(
        &self,
        segment: &Segment,
        clip_position_ms: u64,
        rate: f64,
    ) -> Vec<ScheduledHighlight> {
        let mut scheduled = Vec::new();

        for (index, fragment_id) in segment.fragment_ids.iter().enumerate() {
            let Some(entry) = segment.alignment.get(index) else {
                // Alignment shorter than the fragment list; trailing
                // fragments just never highlight
                continue;
            };
            if entry.start < clip_position_ms {
                continue;
            }

            let offset_ms = (entry.start - clip_position_ms) as f64 / rate;
            let hold_ms = entry.length as f64 / rate;
            let lit = Arc::new(AtomicBool::new(false));

            trace!(
                "Arming highlight for {} in {:.0}ms (hold {:.0}ms)",
                fragment_id,
                offset_ms,
                hold_ms
            );

            let activation = {
                let state = Arc::clone(&self.state);
                let lit = Arc::clone(&lit);
                let fragment_id = fragment_id.clone();
                TimerHandle::after(Duration::from_secs_f64(offset_ms / 1000.0), async move {
                    if state.is_playing().await {
                        lit.store(true, Ordering::SeqCst);
                        state.broadcast_event(PlayerEvent::HighlightActivated {
                            fragment_id,
                            timestamp: chrono::Utc::now(),
                        });
                    }
                })
            };

            let deactivation = {
                let state = Arc::clone(&self.state);
                let lit = Arc::clone(&lit);
                let fragment_id = fragment_id.clone();
                TimerHandle::after(
                    Duration::from_secs_f64((offset_ms + hold_ms) / 1000.0),
                    async move {
                        if lit.swap(false, Ordering::SeqCst) {
                            state.broadcast_event(PlayerEvent::HighlightDeactivated {
                                fragment_id,
                                timestamp: chrono::Utc::now(),
                            });
                        }
                    },
                )
            };

            scheduled.push(ScheduledHighlight {
                fragment_id: fragment_id.clone(),
                activation,
                deactivation,
                lit,
            });
        }

        scheduled
    }

    /// Cancel every still-pending timer in `set` and drain it
    ///
    /// A fragment whose activation fired but whose deactivation is still
    /// pending gets its deactivation event emitted now, so no highlight
    /// outlives its timers. Idempotent; safe on an empty set.
    pub fn cancel_all(&self, set: &mut Vec<ScheduledHighlight>) {
        for highlight in set.drain(..) {
            highlight.activation.cancel();
            highlight.deactivation.cancel();
            if highlight.lit.swap(false, Ordering::SeqCst) {
                self.state.broadcast_event(PlayerEvent::HighlightDeactivated {
                    fragment_id: highlight.fragment_id,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlayerState;
    use crate::playback::alignment::{AlignmentEntry, AlignmentSet};
    use crate::playback::clip::TimedClip;
    use tokio::sync::broadcast::Receiver;

    fn segment(entries: Vec<AlignmentEntry>) -> Segment {
        let fragment_ids = (0..entries.len())
            .map(|i| crate::manuscript::fragment_id(0, i))
            .collect();
        Segment {
            section_index: 0,
            fragment_ids,
            alignment: AlignmentSet::new(entries),
            clip: TimedClip::new(10_000),
        }
    }

    fn drain(rx: &mut Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn playing_state() -> Arc<SharedState> {
        let state = Arc::new(SharedState::new());
        state.set_player_state(PlayerState::Playing).await;
        state
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_and_deactivation_fire_in_order() {
        let state = playing_state().await;
        let mut rx = state.subscribe_events();
        let scheduler = HighlightScheduler::new(Arc::clone(&state));

        let segment = segment(vec![
            AlignmentEntry {
                start: 100,
                length: 200,
            },
            AlignmentEntry {
                start: 400,
                length: 100,
            },
        ]);

        let _set = scheduler.arm(&segment, 0, 1.0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            PlayerEvent::HighlightActivated { fragment_id, .. } if fragment_id == "0000_0000"
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let names: Vec<_> = drain(&mut rx)
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["HighlightDeactivated", "HighlightActivated"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_fragments_are_skipped() {
        let state = playing_state().await;
        let scheduler = HighlightScheduler::new(Arc::clone(&state));

        let segment = segment(vec![
            AlignmentEntry {
                start: 100,
                length: 50,
            },
            AlignmentEntry {
                start: 500,
                length: 50,
            },
        ]);

        // Clip already past the first fragment's start
        let set = scheduler.arm(&segment, 200, 1.0);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].fragment_id(), "0000_0001");

        // Exactly at a start still schedules it (offset zero)
        let set = scheduler.arm(&segment, 100, 1.0);
        assert_eq!(set.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_divides_offsets() {
        let state = playing_state().await;
        let mut rx = state.subscribe_events();
        let scheduler = HighlightScheduler::new(Arc::clone(&state));

        let segment = segment(vec![AlignmentEntry {
            start: 4_000,
            length: 1_000,
        }]);

        // (4000 - 2000) / 2.0 = 1000ms until activation
        let _set = scheduler.arm(&segment, 2_000, 2.0);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            PlayerEvent::HighlightActivated { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_guarded_when_not_playing() {
        let state = playing_state().await;
        let mut rx = state.subscribe_events();
        let scheduler = HighlightScheduler::new(Arc::clone(&state));

        let segment = segment(vec![AlignmentEntry {
            start: 100,
            length: 100,
        }]);

        let _set = scheduler.arm(&segment, 0, 1.0);
        state.set_player_state(PlayerState::Paused).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        // Timer fired but the guard suppressed the highlight
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_clears_lit_highlight() {
        let state = playing_state().await;
        let mut rx = state.subscribe_events();
        let scheduler = HighlightScheduler::new(Arc::clone(&state));

        let segment = segment(vec![AlignmentEntry {
            start: 100,
            length: 5_000,
        }]);

        let mut set = scheduler.arm(&segment, 0, 1.0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Activated, deactivation far in the future
        assert_eq!(drain(&mut rx).len(), 1);

        scheduler.cancel_all(&mut set);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            PlayerEvent::HighlightDeactivated { .. }
        ));

        // Idempotent: second call does nothing
        scheduler.cancel_all(&mut set);
        assert!(drain(&mut rx).is_empty());

        // And the cancelled deactivation never fires later
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_activation_is_silent() {
        let state = playing_state().await;
        let mut rx = state.subscribe_events();
        let scheduler = HighlightScheduler::new(Arc::clone(&state));

        let segment = segment(vec![AlignmentEntry {
            start: 300,
            length: 100,
        }]);

        let mut set = scheduler.arm(&segment, 0, 1.0);
        scheduler.cancel_all(&mut set);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(drain(&mut rx).is_empty());
    }
}
