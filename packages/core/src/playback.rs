//! Playback: a cooperative timed loop over the timeline.
//!
//! The controller is an explicit state machine driven by a pluggable
//! [`Scheduler`], so unit tests run it against a fake clock while the
//! application drives it with real tokio timers. It never mutates frames;
//! it holds only its own cursor and a session counter used to invalidate
//! stale timers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::timeline::{AudioClip, Frame, FrameStore};
use crate::{FlipbookError, FlipbookResult};

/// Identifies one scheduled fire of one playback session. A token from a
/// dead session is ignored on arrival, so cancellation does not depend on
/// the scheduler clearing timers reliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    session: u64,
    seq: u64,
}

/// Opaque handle to a scheduled timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// One-shot timer source. Implementations deliver the token back to
/// [`PlaybackController::on_timer`] when the delay elapses.
pub trait Scheduler {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// Where rendered frames go. The core emits draw instructions; actual pixel
/// compositing lives outside. `play_audio` is fire-and-forget: a slow or
/// failing audio load must never delay the image-advance timer.
pub trait PlaybackSink {
    fn draw(&mut self, frame: &Frame);
    /// Restore the surface to its idle depiction.
    fn clear(&mut self);
    fn play_audio(&mut self, clip: &AudioClip);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running { cursor: usize, pending: TimerHandle },
}

/// Walks the timeline one frame at a time, each shown for its configured
/// duration, looping or halting at the end per the store's settings.
///
/// At most one timer is pending at any time; `play` and `stop` cancel the
/// outstanding one before anything else, so two playback loops can never
/// overlap.
pub struct PlaybackController {
    state: PlaybackState,
    session: u64,
    next_seq: u64,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            session: 0,
            next_seq: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PlaybackState::Running { .. })
    }

    /// Start playback from frame 0. Rejected with `EmptyTimeline` when the
    /// store has no frames. Always restarts at the beginning; there is no
    /// resume of a previous cursor position.
    pub fn play(
        &mut self,
        store: &FrameStore,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn PlaybackSink,
    ) -> FlipbookResult<()> {
        if store.is_empty() {
            return Err(FlipbookError::EmptyTimeline);
        }
        if let PlaybackState::Running { pending, .. } = self.state {
            scheduler.cancel(pending);
        }
        self.session += 1;
        tracing::debug!(session = self.session, frames = store.len(), "playback started");
        let pending = self.step(0, store, scheduler, sink);
        self.state = PlaybackState::Running { cursor: 0, pending };
        Ok(())
    }

    /// Stop playback and restore the idle surface. Safe from any state;
    /// a no-op when already idle. No render can occur after this returns,
    /// even if a timer scheduled earlier still fires: its token belongs to
    /// a dead session.
    pub fn stop(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn PlaybackSink) {
        let PlaybackState::Running { pending, .. } = self.state else {
            return;
        };
        self.session += 1;
        scheduler.cancel(pending);
        self.state = PlaybackState::Idle;
        sink.clear();
        tracing::debug!("playback stopped");
    }

    /// Deliver a fired timer. Stale tokens (from a session ended by `stop`
    /// or superseded by `play`) are discarded.
    pub fn on_timer(
        &mut self,
        token: TimerToken,
        store: &FrameStore,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn PlaybackSink,
    ) {
        if token.session != self.session {
            tracing::trace!(?token, "stale timer token ignored");
            return;
        }
        let PlaybackState::Running { cursor, .. } = self.state else {
            return;
        };

        let next = cursor + 1;
        if next < store.len() {
            let pending = self.step(next, store, scheduler, sink);
            self.state = PlaybackState::Running { cursor: next, pending };
        } else if store.settings().loop_enabled && !store.is_empty() {
            let pending = self.step(0, store, scheduler, sink);
            self.state = PlaybackState::Running { cursor: 0, pending };
        } else {
            self.state = PlaybackState::Idle;
            sink.clear();
            tracing::debug!("playback reached end of timeline");
        }
    }

    /// Render frame `index` and schedule the advance timer for its duration.
    fn step(
        &mut self,
        index: usize,
        store: &FrameStore,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn PlaybackSink,
    ) -> TimerHandle {
        let frame = &store.frames()[index];
        sink.draw(frame);
        if let Some(clip) = &frame.audio {
            sink.play_audio(clip);
        }
        self.next_seq += 1;
        let token = TimerToken {
            session: self.session,
            seq: self.next_seq,
        };
        scheduler.schedule_once(Duration::from_millis(frame.duration_ms), token)
    }
}

/// Production scheduler: each timer is a spawned tokio sleep that sends its
/// token down an unbounded channel. The application's event loop receives
/// tokens and feeds them back into the controller.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerToken>,
    tasks: HashMap<u64, tokio::task::JoinHandle<()>>,
    next_handle: u64,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                tasks: HashMap::new(),
                next_handle: 0,
            },
            rx,
        )
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(token);
        });
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.insert(handle.0, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle.0) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{AudioClip, AudioOrigin, ImageBlob};
    use uuid::Uuid;

    /// Fake clock: timers fire in deadline order when the test advances
    /// simulated time. `honor_cancel = false` models a scheduler whose
    /// clearing is best-effort, to prove session tokens alone are enough.
    struct FakeScheduler {
        now: Duration,
        next_id: u64,
        pending: Vec<(TimerHandle, Duration, TimerToken)>,
        honor_cancel: bool,
    }

    impl FakeScheduler {
        fn new() -> Self {
            Self {
                now: Duration::ZERO,
                next_id: 0,
                pending: Vec::new(),
                honor_cancel: true,
            }
        }

        fn leaky() -> Self {
            Self {
                honor_cancel: false,
                ..Self::new()
            }
        }

        fn pop_due(&mut self, until: Duration) -> Option<(Duration, TimerToken)> {
            let (pos, _) = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, (_, at, _))| *at <= until)
                .min_by_key(|(_, (_, at, _))| *at)?;
            let (_, at, token) = self.pending.remove(pos);
            Some((at, token))
        }
    }

    impl Scheduler for FakeScheduler {
        fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
            let handle = TimerHandle(self.next_id);
            self.next_id += 1;
            self.pending.push((handle, self.now + delay, token));
            handle
        }

        fn cancel(&mut self, handle: TimerHandle) {
            if self.honor_cancel {
                self.pending.retain(|(h, _, _)| *h != handle);
            }
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Draw(Uuid),
        Clear,
        Audio,
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
    }

    impl RecordingSink {
        fn draws(&self) -> Vec<Uuid> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Draw(id) => Some(*id),
                    _ => None,
                })
                .collect()
        }
    }

    impl PlaybackSink for RecordingSink {
        fn draw(&mut self, frame: &Frame) {
            self.events.push(Event::Draw(frame.id));
        }
        fn clear(&mut self) {
            self.events.push(Event::Clear);
        }
        fn play_audio(&mut self, _clip: &AudioClip) {
            self.events.push(Event::Audio);
        }
    }

    fn store_of(durations: &[u64], loop_enabled: bool) -> FrameStore {
        let mut store = FrameStore::new();
        for (i, ms) in durations.iter().enumerate() {
            store.add_frame(ImageBlob::new(vec![i as u8], "image/png"));
            store.update_duration(i, *ms).unwrap();
        }
        store.toggle_loop(loop_enabled);
        store
    }

    /// Advance simulated time to `target`, delivering every due timer in
    /// deadline order.
    fn run_until(
        ctrl: &mut PlaybackController,
        store: &FrameStore,
        sched: &mut FakeScheduler,
        sink: &mut RecordingSink,
        target: Duration,
    ) {
        while let Some((at, token)) = sched.pop_due(target) {
            sched.now = at;
            ctrl.on_timer(token, store, sched, sink);
        }
        sched.now = target;
    }

    #[test]
    fn test_play_empty_timeline_rejected() {
        let store = FrameStore::new();
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        assert!(matches!(
            ctrl.play(&store, &mut sched, &mut sink),
            Err(FlipbookError::EmptyTimeline)
        ));
        assert_eq!(ctrl.state(), PlaybackState::Idle);
        assert!(sink.events.is_empty());
        assert!(sched.pending.is_empty());
    }

    #[test]
    fn test_playback_without_loop_halts_after_last_frame() {
        let store = store_of(&[100, 100, 100], false);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(300));

        let want: Vec<Uuid> = store.frames().iter().map(|f| f.id).collect();
        assert_eq!(sink.draws(), want);
        assert_eq!(ctrl.state(), PlaybackState::Idle);
        assert_eq!(sink.events.last(), Some(&Event::Clear));
    }

    #[test]
    fn test_playback_with_loop_wraps_to_first_frame() {
        let store = store_of(&[100, 100, 100], true);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(350));

        let ids: Vec<Uuid> = store.frames().iter().map(|f| f.id).collect();
        assert_eq!(sink.draws(), vec![ids[0], ids[1], ids[2], ids[0]]);
        assert!(matches!(ctrl.state(), PlaybackState::Running { cursor: 0, .. }));
    }

    #[test]
    fn test_stop_cancels_pending_timer() {
        let store = store_of(&[100, 100, 100], true);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(150));
        assert_eq!(sink.draws().len(), 2);

        ctrl.stop(&mut sched, &mut sink);
        assert_eq!(ctrl.state(), PlaybackState::Idle);

        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_secs(10));
        assert_eq!(sink.draws().len(), 2);
        assert_eq!(sink.events.last(), Some(&Event::Clear));
    }

    #[test]
    fn test_stale_timer_ignored_even_without_scheduler_cancel() {
        let store = store_of(&[100], true);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::leaky();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        ctrl.stop(&mut sched, &mut sink);

        // The timer is still in the fake scheduler's queue and will fire,
        // but its session is dead.
        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_secs(1));
        assert_eq!(sink.draws().len(), 1);
        assert_eq!(ctrl.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.stop(&mut sched, &mut sink);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_replay_restarts_cursor_at_zero() {
        let mut store = store_of(&[100, 100, 100], false);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(150));

        ctrl.stop(&mut sched, &mut sink);
        store.delete_frame(0).unwrap();

        sink.events.clear();
        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        assert_eq!(sink.draws(), vec![store.frames()[0].id]);
        assert!(matches!(ctrl.state(), PlaybackState::Running { cursor: 0, .. }));
    }

    #[test]
    fn test_play_while_running_keeps_single_pending_timer() {
        let store = store_of(&[100, 100], true);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        assert_eq!(sched.pending.len(), 1);
    }

    #[test]
    fn test_frame_audio_started_with_draw() {
        let mut store = store_of(&[100, 100], false);
        store
            .attach_audio(0, AudioClip::new(AudioOrigin::Recorded, vec![0], "audio/wav"))
            .unwrap();
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        let first = store.frames()[0].id;
        assert_eq!(sink.events[0], Event::Draw(first));
        assert_eq!(sink.events[1], Event::Audio);

        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(100));
        // Second frame has no audio.
        assert_eq!(sink.events.iter().filter(|e| **e == Event::Audio).count(), 1);
    }

    #[test]
    fn test_timeline_shrunk_below_cursor_treated_as_end() {
        let mut store = store_of(&[100, 100, 100], false);
        let mut ctrl = PlaybackController::new();
        let mut sched = FakeScheduler::new();
        let mut sink = RecordingSink::default();

        ctrl.play(&store, &mut sched, &mut sink).unwrap();
        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(150));

        // Two frames deleted out from under a running session.
        store.delete_frame(2).unwrap();
        store.delete_frame(1).unwrap();

        run_until(&mut ctrl, &store, &mut sched, &mut sink, Duration::from_millis(400));
        assert_eq!(ctrl.state(), PlaybackState::Idle);
    }
}
