//! Playback session state machine
//!
//! Holds the rotation position, per-clip replay counters, the two buffer
//! slots and the single armed timer. Natural end, duration timeout, media
//! failure and manual skip all route through one finish path; while a
//! transition is in flight that path is closed, which collapses racing
//! triggers into at most one advance per clip occurrence.
//!
//! A session is never reused across rebuilds. The scheduler cancels it and
//! starts a new one from `Idle`.

use crate::clip::{ClipId, ClipRecord};
use crate::player::crossfade::Crossfade;
use crate::player::slots::{BufferSlot, SlotPair};
use crate::player::timer::{TimerKind, TimerSlot};
use crate::player::{
    AdvanceTrigger, BufferView, MediaEvent, MediaEventKind, PlaybackState, SchedulerConfig,
    SchedulerEvent, SlotIndex,
};
use crate::playlist::Rotation;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Something the session produced while handling an input
#[derive(Debug, Clone)]
pub enum SessionOutput {
    /// Lifecycle event for handlers
    Event(SchedulerEvent),

    /// `clip` is now the visible clip; emitted at the instant of the swap
    ClipVisible(Arc<ClipRecord>),
}

#[derive(Debug)]
struct Transition {
    next_index: usize,
    incoming: SlotIndex,
    /// `None` while waiting for the incoming slot to become ready
    fade: Option<Crossfade>,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Playing,
    Transitioning(Transition),
}

/// Playback state for one rotation build
#[derive(Debug)]
pub struct PlaybackSession {
    rotation: Rotation,
    config: SchedulerConfig,
    phase: Phase,
    rotation_index: usize,
    slots: SlotPair,
    repeat_counters: HashMap<ClipId, u32>,
    timer: TimerSlot,
}

impl PlaybackSession {
    /// Create an idle session over `rotation`
    pub fn new(rotation: Rotation, config: SchedulerConfig) -> Self {
        Self {
            rotation,
            config,
            phase: Phase::Idle,
            rotation_index: 0,
            slots: SlotPair::new(),
            repeat_counters: HashMap::new(),
            timer: TimerSlot::new(),
        }
    }

    /// Leave `Idle`: show rotation[0] in slot A and preload rotation[1] in B
    ///
    /// Stays idle when the rotation is empty.
    pub fn start(&mut self, now: Duration) -> Vec<SessionOutput> {
        let mut out = Vec::new();
        if !matches!(self.phase, Phase::Idle) {
            return out;
        }
        let Some(first) = self.rotation.get(0).cloned() else {
            debug!("Rotation is empty; session stays idle");
            return out;
        };

        self.slots = SlotPair::new();
        self.repeat_counters.clear();
        self.rotation_index = 0;

        out.push(SessionOutput::Event(SchedulerEvent::SessionStarted {
            rotation_len: self.rotation.len(),
        }));
        self.load_slot(SlotIndex::A, &first, 0, &mut out);
        if let Some(second) = self.rotation.get(1).filter(|_| self.rotation.len() > 1).cloned() {
            self.load_slot(SlotIndex::B, &second, 1, &mut out);
        }

        self.repeat_counters.insert(first.id.clone(), 0);
        self.phase = Phase::Playing;
        self.arm_duration_timer(now);

        info!("Session started with '{}' ({} rotation entries)", first.id, self.rotation.len());
        out.push(SessionOutput::ClipVisible(first));
        out
    }

    /// Abort any timer and in-flight crossfade; the session becomes idle
    pub fn cancel(&mut self) {
        self.timer.cancel();
        if let Phase::Transitioning(transition) = &self.phase {
            info!("Aborting transition to rotation index {}", transition.next_index);
        }
        self.phase = Phase::Idle;
    }

    /// Handle an event reported by the media layer
    pub fn handle_media(&mut self, event: MediaEvent, now: Duration) -> Vec<SessionOutput> {
        let mut out = Vec::new();
        if matches!(self.phase, Phase::Idle) {
            return out;
        }
        if !self.slots.is_current(event.slot, event.load) {
            debug!("Ignoring {:?} for superseded load {:?} in slot {}", event.kind, event.load, event.slot);
            return out;
        }

        let visible = self.slots.visible();
        match event.kind {
            MediaEventKind::Ready => {
                self.slots.mark_ready(event.slot);
                if self.awaiting_fade_for(event.slot) {
                    self.open_fade(now, &mut out);
                }
            }
            MediaEventKind::Ended if event.slot == visible => {
                self.finish(AdvanceTrigger::NaturalEnd, now, &mut out);
            }
            MediaEventKind::Ended => {
                debug!("Ignoring end of hidden slot {}", event.slot);
            }
            MediaEventKind::Failed => {
                warn!("Media in slot {} failed to play", event.slot);
                self.slots.mark_failed(event.slot);
                if event.slot == visible {
                    self.finish(AdvanceTrigger::MediaFailed, now, &mut out);
                } else if self.awaiting_fade_for(event.slot) {
                    self.open_fade(now, &mut out);
                }
            }
        }

        out
    }

    /// Force the visible clip's natural end early
    pub fn request_skip(&mut self, now: Duration) -> Vec<SessionOutput> {
        let mut out = Vec::new();
        if !self.config.manual_skip_enabled {
            debug!("Manual skip disabled");
            return out;
        }
        self.finish(AdvanceTrigger::ManualSkip, now, &mut out);
        out
    }

    /// Fire the armed timer if it is due
    ///
    /// At most one timer fires per call; callers re-check
    /// [`PlaybackSession::next_deadline`] afterwards. The timer's own
    /// deadline is used as the logical time of whatever it triggers.
    pub fn tick(&mut self, now: Duration) -> Vec<SessionOutput> {
        let mut out = Vec::new();
        let Some(timer) = self.timer.take_due(now) else {
            return out;
        };
        let at = timer.deadline;

        match timer.kind {
            TimerKind::ClipDuration { load } => {
                if self.slots.is_current(self.slots.visible(), load) {
                    self.finish(AdvanceTrigger::DurationElapsed, at, &mut out);
                } else {
                    debug!("Dropping duration timer for superseded load {:?}", load);
                }
            }
            TimerKind::PreloadTimeout => {
                if let Phase::Transitioning(transition) = &self.phase {
                    warn!("Slot {} not ready after {:?}; fading anyway", transition.incoming, self.config.preload_timeout());
                    self.open_fade(at, &mut out);
                }
            }
            TimerKind::FadeComplete => self.complete_transition(at, &mut out),
        }

        out
    }

    /// Deadline of the armed timer
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timer.deadline()
    }

    pub fn state(&self) -> PlaybackState {
        match self.phase {
            Phase::Idle => PlaybackState::Idle,
            Phase::Playing => PlaybackState::Playing,
            Phase::Transitioning(_) => PlaybackState::Transitioning,
        }
    }

    /// True while the fade window is open (not merely awaiting preload)
    pub fn is_fading(&self) -> bool {
        matches!(&self.phase, Phase::Transitioning(t) if t.fade.is_some())
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn rotation_index(&self) -> usize {
        self.rotation_index
    }

    pub fn visible_slot(&self) -> SlotIndex {
        self.slots.visible()
    }

    pub fn slot(&self, slot: SlotIndex) -> &BufferSlot {
        self.slots.get(slot)
    }

    pub fn visible_clip(&self) -> Option<&Arc<ClipRecord>> {
        match self.phase {
            Phase::Idle => None,
            _ => self.slots.get(self.slots.visible()).clip(),
        }
    }

    /// Completed plays of the current occurrence of `id`
    pub fn repeat_count(&self, id: &ClipId) -> u32 {
        self.repeat_counters.get(id).copied().unwrap_or(0)
    }

    /// Renderable state of both slots at `now`
    pub fn buffers(&self, now: Duration) -> [BufferView; 2] {
        match &self.phase {
            Phase::Idle => [BufferView::empty(SlotIndex::A), BufferView::empty(SlotIndex::B)],
            Phase::Transitioning(Transition { fade: Some(fade), .. }) => {
                let levels = fade.levels(now);
                [SlotIndex::A, SlotIndex::B].map(|slot| {
                    if slot == fade.outgoing() {
                        self.slots.view(slot, levels.outgoing_opacity, levels.outgoing_scale, true)
                    } else {
                        self.slots.view(slot, levels.incoming_opacity, levels.incoming_scale, true)
                    }
                })
            }
            _ => self.slots.resting_views(self.config.zoom_scale),
        }
    }

    /// The single finish path shared by every trigger
    fn finish(&mut self, trigger: AdvanceTrigger, now: Duration, out: &mut Vec<SessionOutput>) {
        match self.phase {
            Phase::Idle => return,
            Phase::Transitioning(_) => {
                debug!("Ignoring {:?} during transition", trigger);
                out.push(SessionOutput::Event(SchedulerEvent::AdvanceIgnored { trigger }));
                return;
            }
            Phase::Playing => {}
        }

        let slot = self.slots.visible();
        let Some(clip) = self.slots.get(slot).clip().cloned() else {
            return;
        };

        let plays = self.repeat_counters.entry(clip.id.clone()).or_insert(0);
        if *plays + 1 < clip.repeat_count {
            *plays += 1;
            let play = self.slots.restart(slot);
            info!("Replaying '{}' ({}/{}) after {:?}", clip.id, *plays + 1, clip.repeat_count, trigger);
            out.push(SessionOutput::Event(SchedulerEvent::ClipReplayed {
                slot,
                clip_id: clip.id.clone(),
                play,
            }));
            self.arm_duration_timer(now);
            return;
        }

        debug!("'{}' finished after {:?}", clip.id, trigger);
        self.begin_transition(now, out);
    }

    fn begin_transition(&mut self, now: Duration, out: &mut Vec<SessionOutput>) {
        self.timer.cancel();

        let next_index = self.rotation.next_index(self.rotation_index);
        let Some(next) = self.rotation.get(next_index).cloned() else {
            return;
        };
        let from = self.slots.visible();
        let incoming = self.slots.hidden();

        if let Some(load) = self.slots.ensure_loaded(incoming, &next, next_index) {
            out.push(SessionOutput::Event(SchedulerEvent::ClipLoaded {
                slot: incoming,
                clip_id: next.id.clone(),
                load,
            }));
        }

        out.push(SessionOutput::Event(SchedulerEvent::TransitionStarted {
            from,
            to: incoming,
            next_index,
        }));
        self.phase = Phase::Transitioning(Transition {
            next_index,
            incoming,
            fade: None,
        });

        if self.slots.get(incoming).is_ready() {
            self.open_fade(now, out);
        } else {
            debug!("Waiting for slot {} to preload '{}'", incoming, next.id);
            self.timer.arm(TimerKind::PreloadTimeout, now + self.config.preload_timeout());
        }
    }

    fn awaiting_fade_for(&self, slot: SlotIndex) -> bool {
        matches!(&self.phase, Phase::Transitioning(t) if t.incoming == slot && t.fade.is_none())
    }

    fn open_fade(&mut self, now: Duration, out: &mut Vec<SessionOutput>) {
        let outgoing = self.slots.visible();
        let Phase::Transitioning(transition) = &mut self.phase else {
            return;
        };
        if transition.fade.is_some() {
            return;
        }

        let fade = Crossfade::new(
            outgoing,
            transition.incoming,
            now,
            self.config.fade_duration(),
            self.config.fade_curve,
            self.config.zoom_scale,
        );
        self.timer.arm(TimerKind::FadeComplete, fade.ends_at());
        out.push(SessionOutput::Event(SchedulerEvent::FadeStarted {
            outgoing,
            incoming: transition.incoming,
        }));
        transition.fade = Some(fade);
    }

    fn complete_transition(&mut self, now: Duration, out: &mut Vec<SessionOutput>) {
        let transition = match std::mem::replace(&mut self.phase, Phase::Playing) {
            Phase::Transitioning(transition) => transition,
            other => {
                self.phase = other;
                return;
            }
        };

        let outgoing_id = self.slots.get(self.slots.visible()).clip().map(|c| c.id.clone());
        self.slots.swap_visible();
        self.rotation_index = transition.next_index;

        let visible = self.slots.visible();
        let Some(clip) = self.slots.get(visible).clip().cloned() else {
            return;
        };
        if let Some(id) = outgoing_id {
            self.repeat_counters.remove(&id);
        }
        self.repeat_counters.insert(clip.id.clone(), 0);

        info!("Now showing '{}' (rotation index {}) in slot {}", clip.id, self.rotation_index, visible);
        out.push(SessionOutput::ClipVisible(Arc::clone(&clip)));
        out.push(SessionOutput::Event(SchedulerEvent::TransitionCompleted {
            visible,
            clip_id: clip.id.clone(),
            rotation_index: self.rotation_index,
        }));

        let following = self.rotation.next_index(self.rotation_index);
        if let Some(next) = self.rotation.get(following).cloned() {
            self.load_slot(self.slots.hidden(), &next, following, out);
        }

        self.arm_duration_timer(now);
    }

    fn load_slot(&mut self, slot: SlotIndex, clip: &Arc<ClipRecord>, rotation_index: usize, out: &mut Vec<SessionOutput>) {
        let load = self.slots.load(slot, clip, rotation_index);
        out.push(SessionOutput::Event(SchedulerEvent::ClipLoaded {
            slot,
            clip_id: clip.id.clone(),
            load,
        }));
    }

    /// Replace the armed timer with the visible clip's duration timer
    ///
    /// A clip known to be unplayable is due immediately.
    fn arm_duration_timer(&mut self, now: Duration) {
        let slot = self.slots.get(self.slots.visible());
        let Some(clip) = slot.clip() else {
            self.timer.cancel();
            return;
        };
        let load = slot.load();

        if slot.is_failed() {
            self.timer.arm(TimerKind::ClipDuration { load }, now);
        } else if let Some(duration) = clip.play_duration() {
            self.timer.arm(TimerKind::ClipDuration { load }, now + duration);
        } else {
            self.timer.cancel();
        }
    }
}
