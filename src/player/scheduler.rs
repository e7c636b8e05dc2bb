//! High-level scheduler API for HeroReel
//!
//! Owns the current clip set, the shuffle RNG and the live
//! [`PlaybackSession`]. Any registry push or shuffle toggle throws the
//! session away and builds a new one from `Idle`; nothing carries over.

use crate::clip::{active_clips, ClipRecord};
use crate::player::content::{ContentNotifier, ContentSubscription, OverlayContent};
use crate::player::session::{PlaybackSession, SessionOutput};
use crate::player::{
    BufferView, MediaEvent, PlaybackState, SchedulerConfig, SchedulerEvent, SchedulerEventHandler,
    SchedulerSnapshot,
};
use crate::playlist::Rotation;
use crate::utils::error::Result;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

/// Scheduler builder for customized configuration
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    seed: Option<u64>,
    event_handlers: Vec<Box<dyn SchedulerEventHandler>>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            seed: None,
            event_handlers: Vec::new(),
        }
    }

    /// Set scheduler configuration
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the shuffle RNG for reproducible randomized rotations
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add an event handler
    pub fn with_event_handler(mut self, handler: Box<dyn SchedulerEventHandler>) -> Self {
        self.event_handlers.push(handler);
        self
    }

    /// Build the scheduler
    pub fn build(self) -> Result<BackgroundScheduler> {
        self.config.validate()?;

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(BackgroundScheduler {
            session: PlaybackSession::new(Rotation::default(), self.config.clone()),
            config: self.config,
            clips: Vec::new(),
            rng,
            notifier: ContentNotifier::new(),
            event_handlers: self.event_handlers,
            rebuilds: 0,
        })
    }
}

/// Background video scheduler
pub struct BackgroundScheduler {
    config: SchedulerConfig,
    clips: Vec<Arc<ClipRecord>>,
    rng: StdRng,
    session: PlaybackSession,
    notifier: ContentNotifier,
    event_handlers: Vec<Box<dyn SchedulerEventHandler>>,
    rebuilds: u64,
}

impl BackgroundScheduler {
    /// Create a scheduler with default settings
    pub fn new() -> Result<Self> {
        SchedulerBuilder::new().build()
    }

    /// Replace the clip set with a fresh registry snapshot and rebuild
    pub fn replace_clips(&mut self, records: &[ClipRecord], now: Duration) {
        self.clips = active_clips(records);
        info!("Clip set replaced: {} of {} records schedulable", self.clips.len(), records.len());
        self.rebuild(now);
    }

    /// Toggle shuffle; rebuilds only when the flag changes
    pub fn set_randomize(&mut self, randomize: bool, now: Duration) -> bool {
        if self.config.randomize == randomize {
            return false;
        }

        info!("Randomize set to {}", randomize);
        self.config.randomize = randomize;
        self.rebuild(now);
        true
    }

    /// Forward a media layer event
    pub fn handle_media(&mut self, event: MediaEvent, now: Duration) {
        let out = self.session.handle_media(event, now);
        self.dispatch(out);
    }

    /// External skip request
    ///
    /// Returns true when the request finished the visible clip; false when
    /// skipping is disabled, nothing is playing or a transition is running.
    pub fn request_skip(&mut self, now: Duration) -> bool {
        let out = self.session.request_skip(now);
        let honored = !out.is_empty()
            && !out.iter().any(|o| {
                matches!(o, SessionOutput::Event(SchedulerEvent::AdvanceIgnored { .. }))
            });
        self.dispatch(out);
        honored
    }

    /// Fire the session timer if it is due
    pub fn tick(&mut self, now: Duration) {
        let out = self.session.tick(now);
        self.dispatch(out);
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.session.next_deadline()
    }

    pub fn buffers(&self, now: Duration) -> [BufferView; 2] {
        self.session.buffers(now)
    }

    pub fn snapshot(&self, now: Duration) -> SchedulerSnapshot {
        SchedulerSnapshot {
            state: self.session.state(),
            rotation_index: self.session.rotation_index(),
            rotation_len: self.session.rotation().len(),
            visible: self.session.visible_slot(),
            buffers: self.session.buffers(now),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of rebuilds performed so far
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Subscribe to overlay content changes
    pub fn subscribe_content<F>(&mut self, callback: F) -> ContentSubscription
    where
        F: Fn(Option<&OverlayContent>) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Overlay content of the visible clip
    pub fn current_content(&self) -> Option<&OverlayContent> {
        self.notifier.current()
    }

    fn rebuild(&mut self, now: Duration) {
        let was_running = self.session.state() != PlaybackState::Idle;
        self.session.cancel();
        if was_running {
            self.emit(SchedulerEvent::SessionReset);
        }

        let rotation = Rotation::build(&self.clips, self.config.randomize, &mut self.rng);
        self.rebuilds += 1;
        debug!("Rebuild #{}: rotation {:?}", self.rebuilds, rotation.ids());

        self.session = PlaybackSession::new(rotation, self.config.clone());
        let out = self.session.start(now);
        if self.session.state() == PlaybackState::Idle {
            info!("No active clips; scheduler idle");
            self.notifier.clear();
        }
        self.dispatch(out);
    }

    fn dispatch(&mut self, out: Vec<SessionOutput>) {
        for output in out {
            match output {
                SessionOutput::Event(event) => self.emit(event),
                SessionOutput::ClipVisible(clip) => {
                    self.notifier.clip_became_visible(&clip);
                }
            }
        }
    }

    fn emit(&mut self, event: SchedulerEvent) {
        for handler in self.event_handlers.iter_mut() {
            handler.handle_event(&event);
        }
    }
}
