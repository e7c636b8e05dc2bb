//! Background video scheduling for HeroReel
//!
//! This module drives the hero section's ambient video: it cycles a weighted
//! rotation through two buffer slots, crossfades between them and keeps the
//! overlay text in step with whichever clip is on screen.
//!
//! Everything here is single-threaded and event driven. Time is passed in
//! explicitly as a [`Duration`] since an arbitrary epoch, which keeps the
//! state machine deterministic under test.

pub mod content;
pub mod crossfade;
pub mod driver;
mod scheduler;
mod session;
mod slots;
mod timer;

pub use content::{ContentNotifier, ContentSubscription, OverlayContent};
pub use crossfade::{Crossfade, FadeCurve, FadeLevels};
pub use driver::{SchedulerCommand, SchedulerHandle};
pub use scheduler::{BackgroundScheduler, SchedulerBuilder};
pub use session::{PlaybackSession, SessionOutput};
pub use slots::{BufferSlot, SlotPair};
pub use timer::{ArmedTimer, TimerKind, TimerSlot};

use crate::clip::ClipId;
use crate::utils::error::{HeroReelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One of the two playback buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotIndex {
    A,
    B,
}

impl SlotIndex {
    /// Position in the two-element slot array
    pub fn index(self) -> usize {
        match self {
            SlotIndex::A => 0,
            SlotIndex::B => 1,
        }
    }

    pub fn other(self) -> SlotIndex {
        match self {
            SlotIndex::A => SlotIndex::B,
            SlotIndex::B => SlotIndex::A,
        }
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotIndex::A => f.write_str("A"),
            SlotIndex::B => f.write_str("B"),
        }
    }
}

/// Identifier of one load of a clip into a slot, renewed on every replay
///
/// Media events carry the load they refer to so that events from a
/// superseded load are recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct LoadId(pub u64);

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No active clips; nothing is rendered
    Idle,

    /// A clip occupies the visible slot
    Playing,

    /// Handing over to the hidden slot; further advances are ignored
    Transitioning,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Crossfade window length in milliseconds
    pub fade_duration_ms: u64,

    /// Shuffle the finished rotation
    pub randomize: bool,

    /// Honor external skip requests
    pub manual_skip_enabled: bool,

    /// Curve applied to the incoming slot
    pub fade_curve: FadeCurve,

    /// Longest wait for the incoming slot to become ready before fading anyway
    pub preload_timeout_ms: u64,

    /// Resting scale of the hidden slot (1.0 disables the zoom)
    pub zoom_scale: f32,

    /// Buffer view publish interval while a fade is running
    pub frame_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: 1000,
            randomize: false,
            manual_skip_enabled: false,
            fade_curve: FadeCurve::SCurve,
            preload_timeout_ms: 3000,
            zoom_scale: 1.05,
            frame_interval_ms: 16,
        }
    }
}

impl SchedulerConfig {
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn preload_timeout(&self) -> Duration {
        Duration::from_millis(self.preload_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.preload_timeout_ms == 0 {
            return Err(HeroReelError::Config("preload_timeout_ms must be positive".to_string()));
        }

        if self.frame_interval_ms == 0 {
            return Err(HeroReelError::Config("frame_interval_ms must be positive".to_string()));
        }

        if !(1.0..=2.0).contains(&self.zoom_scale) {
            return Err(HeroReelError::Config(format!(
                "zoom_scale must be between 1.0 and 2.0, got {}",
                self.zoom_scale
            )));
        }

        Ok(())
    }
}

/// What the media layer observed on a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEventKind {
    /// Enough data is decoded to render the first frame
    Ready,

    /// Playback reached the natural end of the media
    Ended,

    /// The media could not be played; handled like an immediate end
    Failed,
}

/// Event reported by the host's media layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaEvent {
    pub slot: SlotIndex,
    pub load: LoadId,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn ready(slot: SlotIndex, load: LoadId) -> Self {
        Self { slot, load, kind: MediaEventKind::Ready }
    }

    pub fn ended(slot: SlotIndex, load: LoadId) -> Self {
        Self { slot, load, kind: MediaEventKind::Ended }
    }

    pub fn failed(slot: SlotIndex, load: LoadId) -> Self {
        Self { slot, load, kind: MediaEventKind::Failed }
    }
}

/// Renderable state of one buffer slot
#[derive(Debug, Clone, PartialEq)]
pub struct BufferView {
    pub slot: SlotIndex,
    pub clip_id: Option<ClipId>,
    /// Media URI to mount, unmodified from the registry
    pub source: Option<String>,
    pub load: LoadId,
    /// Bumped on every replay; the host restarts playback from zero
    pub play_count: u32,
    pub opacity: f32,
    pub scale: f32,
    pub visible: bool,
}

impl BufferView {
    pub fn empty(slot: SlotIndex) -> Self {
        Self {
            slot,
            clip_id: None,
            source: None,
            load: LoadId::default(),
            play_count: 0,
            opacity: 0.0,
            scale: 1.0,
            visible: false,
        }
    }
}

/// Point-in-time view of the scheduler for hosts
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSnapshot {
    pub state: PlaybackState,
    pub rotation_index: usize,
    pub rotation_len: usize,
    pub visible: SlotIndex,
    pub buffers: [BufferView; 2],
}

/// Why the current clip is considered finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceTrigger {
    NaturalEnd,
    DurationElapsed,
    MediaFailed,
    ManualSkip,
}

/// Scheduler event for external event handling
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A fresh session started at rotation[0]
    SessionStarted { rotation_len: usize },

    /// The session was torn down by a rebuild
    SessionReset,

    /// A clip was loaded into a slot
    ClipLoaded { slot: SlotIndex, clip_id: ClipId, load: LoadId },

    /// The visible clip restarted to satisfy its repeat count
    ClipReplayed { slot: SlotIndex, clip_id: ClipId, play: u32 },

    /// The visible clip finished and the handoff began
    TransitionStarted { from: SlotIndex, to: SlotIndex, next_index: usize },

    /// The incoming slot is ready and the fade window opened
    FadeStarted { outgoing: SlotIndex, incoming: SlotIndex },

    /// The visible slot swapped
    TransitionCompleted { visible: SlotIndex, clip_id: ClipId, rotation_index: usize },

    /// A finish trigger arrived while it could not be honored
    AdvanceIgnored { trigger: AdvanceTrigger },
}

/// Scheduler event handler trait
pub trait SchedulerEventHandler: Send {
    /// Handle scheduler event
    fn handle_event(&mut self, event: &SchedulerEvent);
}

impl<F> SchedulerEventHandler for F
where
    F: FnMut(&SchedulerEvent) + Send,
{
    fn handle_event(&mut self, event: &SchedulerEvent) {
        self(event)
    }
}
