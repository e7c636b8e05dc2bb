//! Crossfade controller for HeroReel
//!
//! Drives the opacity handoff between the two buffer slots. The controller
//! is a pure function of elapsed time since the fade window opened and
//! knows nothing about clips; the session decides when a window opens.
//!
//! The incoming level is `curve(p)` and the outgoing level is its exact
//! complement, so total coverage stays at 1.0 for every curve and there is
//! never a flash to black.

use crate::player::SlotIndex;
use crate::utils::error::HeroReelError;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::str::FromStr;
use std::time::Duration;

/// Fade curve applied to the incoming slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    Linear,

    /// v(t) = t², slow start and fast finish
    Exponential,

    /// v(t) = 0.5 × (1 - cos(π × t)), ease-in-out
    SCurve,
}

impl Default for FadeCurve {
    fn default() -> Self {
        FadeCurve::SCurve
    }
}

impl FadeCurve {
    /// Level of the incoming slot at normalized position `t` (0.0 to 1.0)
    ///
    /// Every curve is monotonic non-decreasing on [0, 1] and maps 0 to 0
    /// and 1 to 1.
    pub fn fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
        }
    }

    /// Level of the outgoing slot, the complement of [`FadeCurve::fade_in`]
    pub fn fade_out(&self, position: f32) -> f32 {
        1.0 - self.fade_in(position)
    }

    /// Parse curve from a config string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "exponential" => Some(FadeCurve::Exponential),
            "s_curve" | "scurve" | "s-curve" | "ease_in_out" | "cosine" => Some(FadeCurve::SCurve),
            _ => None,
        }
    }
}

impl FromStr for FadeCurve {
    type Err = HeroReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FadeCurve::parse(s).ok_or_else(|| {
            HeroReelError::InvalidInput(format!(
                "unknown fade curve '{}' (expected linear, exponential or s_curve)",
                s
            ))
        })
    }
}

/// Opacity and zoom of both slots at one instant of a fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeLevels {
    pub outgoing_opacity: f32,
    pub incoming_opacity: f32,
    pub outgoing_scale: f32,
    pub incoming_scale: f32,
}

/// One crossfade window between two slots
#[derive(Debug, Clone)]
pub struct Crossfade {
    outgoing: SlotIndex,
    incoming: SlotIndex,
    started_at: Duration,
    duration: Duration,
    curve: FadeCurve,
    zoom_scale: f32,
}

impl Crossfade {
    /// Open a fade window at `started_at`
    ///
    /// Opened once the incoming slot is ready, or when its preload timed out.
    pub fn new(
        outgoing: SlotIndex,
        incoming: SlotIndex,
        started_at: Duration,
        duration: Duration,
        curve: FadeCurve,
        zoom_scale: f32,
    ) -> Self {
        Self {
            outgoing,
            incoming,
            started_at,
            duration,
            curve,
            zoom_scale,
        }
    }

    pub fn outgoing(&self) -> SlotIndex {
        self.outgoing
    }

    pub fn incoming(&self) -> SlotIndex {
        self.incoming
    }

    /// Instant at which the window closes
    pub fn ends_at(&self) -> Duration {
        self.started_at + self.duration
    }

    /// Normalized progress through the window, clamped to [0, 1]
    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }

        let elapsed = now.saturating_sub(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self, now: Duration) -> bool {
        now >= self.ends_at()
    }

    /// Slot levels at `now`
    pub fn levels(&self, now: Duration) -> FadeLevels {
        let p = self.progress(now);
        let incoming_opacity = self.curve.fade_in(p);

        FadeLevels {
            outgoing_opacity: 1.0 - incoming_opacity,
            incoming_opacity,
            outgoing_scale: lerp(1.0, self.zoom_scale, incoming_opacity),
            incoming_scale: lerp(self.zoom_scale, 1.0, incoming_opacity),
        }
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
