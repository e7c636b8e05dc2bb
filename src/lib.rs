//! HeroReel - ambient background video scheduler
//!
//! Cycles a weighted rotation of clips through two buffer slots with
//! crossfades, honoring per-clip repeat counts and play-duration overrides,
//! and tells an overlay which text block belongs to the clip on screen.

pub mod clip;
pub mod player;
pub mod playlist;
pub mod utils;

pub use clip::{ClipId, ClipRecord, DisplayContent};
pub use player::{BackgroundScheduler, SchedulerBuilder, SchedulerConfig, SchedulerEvent};
pub use playlist::Rotation;
pub use utils::error::{HeroReelError, Result};
