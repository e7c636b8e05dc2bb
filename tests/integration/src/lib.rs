//! Integration test utilities for HeroReel
//!
//! This module provides common utilities for integration testing including:
//! - Clip set fixtures written to disk
//! - An event recorder for scheduler lifecycle events
//! - A scripted media layer that reports on the slots the driver publishes

use anyhow::Result;
use heroreel::clip::{ClipRecord, DisplayContent};
use heroreel::player::{
    MediaEvent, SchedulerEvent, SchedulerEventHandler, SchedulerHandle, SchedulerSnapshot,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Test fixture for integration tests
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub clips_file: PathBuf,
}

impl TestFixture {
    /// Write `clips` as a registry snapshot into a fresh temporary directory
    pub fn with_clips(clips: &[ClipRecord]) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let clips_file = temp_dir.path().join("clips.json");
        std::fs::write(&clips_file, serde_json::to_string_pretty(clips)?)?;

        Ok(Self {
            temp_dir,
            clips_file,
        })
    }

    /// Get the path to the temporary directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Plain clip that plays once to its natural end
pub fn clip(id: &str) -> ClipRecord {
    ClipRecord::new(id, format!("https://cdn.example.com/hero/{}.mp4", id))
}

/// Clip carrying a custom overlay title
pub fn titled(id: &str, title: &str) -> ClipRecord {
    clip(id).with_content(DisplayContent {
        title: title.to_string(),
        subtitle: format!("{} subtitle", title),
        description: String::new(),
    })
}

/// Records every scheduler event it is handed
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler to register with the scheduler builder
    pub fn handler(&self) -> Box<dyn SchedulerEventHandler> {
        let events = Arc::clone(&self.events);
        Box::new(move |event: &SchedulerEvent| {
            events.lock().unwrap().push(event.clone());
        })
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&SchedulerEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }

    /// Ids of clips that became visible through a completed transition
    pub fn shown(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                SchedulerEvent::TransitionCompleted { clip_id, .. } => Some(clip_id.to_string()),
                _ => None,
            })
            .collect()
    }
}

/// Scripted media layer acting on the latest published snapshot
pub struct MediaScript<'a> {
    handle: &'a SchedulerHandle,
}

impl<'a> MediaScript<'a> {
    pub fn new(handle: &'a SchedulerHandle) -> Self {
        Self { handle }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.handle.snapshots().borrow().clone()
    }

    /// Report the hidden slot's preload as complete
    pub async fn ready_hidden(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let hidden = &snapshot.buffers[snapshot.visible.other().index()];
        self.handle.media(MediaEvent::ready(hidden.slot, hidden.load))?;
        settle().await;
        Ok(())
    }

    /// Report the visible slot's natural end
    pub async fn end_visible(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let visible = &snapshot.buffers[snapshot.visible.index()];
        self.handle.media(MediaEvent::ended(visible.slot, visible.load))?;
        settle().await;
        Ok(())
    }

    /// Preload, finish and fade through one clip
    pub async fn advance(&self, fade: Duration) -> Result<()> {
        self.ready_hidden().await?;
        self.end_visible().await?;
        tokio::time::sleep(fade + Duration::from_millis(10)).await;
        Ok(())
    }
}

/// Let the driver task drain its command queue
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
