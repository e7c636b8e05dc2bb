//! Overlay content notifications
//!
//! Emits the text block belonging to the clip that just became visible.
//! Emission happens once per rotation advance, never on replay, at the same
//! call that swaps the visible slot.

use crate::clip::ClipRecord;
use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Overlay text for the visible clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayContent {
    pub title: String,
    pub subtitle: String,
    pub description: String,
}

impl OverlayContent {
    /// Content to show for `clip`; `None` means use the default overlay
    pub fn for_clip(clip: &ClipRecord) -> Option<Self> {
        if !clip.use_custom_content {
            return None;
        }

        clip.display_content.as_ref().map(|content| Self {
            title: content.title.clone(),
            subtitle: content.subtitle.clone(),
            description: content.description.clone(),
        })
    }
}

type Subscriber = Arc<dyn Fn(Option<&OverlayContent>) + Send + Sync>;
type SubscriberList = Arc<RwLock<Vec<(u64, Subscriber)>>>;

/// Fan-out of overlay content changes
pub struct ContentNotifier {
    subscribers: SubscriberList,
    next_id: u64,
    /// Last emitted value; outer `None` until the first emission
    current: Option<Option<OverlayContent>>,
    emissions: u64,
}

impl Default for ContentNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: 0,
            current: None,
            emissions: 0,
        }
    }

    /// Register a callback; it is removed when the subscription drops
    pub fn subscribe<F>(&mut self, callback: F) -> ContentSubscription
    where
        F: Fn(Option<&OverlayContent>) + Send + Sync + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.write().push((id, Arc::new(callback)));

        ContentSubscription {
            id,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// A clip became visible; emit its content (or `None`) exactly once
    pub fn clip_became_visible(&mut self, clip: &ClipRecord) -> Option<OverlayContent> {
        let content = OverlayContent::for_clip(clip);
        match &content {
            Some(c) => info!("Overlay content for '{}': {}", clip.id, c.title),
            None => info!("Default overlay for '{}'", clip.id),
        }
        self.emit(content.clone());
        content
    }

    /// Nothing is visible any more; fall back to the default overlay once
    pub fn clear(&mut self) {
        if matches!(self.current, Some(Some(_))) {
            info!("Overlay content cleared");
            self.emit(None);
        }
    }

    /// Last emitted content, `None` when the default overlay applies
    pub fn current(&self) -> Option<&OverlayContent> {
        self.current.as_ref().and_then(|c| c.as_ref())
    }

    /// Number of emissions so far
    pub fn emissions(&self) -> u64 {
        self.emissions
    }

    fn emit(&mut self, content: Option<OverlayContent>) {
        self.emissions += 1;
        // Callbacks run outside the lock so they may drop subscriptions.
        let callbacks: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(content.as_ref());
        }
        self.current = Some(content);
    }
}

/// Content subscription handle
pub struct ContentSubscription {
    id: u64,
    subscribers: SubscriberList,
}

impl Drop for ContentSubscription {
    fn drop(&mut self) {
        self.subscribers.write().retain(|(id, _)| *id != self.id);
    }
}
