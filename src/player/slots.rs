//! Double-buffered playback slots
//!
//! Two slots live in a fixed array indexed by [`SlotIndex`]; one is visible
//! and the other preloads the next clip. Every change to what a slot holds
//! goes through [`SlotPair::load`].
//!
//! Load ids are allocated process-wide so that a media event addressed to a
//! torn-down session can never match a load in its replacement.

use crate::clip::ClipRecord;
use crate::player::{BufferView, LoadId, SlotIndex};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_LOAD: AtomicU64 = AtomicU64::new(1);

fn allocate_load() -> LoadId {
    LoadId(NEXT_LOAD.fetch_add(1, Ordering::Relaxed))
}

/// Contents of one buffer slot
#[derive(Debug, Clone, Default)]
pub struct BufferSlot {
    clip: Option<Arc<ClipRecord>>,
    /// Rotation position the clip was loaded for
    rotation_index: usize,
    load: LoadId,
    ready: bool,
    failed: bool,
    play_count: u32,
}

impl BufferSlot {
    pub fn clip(&self) -> Option<&Arc<ClipRecord>> {
        self.clip.as_ref()
    }

    pub fn rotation_index(&self) -> usize {
        self.rotation_index
    }

    pub fn load(&self) -> LoadId {
        self.load
    }

    /// Ready to render, or known unplayable
    pub fn is_ready(&self) -> bool {
        self.ready || self.failed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn play_count(&self) -> u32 {
        self.play_count
    }
}

/// The two buffer slots plus which one is on screen
#[derive(Debug, Clone)]
pub struct SlotPair {
    slots: [BufferSlot; 2],
    visible: SlotIndex,
}

impl Default for SlotPair {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotPair {
    pub fn new() -> Self {
        Self {
            slots: [BufferSlot::default(), BufferSlot::default()],
            visible: SlotIndex::A,
        }
    }

    pub fn visible(&self) -> SlotIndex {
        self.visible
    }

    pub fn hidden(&self) -> SlotIndex {
        self.visible.other()
    }

    pub fn get(&self, slot: SlotIndex) -> &BufferSlot {
        &self.slots[slot.index()]
    }

    /// Load `clip` for rotation position `rotation_index` into `slot`
    ///
    /// Always starts a fresh load, replacing whatever the slot held.
    pub fn load(&mut self, slot: SlotIndex, clip: &Arc<ClipRecord>, rotation_index: usize) -> LoadId {
        let load = allocate_load();
        self.slots[slot.index()] = BufferSlot {
            clip: Some(Arc::clone(clip)),
            rotation_index,
            load,
            ready: false,
            failed: false,
            play_count: 0,
        };

        debug!("Loaded '{}' into slot {} ({:?})", clip.id, slot, load);
        load
    }

    /// Like [`SlotPair::load`], but keeps a slot that already holds this
    /// occurrence so a completed preload is not thrown away
    pub fn ensure_loaded(&mut self, slot: SlotIndex, clip: &Arc<ClipRecord>, rotation_index: usize) -> Option<LoadId> {
        let current = &self.slots[slot.index()];
        if let Some(existing) = &current.clip {
            if existing.id == clip.id && current.rotation_index == rotation_index {
                debug!("Slot {} already holds '{}' for position {}", slot, clip.id, rotation_index);
                return None;
            }
        }

        Some(self.load(slot, clip, rotation_index))
    }

    /// Does `load` still describe what `slot` holds
    pub fn is_current(&self, slot: SlotIndex, load: LoadId) -> bool {
        let current = &self.slots[slot.index()];
        current.clip.is_some() && current.load == load
    }

    pub fn mark_ready(&mut self, slot: SlotIndex) {
        self.slots[slot.index()].ready = true;
    }

    pub fn mark_failed(&mut self, slot: SlotIndex) {
        self.slots[slot.index()].failed = true;
    }

    /// Restart the slot's clip from position zero
    ///
    /// Each play gets its own load id, so media events from the previous
    /// play no longer match. Readiness carries over.
    pub fn restart(&mut self, slot: SlotIndex) -> u32 {
        let state = &mut self.slots[slot.index()];
        state.load = allocate_load();
        state.play_count += 1;
        debug!("Slot {} restarted as load {:?} (play {})", slot, state.load, state.play_count);
        state.play_count
    }

    pub fn swap_visible(&mut self) {
        self.visible = self.visible.other();
    }

    /// Resting view of both slots: visible at full opacity, hidden at zero
    pub fn resting_views(&self, zoom_scale: f32) -> [BufferView; 2] {
        [SlotIndex::A, SlotIndex::B].map(|slot| {
            let on_screen = slot == self.visible && self.get(slot).clip.is_some();
            self.view(
                slot,
                if on_screen { 1.0 } else { 0.0 },
                if on_screen { 1.0 } else { zoom_scale },
                on_screen,
            )
        })
    }

    pub fn view(&self, slot: SlotIndex, opacity: f32, scale: f32, visible: bool) -> BufferView {
        let state = self.get(slot);
        match &state.clip {
            Some(clip) => BufferView {
                slot,
                clip_id: Some(clip.id.clone()),
                source: Some(clip.source.clone()),
                load: state.load,
                play_count: state.play_count,
                opacity,
                scale,
                visible,
            },
            None => BufferView::empty(slot),
        }
    }
}
