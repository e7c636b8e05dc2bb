//! Clip records supplied by the external clip registry
//!
//! The scheduler treats records as read-only. A registry push is always a
//! full replacement: [`active_clips`] turns one snapshot into the sanitized,
//! ordered set the playlist builder consumes.

use crate::utils::error::{HeroReelError, IntoReelError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Featured weight used when a record does not carry one
pub const DEFAULT_FEATURED_WEIGHT: u32 = 3;

/// Stable clip identifier assigned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        ClipId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClipId {
    fn from(id: &str) -> Self {
        ClipId(id.to_string())
    }
}

/// Overlay text an operator attached to a clip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
}

/// One schedulable background clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    pub id: ClipId,

    /// Playable media URI, passed through unmodified
    #[serde(alias = "fileName", alias = "url")]
    pub source: String,

    /// Registry-side display hint
    #[serde(default)]
    pub order: i64,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub display_content: Option<DisplayContent>,

    #[serde(default)]
    pub use_custom_content: bool,

    /// Seconds to play before advancing; natural end when absent
    #[serde(default)]
    pub play_duration: Option<u32>,

    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,

    #[serde(default)]
    pub featured: bool,

    /// Approximate "1 in N" spacing for featured clips
    #[serde(default = "default_featured_weight")]
    pub featured_weight: u32,
}

fn default_true() -> bool {
    true
}

fn default_repeat_count() -> u32 {
    1
}

fn default_featured_weight() -> u32 {
    DEFAULT_FEATURED_WEIGHT
}

impl ClipRecord {
    /// Create an active, non-featured clip that plays once to its natural end
    pub fn new<I: Into<String>, S: Into<String>>(id: I, source: S) -> Self {
        Self {
            id: ClipId(id.into()),
            source: source.into(),
            order: 0,
            active: true,
            display_content: None,
            use_custom_content: false,
            play_duration: None,
            repeat_count: 1,
            featured: false,
            featured_weight: DEFAULT_FEATURED_WEIGHT,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_featured(mut self, weight: u32) -> Self {
        self.featured = true;
        self.featured_weight = weight;
        self
    }

    pub fn with_repeat_count(mut self, count: u32) -> Self {
        self.repeat_count = count;
        self
    }

    pub fn with_play_duration(mut self, secs: u32) -> Self {
        self.play_duration = Some(secs);
        self
    }

    pub fn with_content(mut self, content: DisplayContent) -> Self {
        self.display_content = Some(content);
        self.use_custom_content = true;
        self
    }

    /// Duration override as a [`Duration`]
    pub fn play_duration(&self) -> Option<Duration> {
        self.play_duration.map(|secs| Duration::from_secs(u64::from(secs)))
    }

    /// Check the invariants the scheduler relies on
    pub fn validate(&self) -> Result<()> {
        if self.id.0.trim().is_empty() {
            return Err(HeroReelError::invalid_clip("<empty>", "id must not be empty"));
        }
        if self.source.trim().is_empty() {
            return Err(HeroReelError::invalid_clip(self.id.as_str(), "source must not be empty"));
        }
        if self.repeat_count == 0 {
            return Err(HeroReelError::invalid_clip(self.id.as_str(), "repeatCount must be at least 1"));
        }
        if self.featured_weight == 0 {
            return Err(HeroReelError::invalid_clip(self.id.as_str(), "featuredWeight must be at least 1"));
        }
        if self.play_duration == Some(0) {
            return Err(HeroReelError::invalid_clip(self.id.as_str(), "playDuration must be positive"));
        }

        Ok(())
    }
}

/// Extract the schedulable set from a registry snapshot
///
/// Inactive records are excluded. Invalid records and repeated ids are
/// dropped with a warning instead of failing the whole refresh. The result
/// is stably sorted by `order`.
pub fn active_clips(records: &[ClipRecord]) -> Vec<Arc<ClipRecord>> {
    let mut seen = HashSet::new();
    let mut clips: Vec<Arc<ClipRecord>> = Vec::with_capacity(records.len());

    for record in records.iter().filter(|r| r.active) {
        if let Err(e) = record.validate() {
            warn!("Dropping clip from rotation: {}", e);
            continue;
        }
        if !seen.insert(record.id.clone()) {
            warn!("Dropping duplicate clip id '{}'", record.id);
            continue;
        }
        clips.push(Arc::new(record.clone()));
    }

    clips.sort_by_key(|clip| clip.order);
    clips
}

/// Parse a registry snapshot (JSON array of clip records)
pub fn parse_clip_set(json: &str) -> Result<Vec<ClipRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Load a registry snapshot from disk
pub fn load_clip_set(path: &Path) -> Result<Vec<ClipRecord>> {
    let contents = std::fs::read_to_string(path)
        .registry_err(&format!("Failed to read {}", path.display()))?;

    parse_clip_set(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_json_defaults() {
        let json = r#"[
            {"id": "a", "fileName": "https://cdn.example.com/a.mp4"},
            {"id": "b", "source": "/videos/b.mp4", "order": 2, "featured": true, "featuredWeight": 4,
             "repeatCount": 2, "playDuration": 8, "useCustomContent": true,
             "displayContent": {"title": "Welcome", "subtitle": "Since 1998"}}
        ]"#;

        let clips = parse_clip_set(json).unwrap();
        assert_eq!(clips.len(), 2);

        let a = &clips[0];
        assert_eq!(a.source, "https://cdn.example.com/a.mp4");
        assert!(a.active);
        assert_eq!(a.repeat_count, 1);
        assert!(!a.featured);
        assert_eq!(a.featured_weight, DEFAULT_FEATURED_WEIGHT);
        assert_eq!(a.play_duration(), None);

        let b = &clips[1];
        assert!(b.featured);
        assert_eq!(b.featured_weight, 4);
        assert_eq!(b.play_duration(), Some(Duration::from_secs(8)));
        let content = b.display_content.as_ref().unwrap();
        assert_eq!(content.title, "Welcome");
        assert_eq!(content.description, "");
    }

    #[test]
    fn test_malformed_snapshot() {
        let err = parse_clip_set(r#"[{"source": "x.mp4"}]"#).unwrap_err();
        assert!(matches!(err, HeroReelError::Registry(_)));
    }

    #[test]
    fn test_validate() {
        assert!(ClipRecord::new("a", "a.mp4").validate().is_ok());
        assert!(ClipRecord::new("a", "a.mp4").with_repeat_count(0).validate().is_err());
        assert!(ClipRecord::new("a", "a.mp4").with_featured(0).validate().is_err());
        assert!(ClipRecord::new("a", "a.mp4").with_play_duration(0).validate().is_err());
        assert!(ClipRecord::new("a", " ").validate().is_err());
        assert!(ClipRecord::new("", "a.mp4").validate().is_err());
    }

    #[test]
    fn test_active_clips_filters_and_orders() {
        let records = vec![
            ClipRecord::new("late", "late.mp4").with_order(5),
            ClipRecord::new("off", "off.mp4").with_active(false),
            ClipRecord::new("broken", "broken.mp4").with_repeat_count(0),
            ClipRecord::new("early", "early.mp4").with_order(1),
            ClipRecord::new("late", "dup.mp4").with_order(0),
            ClipRecord::new("tie", "tie.mp4").with_order(5),
        ];

        let ids: Vec<String> = active_clips(&records)
            .iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, vec!["early", "late", "tie"]);
    }

    #[test]
    fn test_load_clip_set_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips.json");
        std::fs::write(&path, r#"[{"id": "only", "source": "only.mp4"}]"#).unwrap();

        let clips = load_clip_set(&path).unwrap();
        assert_eq!(clips[0].id, ClipId::from("only"));

        let missing = load_clip_set(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(HeroReelError::Registry(_))));
    }
}
