//! Project persistence: a JSON snapshot of the timeline plus playback
//! settings, round-trippable through `save` then `load`.
//!
//! Loading fully replaces the current state, never merges. Absent fields
//! fall back to defaults so older or hand-edited documents still open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::timeline::{Frame, FrameStore, PlaybackSettings, DEFAULT_GLOBAL_DURATION_MS};
use crate::FlipbookResult;

fn default_name() -> String {
    "Untitled animation".to_string()
}

fn default_global_duration() -> u64 {
    DEFAULT_GLOBAL_DURATION_MS
}

fn default_loop() -> bool {
    true
}

/// The serialization unit: everything needed to restore a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default = "default_global_duration")]
    pub global_duration_ms: u64,
    #[serde(default = "default_loop")]
    pub loop_enabled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ProjectDocument {
    /// Capture the current timeline and settings under `name`.
    pub fn snapshot(name: impl Into<String>, store: &FrameStore) -> Self {
        Self {
            name: name.into(),
            frames: store.snapshot(),
            global_duration_ms: store.settings().global_duration_ms,
            loop_enabled: store.settings().loop_enabled,
            created_at: Utc::now(),
        }
    }

    /// Rebuild a store from this document, replacing all prior state.
    /// Non-positive durations in a hand-edited document are coerced back to
    /// the default rather than violating the store's invariant.
    pub fn into_store(self) -> FrameStore {
        let global_duration_ms = if self.global_duration_ms == 0 {
            tracing::warn!("document has zero global duration, using default");
            DEFAULT_GLOBAL_DURATION_MS
        } else {
            self.global_duration_ms
        };

        let frames = self
            .frames
            .into_iter()
            .map(|mut frame| {
                if frame.duration_ms == 0 {
                    tracing::warn!(id = %frame.id, "frame has zero duration, using global default");
                    frame.duration_ms = global_duration_ms;
                    frame.has_custom_duration = false;
                }
                frame
            })
            .collect();

        FrameStore::from_parts(
            frames,
            PlaybackSettings {
                global_duration_ms,
                loop_enabled: self.loop_enabled,
            },
        )
    }

    pub fn to_json(&self) -> FlipbookResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> FlipbookResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> FlipbookResult<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(?path, frames = self.frames.len(), "project saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> FlipbookResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let doc = Self::from_json(&json)?;
        tracing::info!(?path, frames = doc.frames.len(), "project loaded");
        Ok(doc)
    }

    /// Download name convention for saved projects.
    pub fn suggested_filename() -> String {
        format!("animation-{}.json", Utc::now().timestamp_millis())
    }
}
