//! The frame timeline: the ordered collection of frames that makes up an
//! animation, plus the playback settings that apply across it.
//!
//! The [`FrameStore`] exclusively owns every [`Frame`]. All mutations are
//! synchronous and atomic; a failed operation leaves the store untouched.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{FlipbookError, FlipbookResult};

/// Default display duration for frames that track the global setting.
pub const DEFAULT_GLOBAL_DURATION_MS: u64 = 500;

/// Display-ready image bytes (post-conversion). Immutable after creation:
/// replacing a frame's image means creating a new frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlob {
    #[serde(with = "base64_blob")]
    pub data: Arc<Vec<u8>>,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: Arc::new(data),
            mime_type: mime_type.into(),
        }
    }
}

/// Where an audio attachment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOrigin {
    Recorded,
    Uploaded,
}

/// An audio clip attached to a single frame. At most one per frame.
/// The bytes are immutable once attached; "replacing" audio swaps the
/// frame's reference rather than mutating shared data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    pub origin: AudioOrigin,
    #[serde(with = "base64_blob")]
    pub data: Arc<Vec<u8>>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(origin: AudioOrigin, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            origin,
            data: Arc::new(data),
            mime_type: mime_type.into(),
        }
    }
}

/// One unit of the animation: image + duration + optional audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Stable for the frame's lifetime; survives reordering. A duplicate
    /// gets a fresh id.
    pub id: Uuid,
    pub image: ImageBlob,
    pub duration_ms: u64,
    /// False means the frame tracks the global default duration; true means
    /// it is pinned and ignores future global-default changes.
    pub has_custom_duration: bool,
    #[serde(default)]
    pub audio: Option<AudioClip>,
}

impl Frame {
    /// Invariant: `duration_ms > 0`. Callers construct frames through the
    /// store, which validates durations before they reach this point.
    pub(crate) fn new(image: ImageBlob, duration_ms: u64) -> Self {
        debug_assert!(duration_ms > 0);
        Self {
            id: Uuid::new_v4(),
            image,
            duration_ms,
            has_custom_duration: false,
            audio: None,
        }
    }
}

/// Process-wide playback settings, mutated through the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    pub global_duration_ms: u64,
    pub loop_enabled: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            global_duration_ms: DEFAULT_GLOBAL_DURATION_MS,
            loop_enabled: true,
        }
    }
}

/// Ordered, exclusively-owned collection of frames.
///
/// Invariants: frame order is user-controlled and significant, ids are
/// unique within the sequence, and the sequence may be empty.
#[derive(Debug, Default)]
pub struct FrameStore {
    frames: Vec<Frame>,
    settings: PlaybackSettings,
    /// Id of the frame currently open in an edit context, if any.
    edit_cursor: Option<Uuid>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the store from a loaded project, replacing all state.
    /// Duplicate ids (a malformed document) are re-minted so the uniqueness
    /// invariant holds.
    pub fn from_parts(frames: Vec<Frame>, settings: PlaybackSettings) -> Self {
        let mut seen = std::collections::HashSet::new();
        let frames = frames
            .into_iter()
            .map(|mut frame| {
                if !seen.insert(frame.id) {
                    tracing::warn!(old_id = %frame.id, "duplicate frame id in document, re-minting");
                    frame.id = Uuid::new_v4();
                    seen.insert(frame.id);
                }
                frame
            })
            .collect();
        Self {
            frames,
            settings,
            edit_cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Clone of the current sequence, isolated from later mutations.
    /// Image and audio bytes are shared behind `Arc`, so this is cheap.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.clone()
    }

    fn check_index(&self, index: usize) -> FlipbookResult<()> {
        if index >= self.frames.len() {
            return Err(FlipbookError::IndexOutOfRange {
                index,
                len: self.frames.len(),
            });
        }
        Ok(())
    }

    /// Append a new frame tracking the global default duration.
    pub fn add_frame(&mut self, image: ImageBlob) -> &Frame {
        let frame = Frame::new(image, self.settings.global_duration_ms);
        tracing::debug!(id = %frame.id, "frame added");
        self.frames.push(frame);
        self.frames.last().unwrap()
    }

    /// Insert at `index`, clamped to `[0, len]`. If the frame's id collides
    /// with an existing one it is re-minted to keep ids unique.
    pub fn insert_frame(&mut self, index: usize, mut frame: Frame) {
        if self.frames.iter().any(|f| f.id == frame.id) {
            frame.id = Uuid::new_v4();
        }
        let index = index.min(self.frames.len());
        self.frames.insert(index, frame);
    }

    /// Insert an identical-content copy of frame `index` immediately after
    /// it. The copy gets a fresh id; its audio attachment is independent of
    /// the source's (clearing one never clears the other).
    pub fn duplicate_frame(&mut self, index: usize) -> FlipbookResult<&Frame> {
        self.check_index(index)?;
        let mut copy = self.frames[index].clone();
        copy.id = Uuid::new_v4();
        self.frames.insert(index + 1, copy);
        Ok(&self.frames[index + 1])
    }

    /// Remove the frame at `index`. If that frame is open in an edit
    /// context, the edit context is cleared.
    pub fn delete_frame(&mut self, index: usize) -> FlipbookResult<Frame> {
        self.check_index(index)?;
        let frame = self.frames.remove(index);
        if self.edit_cursor == Some(frame.id) {
            self.edit_cursor = None;
        }
        tracing::debug!(id = %frame.id, "frame deleted");
        Ok(frame)
    }

    /// Reorder in place, preserving all other frames' relative order.
    pub fn move_frame(&mut self, from: usize, to: usize) -> FlipbookResult<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let frame = self.frames.remove(from);
        self.frames.insert(to, frame);
        Ok(())
    }

    /// Set an explicit duration on one frame. The frame becomes pinned
    /// exactly when the new value differs from the prevailing global
    /// default; setting it back to the default un-pins it.
    pub fn update_duration(&mut self, index: usize, duration_ms: u64) -> FlipbookResult<()> {
        self.check_index(index)?;
        if duration_ms == 0 {
            return Err(FlipbookError::InvalidDuration(duration_ms));
        }
        let frame = &mut self.frames[index];
        frame.duration_ms = duration_ms;
        frame.has_custom_duration = duration_ms != self.settings.global_duration_ms;
        Ok(())
    }

    /// Change the global default duration. Every frame that tracks the
    /// default is re-stamped; pinned frames are untouched.
    pub fn set_global_duration(&mut self, duration_ms: u64) -> FlipbookResult<()> {
        if duration_ms == 0 {
            return Err(FlipbookError::InvalidDuration(duration_ms));
        }
        self.settings.global_duration_ms = duration_ms;
        for frame in &mut self.frames {
            if !frame.has_custom_duration {
                frame.duration_ms = duration_ms;
            }
        }
        Ok(())
    }

    pub fn attach_audio(&mut self, index: usize, clip: AudioClip) -> FlipbookResult<()> {
        self.check_index(index)?;
        tracing::debug!(index, origin = ?clip.origin, "audio attached");
        self.frames[index].audio = Some(clip);
        Ok(())
    }

    pub fn clear_audio(&mut self, index: usize) -> FlipbookResult<Option<AudioClip>> {
        self.check_index(index)?;
        Ok(self.frames[index].audio.take())
    }

    pub fn toggle_loop(&mut self, enabled: bool) {
        self.settings.loop_enabled = enabled;
    }

    /// Open the frame at `index` in an edit context.
    pub fn open_frame(&mut self, index: usize) -> FlipbookResult<&Frame> {
        self.check_index(index)?;
        self.edit_cursor = Some(self.frames[index].id);
        Ok(&self.frames[index])
    }

    pub fn close_editor(&mut self) {
        self.edit_cursor = None;
    }

    /// The frame currently open for editing, with its current index
    /// (the index may have shifted since it was opened).
    pub fn edited_frame(&self) -> Option<(usize, &Frame)> {
        let id = self.edit_cursor?;
        self.frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.id == id)
    }
}

/// Serde helper storing `Arc<Vec<u8>>` blobs as base64 strings, so project
/// documents stay valid JSON.
mod base64_blob {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(data: &Arc<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(data.as_slice()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Ok(Arc::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(tag: u8) -> ImageBlob {
        ImageBlob::new(vec![tag; 8], "image/png")
    }

    fn store_with(n: usize) -> FrameStore {
        let mut store = FrameStore::new();
        for i in 0..n {
            store.add_frame(blob(i as u8));
        }
        store
    }

    fn ids(store: &FrameStore) -> Vec<Uuid> {
        store.frames().iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_add_delete_tracks_length_and_unique_ids() {
        let mut store = store_with(4);
        store.delete_frame(1).unwrap();
        store.add_frame(blob(9));
        store.duplicate_frame(0).unwrap();
        assert_eq!(store.len(), 5);

        let ids = ids(&store);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_move_frame_round_trip_restores_order() {
        let mut store = store_with(5);
        let before = ids(&store);
        store.move_frame(1, 3).unwrap();
        assert_ne!(ids(&store), before);
        store.move_frame(3, 1).unwrap();
        assert_eq!(ids(&store), before);
    }

    #[test]
    fn test_move_frame_preserves_relative_order() {
        let mut store = store_with(4);
        let before = ids(&store);
        store.move_frame(0, 2).unwrap();
        let after = ids(&store);
        assert_eq!(after, vec![before[1], before[2], before[0], before[3]]);
    }

    #[test]
    fn test_move_frame_index_out_of_range() {
        let mut store = store_with(2);
        assert!(matches!(
            store.move_frame(0, 2),
            Err(FlipbookError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(store.move_frame(5, 0).is_err());
    }

    #[test]
    fn test_duplicate_frame_copies_content_with_fresh_id() {
        let mut store = store_with(1);
        store.update_duration(0, 750).unwrap();
        store
            .attach_audio(0, AudioClip::new(AudioOrigin::Recorded, vec![1, 2, 3], "audio/wav"))
            .unwrap();

        store.duplicate_frame(0).unwrap();
        assert_eq!(store.len(), 2);

        let (orig, copy) = (&store.frames()[0], &store.frames()[1]);
        assert_ne!(orig.id, copy.id);
        assert_eq!(copy.duration_ms, 750);
        assert!(copy.has_custom_duration);
        // Image bytes are shared, not re-copied.
        assert!(Arc::ptr_eq(&orig.image.data, &copy.image.data));
        assert_eq!(orig.audio, copy.audio);
    }

    #[test]
    fn test_duplicate_audio_is_independent() {
        let mut store = store_with(1);
        store
            .attach_audio(0, AudioClip::new(AudioOrigin::Uploaded, vec![7], "audio/mpeg"))
            .unwrap();
        store.duplicate_frame(0).unwrap();

        // Clearing the copy's audio must not touch the original's.
        store.clear_audio(1).unwrap();
        assert!(store.get(0).unwrap().audio.is_some());
        assert!(store.get(1).unwrap().audio.is_none());

        // And replacing the original's must not touch the copy's.
        store
            .attach_audio(0, AudioClip::new(AudioOrigin::Recorded, vec![8, 8], "audio/wav"))
            .unwrap();
        assert!(store.get(1).unwrap().audio.is_none());
    }

    #[test]
    fn test_duplicate_index_out_of_range() {
        let mut store = store_with(1);
        assert!(matches!(
            store.duplicate_frame(1),
            Err(FlipbookError::IndexOutOfRange { .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_frame_clamps_index() {
        let mut store = store_with(2);
        let frame = Frame::new(blob(9), 500);
        let id = frame.id;
        store.insert_frame(99, frame);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2).unwrap().id, id);
    }

    #[test]
    fn test_insert_frame_remints_colliding_id() {
        let mut store = store_with(1);
        let mut frame = Frame::new(blob(9), 500);
        frame.id = store.get(0).unwrap().id;
        store.insert_frame(0, frame);
        let ids = ids(&store);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_set_global_duration_respects_custom_pins() {
        let mut store = store_with(3);
        store.update_duration(1, 2000).unwrap();

        store.set_global_duration(250).unwrap();
        assert_eq!(store.get(0).unwrap().duration_ms, 250);
        assert_eq!(store.get(1).unwrap().duration_ms, 2000);
        assert_eq!(store.get(2).unwrap().duration_ms, 250);
    }

    #[test]
    fn test_update_duration_pins_and_unpins() {
        let mut store = store_with(1);
        assert!(!store.get(0).unwrap().has_custom_duration);

        store.update_duration(0, 900).unwrap();
        assert!(store.get(0).unwrap().has_custom_duration);

        // Setting the duration back to the global default un-pins it.
        let global = store.settings().global_duration_ms;
        store.update_duration(0, global).unwrap();
        assert!(!store.get(0).unwrap().has_custom_duration);
    }

    #[test]
    fn test_invalid_duration_rejected_without_mutation() {
        let mut store = store_with(1);
        assert!(matches!(
            store.update_duration(0, 0),
            Err(FlipbookError::InvalidDuration(0))
        ));
        assert_eq!(store.get(0).unwrap().duration_ms, DEFAULT_GLOBAL_DURATION_MS);

        assert!(store.set_global_duration(0).is_err());
        assert_eq!(store.settings().global_duration_ms, DEFAULT_GLOBAL_DURATION_MS);
    }

    #[test]
    fn test_delete_clears_edit_context() {
        let mut store = store_with(3);
        store.open_frame(1).unwrap();
        assert_eq!(store.edited_frame().map(|(i, _)| i), Some(1));

        store.delete_frame(1).unwrap();
        assert!(store.edited_frame().is_none());
    }

    #[test]
    fn test_delete_other_frame_keeps_edit_context() {
        let mut store = store_with(3);
        store.open_frame(2).unwrap();
        store.delete_frame(0).unwrap();
        // Still open, now at a shifted index.
        assert_eq!(store.edited_frame().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_from_parts_remints_duplicate_ids() {
        let frame = Frame::new(blob(1), 500);
        let twin = frame.clone();
        let store = FrameStore::from_parts(vec![frame, twin], PlaybackSettings::default());
        let ids = ids(&store);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_audio_attach_requires_valid_index() {
        let mut store = store_with(0);
        let clip = AudioClip::new(AudioOrigin::Recorded, vec![], "audio/wav");
        assert!(matches!(
            store.attach_audio(0, clip),
            Err(FlipbookError::IndexOutOfRange { .. })
        ));
        assert!(store.clear_audio(0).is_err());
    }

    #[test]
    fn test_frame_serializes_camel_case() {
        let mut frame = Frame::new(blob(1), 500);
        frame.audio = Some(AudioClip::new(AudioOrigin::Recorded, vec![1], "audio/wav"));
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("durationMs").is_some());
        assert!(json.get("hasCustomDuration").is_some());
        assert_eq!(json["audio"]["origin"], "recorded");
        assert!(json["image"]["mimeType"].is_string());
    }
}
