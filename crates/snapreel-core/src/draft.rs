// crates/snapreel-core/src/draft.rs
//
// Draft: the serializable snapshot of an editing session that the external
// persistence gateway stores. The core only produces and consumes this
// shape; it never stores it durably.
//
// JSON field names follow the gateway contract (camelCase).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EditorError;
use crate::segment::Segment;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Friends,
    Private,
}

/// Background track picked for the clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSelection {
    pub id:          String,
    pub title:       String,
    pub artist:      String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Portion of the song that plays under the clip, in song seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongRegion {
    pub start: f64,
    pub end:   f64,
}

impl SongRegion {
    pub fn len(&self) -> f64 { (self.end - self.start).max(0.0) }
}

/// Everything about a session that is not the timeline itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDetails {
    pub selected_song: Option<SongSelection>,
    pub song_region:   Option<SongRegion>,
    /// 0.0–1.0
    pub music_volume:  f32,
    /// 0.0–1.0
    pub clip_volume:   f32,
    pub caption:       String,
    pub privacy:       Privacy,
}

impl Default for DraftDetails {
    fn default() -> Self {
        Self {
            selected_song: None,
            song_region:   None,
            music_volume:  0.5,
            clip_volume:   1.0,
            caption:       String::new(),
            privacy:       Privacy::Public,
        }
    }
}

impl DraftDetails {
    pub fn set_music_volume(&mut self, v: f32) { self.music_volume = v.clamp(0.0, 1.0); }

    pub fn set_clip_volume(&mut self, v: f32) { self.clip_volume = v.clamp(0.0, 1.0); }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id:            Uuid,
    /// Unix millis.
    pub created_at:    u64,
    pub segments:      Vec<Segment>,
    pub selected_song: Option<SongSelection>,
    pub song_region:   Option<SongRegion>,
    pub music_volume:  f32,
    pub clip_volume:   f32,
    pub caption:       String,
    pub privacy:       Privacy,
}

impl Draft {
    /// Build a draft from session state.
    ///
    /// Local media lives only in this process, so every segment must already
    /// point at a remote URI; otherwise the draft could never be restored.
    pub fn from_session(
        id:         Uuid,
        created_at: u64,
        segments:   &[Segment],
        details:    &DraftDetails,
    ) -> Result<Self, EditorError> {
        if let Some(local) = segments.iter().find(|s| s.media.is_local()) {
            return Err(EditorError::DraftSaveFailed(format!(
                "segment {} has not been uploaded yet", local.id,
            )));
        }
        Ok(Self {
            id,
            created_at,
            segments:      segments.to_vec(),
            selected_song: details.selected_song.clone(),
            song_region:   details.song_region,
            music_volume:  details.music_volume.clamp(0.0, 1.0),
            clip_volume:   details.clip_volume.clamp(0.0, 1.0),
            caption:       details.caption.clone(),
            privacy:       details.privacy,
        })
    }

    pub fn details(&self) -> DraftDetails {
        DraftDetails {
            selected_song: self.selected_song.clone(),
            song_region:   self.song_region,
            music_volume:  self.music_volume.clamp(0.0, 1.0),
            clip_volume:   self.clip_volume.clamp(0.0, 1.0),
            caption:       self.caption.clone(),
            privacy:       self.privacy,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
