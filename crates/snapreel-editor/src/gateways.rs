// crates/snapreel-editor/src/gateways.rs
//
// External collaborators the editor talks to. The host application provides
// implementations (HTTP clients, database actions); the session only sees
// these traits.
//
//   DraftStore    durable draft persistence, per user
//   Uploader      object storage; returns a public URL
//   VideoCatalog  publishes metadata for an uploaded clip
//   RemoteFetcher downloads remote media when exporting a restored draft
//
// Gateway failures come back as anyhow errors and are mapped to EditorError
// at the session boundary.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use snapreel_core::draft::Draft;

pub use snapreel_media::{RemoteFetcher, Uploader};

pub trait DraftStore: Send + Sync {
    /// Persist `draft` for `user_id` and return the stored copy.
    fn save(&self, user_id: &str, draft: &Draft) -> Result<Draft>;
    fn load_all(&self, user_id: &str) -> Result<Vec<Draft>>;
    fn delete(&self, draft_id: Uuid, user_id: &str) -> Result<()>;
}

/// Catalogue entry for a published clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title:         String,
    pub description:   String,
    pub category:      String,
    pub video_url:     String,
    pub thumbnail_url: Option<String>,
    pub user_id:       String,
    /// Seconds.
    pub duration:      f64,
}

pub trait VideoCatalog: Send + Sync {
    /// Store `meta` and return the new video id.
    fn save_video(&self, meta: &VideoMetadata) -> Result<String>;
}

/// The set of collaborators handed to `EditorSession::open`.
#[derive(Clone)]
pub struct Gateways {
    pub drafts:   Arc<dyn DraftStore>,
    pub uploader: Arc<dyn Uploader>,
    pub catalog:  Arc<dyn VideoCatalog>,
    /// Needed only to export drafts whose media is remote.
    pub fetcher:  Option<Arc<dyn RemoteFetcher>>,
}

impl Gateways {
    pub fn new(
        drafts:   Arc<dyn DraftStore>,
        uploader: Arc<dyn Uploader>,
        catalog:  Arc<dyn VideoCatalog>,
    ) -> Self {
        Self { drafts, uploader, catalog, fetcher: None }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}
