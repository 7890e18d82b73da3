// crates/snapreel-editor/src/lib.rs
//
// The clip editor as a host application sees it: one EditorSession per
// editing screen, fed EditorCommands and a per-frame update(dt), talking to
// the outside world through the gateway traits.

pub mod export;
pub mod gateways;
pub mod log;
pub mod session;

pub use export::PublishDetails;
pub use gateways::{DraftStore, Gateways, RemoteFetcher, Uploader, VideoCatalog, VideoMetadata};
pub use session::{EditorSession, Notice, SessionError};
pub use snapreel_core::commands::EditorCommand;
pub use snapreel_core::EditorConfig;
