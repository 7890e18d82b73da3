// crates/snapreel-editor/src/log.rs
//
// Log sink for the editor.
//
// Hosts embedding the editor often have no console attached, so records go to
// a file in the OS temp directory instead of stderr.
//
// File: $TMPDIR/snapreel.log (override with SNAPREEL_LOG), append-only.
//
// Usage:
//   snapreel_editor::log::init_tracing();
//   tracing::info!("[session] opened");
//
// Only the first call installs a subscriber. If the host already set a global
// subscriber, ours is dropped silently.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

static TRACING_INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

pub fn log_path() -> PathBuf {
    std::env::var("SNAPREEL_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("snapreel.log"))
}

/// Install the file subscriber. Returns the log path when logging is active.
pub fn init_tracing() -> Option<PathBuf> {
    TRACING_INIT.get_or_init(|| {
        let path = log_path();
        let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
        let subscriber = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok()?;
        Some(path)
    }).clone()
}
