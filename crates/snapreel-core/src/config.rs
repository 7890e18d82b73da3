// crates/snapreel-core/src/config.rs
//
// Editor tunables. Every field has a default so a partial JSON file (or no
// file at all) yields a working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::segment::{MAX_DURATION, MIN_SEGMENT_SECS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Selfie camera.
    #[default]
    User,
    /// Rear camera.
    Environment,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::User        => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

/// Timer presets offered by the record screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownPreset {
    Three,
    Ten,
}

impl CountdownPreset {
    pub fn secs(self) -> u32 {
        match self {
            CountdownPreset::Three => 3,
            CountdownPreset::Ten   => 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Total duration budget per session, seconds.
    pub max_duration:      f64,
    /// Takes shorter than this are dropped on stop.
    pub min_segment_secs:  f64,
    /// Countdown armed by `ArmDefaultCountdown`, seconds.
    pub default_countdown: u32,
    /// Cover candidates extracted after export.
    pub cover_frames:      usize,
    pub default_facing:    FacingMode,
    /// Base file name handed to the upload gateway.
    pub export_name:       String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_duration:      MAX_DURATION,
            min_segment_secs:  MIN_SEGMENT_SECS,
            default_countdown: 3,
            cover_frames:      8,
            default_facing:    FacingMode::User,
            export_name:       "clip".into(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }
}
