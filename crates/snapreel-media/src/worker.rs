// crates/snapreel-media/src/worker.rs
//
// ExportWorker: runs the export pipeline off the caller's thread.
//
//   combine ──▶ upload ──▶ extract cover frames ──▶ Done
//
// Every step reports `ExportResult::Progress` over the result channel and the
// session drains it with `try_recv` once per update. Each job owns a cancel
// flag keyed by its id; the flag is checked between steps and between frames,
// and a cancelled job reports `Error { msg: "cancelled" }`.
//
// Frame extraction is best-effort: a decoder that cannot be opened, or one
// that fails part-way, yields fewer cover candidates but never fails the job.
// The uploaded URL is what matters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use uuid::Uuid;

use snapreel_core::media_types::{ExportResult, ExportStage, ExportedClip, StillFrame};
use snapreel_core::Segment;

use crate::assemble::{combine, MediaResolver};
use crate::frames::{encode_pngs, extract_frames, FrameSource};

/// Sentinel message for a job stopped by `cancel_export`.
pub const CANCELLED: &str = "cancelled";

/// Uploads a finished asset and returns its public URL.
pub trait Uploader: Send + Sync {
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Everything the worker thread needs, captured by value at submit time.
/// Later edits to the session timeline do not affect a running job.
pub struct ExportJob {
    pub segments:     Vec<Segment>,
    pub resolver:     Arc<dyn MediaResolver>,
    pub uploader:     Arc<dyn Uploader>,
    pub frames:       Arc<dyn FrameSource>,
    pub cover_frames: usize,
    /// Upload object name, e.g. `clip-<uuid>.mp4`.
    pub name:         String,
    pub content_type: String,
}

pub struct ExportWorker {
    pub rx:   Receiver<ExportResult>,
    tx:       Sender<ExportResult>,
    shutdown: Arc<AtomicBool>,
    cancels:  Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl Default for ExportWorker {
    fn default() -> Self { Self::new() }
}

impl ExportWorker {
    pub fn new() -> Self {
        let (tx, rx) = bounded(256);
        Self {
            rx,
            tx,
            shutdown: Arc::new(AtomicBool::new(false)),
            cancels:  Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a thread for `job` and return its id.
    pub fn start_export(&self, job: ExportJob) -> Uuid {
        let job_id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let tx     = self.tx.clone();
        let sd     = Arc::clone(&self.shutdown);

        // Registered before spawn so an immediate cancel_export finds the flag.
        self.cancels.lock().insert(job_id, Arc::clone(&cancel));

        let cancels = Arc::clone(&self.cancels);
        thread::spawn(move || {
            let msg = if sd.load(Ordering::Relaxed) {
                Some("worker shutting down".to_string())
            } else {
                match run_export(job_id, job, &cancel, &tx) {
                    Ok(clip) => {
                        let _ = tx.send(ExportResult::Done { job_id, clip });
                        None
                    }
                    Err(e) => Some(format!("{e:#}")),
                }
            };
            if let Some(msg) = msg {
                if msg == CANCELLED {
                    tracing::info!("[export] job {job_id} cancelled");
                } else {
                    tracing::error!("[export] job {job_id} failed: {msg}");
                }
                let _ = tx.send(ExportResult::Error { job_id, msg });
            }
            cancels.lock().remove(&job_id);
        });

        tracing::info!("[export] job {job_id} started");
        job_id
    }

    /// Ask job `job_id` to stop at its next checkpoint. Unknown ids are ignored.
    pub fn cancel_export(&self, job_id: Uuid) {
        if let Some(flag) = self.cancels.lock().get(&job_id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Number of jobs that have not yet finished.
    pub fn active_jobs(&self) -> usize {
        self.cancels.lock().len()
    }

    /// Cancel everything in flight and refuse new jobs.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for flag in self.cancels.lock().values() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        anyhow::bail!(CANCELLED);
    }
    Ok(())
}

fn progress(tx: &Sender<ExportResult>, job_id: Uuid, stage: ExportStage, done: usize, total: usize) {
    let _ = tx.send(ExportResult::Progress { job_id, stage, done, total });
}

fn run_export(job_id: Uuid, job: ExportJob, cancel: &AtomicBool, tx: &Sender<ExportResult>) -> Result<ExportedClip> {
    check_cancel(cancel)?;
    progress(tx, job_id, ExportStage::Combining, 0, 1);
    let asset = combine(&job.segments, job.resolver.as_ref())?;
    progress(tx, job_id, ExportStage::Combining, 1, 1);

    check_cancel(cancel)?;
    progress(tx, job_id, ExportStage::Uploading, 0, 1);
    let url = job.uploader.upload(&job.name, &asset.bytes, &job.content_type)?;
    progress(tx, job_id, ExportStage::Uploading, 1, 1);
    tracing::info!("[export] uploaded {} bytes → {url}", asset.bytes.len());

    check_cancel(cancel)?;
    let total = job.cover_frames;
    let mut frames: Vec<StillFrame> = Vec::with_capacity(total);
    progress(tx, job_id, ExportStage::ExtractingFrames, 0, total);
    match job.frames.open(&asset) {
        Ok(decoder) => {
            for frame in extract_frames(decoder, asset.duration, total) {
                frames.push(frame);
                progress(tx, job_id, ExportStage::ExtractingFrames, frames.len(), total);
                check_cancel(cancel)?;
            }
        }
        Err(e) => tracing::warn!("[export] no cover frames: {e:#}"),
    }
    if frames.len() < total {
        tracing::warn!("[export] {} of {total} cover frame(s) decoded", frames.len());
    }

    check_cancel(cancel)?;
    let (frames, covers) = encode_covers(frames);

    Ok(ExportedClip { url, duration: asset.duration, parts: asset.parts, frames, covers })
}

/// PNG-encode the cover candidates in parallel. A frame that fails to encode
/// is dropped along with its PNG so the two lists stay paired.
fn encode_covers(frames: Vec<StillFrame>) -> (Vec<StillFrame>, Vec<Vec<u8>>) {
    let encoded = encode_pngs(&frames);
    frames.into_iter()
        .zip(encoded)
        .filter_map(|(frame, png)| match png {
            Ok(png) => Some((frame, png)),
            Err(e)  => {
                tracing::warn!("[export] cover at {:.2}s dropped: {e:#}", frame.timestamp);
                None
            }
        })
        .unzip()
}
