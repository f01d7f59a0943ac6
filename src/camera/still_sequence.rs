use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use image::DynamicImage;

use super::{CameraProvider, VideoSource};
use crate::error::{MonitorError, MonitorResult};

const STILL_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Camera backed by a directory of still images, replayed in name order.
///
/// Stands in for an external stream URL: each `current_frame` call advances
/// to the next still and wraps around at the end.
pub struct StillSequenceCamera {
    dir: PathBuf,
}

impl StillSequenceCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CameraProvider for StillSequenceCamera {
    async fn acquire(&self) -> MonitorResult<Arc<dyn VideoSource>> {
        let dir = self.dir.clone();
        let frames = tokio::task::spawn_blocking(move || list_stills(&dir))
            .await
            .map_err(|err| MonitorError::MediaAccess(format!("frame listing worker failed: {err}")))??;

        log::info!(
            "Acquired still sequence {} ({} frames)",
            self.dir.display(),
            frames.len()
        );

        Ok(Arc::new(StillSequenceSource {
            label: self.dir.display().to_string(),
            frames,
            cursor: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }))
    }
}

fn list_stills(dir: &Path) -> MonitorResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| {
        MonitorError::MediaAccess(format!("cannot open {}: {err}", dir.display()))
    })?;

    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    if frames.is_empty() {
        return Err(MonitorError::MediaAccess(format!(
            "no image frames in {}",
            dir.display()
        )));
    }
    Ok(frames)
}

struct StillSequenceSource {
    label: String,
    frames: Vec<PathBuf>,
    cursor: AtomicUsize,
    released: AtomicBool,
}

impl VideoSource for StillSequenceSource {
    fn current_frame(&self) -> Option<DynamicImage> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.frames.len();
        let path = &self.frames[index];
        match image::open(path) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!("Skipping unreadable frame {}: {err}", path.display());
                None
            }
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
