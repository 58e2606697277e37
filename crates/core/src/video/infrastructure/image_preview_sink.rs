use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::render_sink::RenderSink;

/// Periodically rewrites a PNG snapshot of the annotated stream.
///
/// Each snapshot is written next to the target and renamed over it, so a
/// viewer polling the file never sees a half-written image.
pub struct ImagePreviewSink {
    path: PathBuf,
    every_n_frames: usize,
    rendered: usize,
}

impl ImagePreviewSink {
    /// `every_n_frames` of zero is treated as one.
    pub fn new(path: impl Into<PathBuf>, every_n_frames: usize) -> Self {
        Self {
            path: path.into(),
            every_n_frames: every_n_frames.max(1),
            rendered: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_snapshot(&self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        let temp_path = self.temp_path();
        img.save_with_format(&temp_path, image::ImageFormat::Png)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl RenderSink for ImagePreviewSink {
    fn open(&mut self, _metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.rendered = 0;
        log::info!("Writing preview snapshots to {}", self.path.display());
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let due = self.rendered % self.every_n_frames == 0;
        self.rendered += 1;
        if due {
            self.write_snapshot(frame)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
