use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::render_sink::RenderSink;

/// Frame rate used when the source does not report one.
const FALLBACK_FPS: i32 = 10;

/// Encodes annotated frames to a video file (MPEG-4 part 2) via ffmpeg-next.
pub struct FfmpegRenderSink {
    output_path: PathBuf,
    encoding: Option<Encoding>,
}

struct Encoding {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: usize,
}

// Safety: FfmpegRenderSink is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegRenderSink {}

impl FfmpegRenderSink {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            encoding: None,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl RenderSink for FfmpegRenderSink {
    fn open(&mut self, metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut octx = ffmpeg_next::format::output(&self.output_path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let fps = metadata
            .frame_rate()
            .map(|f| f.round() as i32)
            .filter(|&f| f > 0)
            .unwrap_or(FALLBACK_FPS);

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Recording annotated video to {} at {fps} fps",
            self.output_path.display()
        );
        self.encoding = Some(Encoding {
            octx,
            encoder,
            scaler,
            width: metadata.width,
            height: metadata.height,
            fps,
            frame_count: 0,
        });
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let enc = self.encoding.as_mut().ok_or("FfmpegRenderSink: not opened")?;
        if frame.width() != enc.width || frame.height() != enc.height {
            return Err(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                enc.width,
                enc.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            enc.width,
            enc.height,
        );

        let stride = rgb_frame.stride(0);
        let row_len = enc.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        for (row, src_row) in frame.data().chunks_exact(row_len).enumerate() {
            let dst_start = row * stride;
            data[dst_start..dst_start + row_len].copy_from_slice(src_row);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        enc.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(enc.frame_count as i64));

        enc.encoder.send_frame(&yuv_frame)?;
        enc.write_packets()?;

        enc.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut enc) = self.encoding.take() else {
            return Ok(());
        };

        enc.encoder.send_eof()?;
        enc.write_packets()?;
        enc.octx.write_trailer()?;

        log::info!(
            "Wrote {} frames to {}",
            enc.frame_count,
            self.output_path.display()
        );
        Ok(())
    }
}

impl Encoding {
    fn write_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or("output stream missing")?
            .time_base();

        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, self.fps), ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(width: u32, height: u32, fps: f64) -> StreamMetadata {
        StreamMetadata {
            width,
            height,
            fps,
            source: "test".to_string(),
        }
    }

    fn solid(width: u32, height: u32, value: u8, index: usize) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, 3, index)
    }

    #[test]
    fn test_writes_video_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let mut sink = FfmpegRenderSink::new(&path);
        sink.open(&metadata(64, 48, 30.0)).unwrap();
        for i in 0..3 {
            sink.render(&solid(64, 48, 100, i)).unwrap();
        }
        sink.close().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_missing_frame_rate_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let mut sink = FfmpegRenderSink::new(&path);
        sink.open(&metadata(64, 48, 0.0)).unwrap();
        sink.render(&solid(64, 48, 0, 0)).unwrap();
        sink.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_render_before_open_fails() {
        let mut sink = FfmpegRenderSink::new("unused.mp4");
        assert!(sink.render(&solid(8, 8, 0, 0)).is_err());
    }

    #[test]
    fn test_render_rejects_mismatched_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FfmpegRenderSink::new(dir.path().join("out.mp4"));
        sink.open(&metadata(64, 48, 30.0)).unwrap();
        assert!(sink.render(&solid(32, 24, 0, 0)).is_err());
        sink.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FfmpegRenderSink::new(dir.path().join("out.mp4"));
        sink.open(&metadata(64, 48, 30.0)).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
    }
}
