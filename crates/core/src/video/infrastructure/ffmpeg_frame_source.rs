use std::path::PathBuf;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_source::{CaptureError, FrameSource};

/// Decodes frames from a video file or a capture device via ffmpeg-next.
///
/// Devices are opened through libavdevice with an explicit input format
/// (`v4l2`, `avfoundation`, `dshow`, ...). Every decoded frame is converted
/// to RGB24.
pub struct FfmpegFrameSource {
    location: PathBuf,
    input_format: Option<String>,
    decode: Option<DecodeState>,
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    /// A finite source backed by a video file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: path.into(),
            input_format: None,
            decode: None,
        }
    }

    /// A live capture device such as `/dev/video0` with format `v4l2`.
    pub fn device(name: impl Into<PathBuf>, input_format: impl Into<String>) -> Self {
        Self {
            location: name.into(),
            input_format: Some(input_format.into()),
            decode: None,
        }
    }

    fn is_device(&self) -> bool {
        self.input_format.is_some()
    }

    fn location(&self) -> String {
        self.location.display().to_string()
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        let Some(format_name) = self.input_format.as_deref() else {
            return Ok(ffmpeg_next::format::input(&self.location)?);
        };

        ffmpeg_next::device::register_all();
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == format_name)
            .ok_or_else(|| format!("unknown capture input format '{format_name}'"))?;
        let ctx = ffmpeg_next::format::open_with(
            &self.location,
            &format,
            ffmpeg_next::Dictionary::new(),
        )?;
        Ok(ctx.input())
    }

    fn start(&self) -> Result<(DecodeState, StreamMetadata), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = StreamMetadata {
            width,
            height,
            fps,
            source: self.location(),
        };
        let state = DecodeState {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
        };
        Ok((state, metadata))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self) -> Result<StreamMetadata, CaptureError> {
        let (state, metadata) = self.start().map_err(|e| CaptureError::Open {
            location: self.location(),
            reason: e.to_string(),
        })?;
        log::info!(
            "Opened {} ({}x{} @ {:.2} fps)",
            metadata.source,
            metadata.width,
            metadata.height,
            metadata.fps
        );
        self.decode = Some(state);
        Ok(metadata)
    }

    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        let is_device = self.is_device();
        let location = self.location();
        let state = self.decode.as_mut().ok_or(CaptureError::NotOpen)?;

        loop {
            if let Some(frame) = state.try_receive()? {
                return Ok(Some(frame));
            }

            if state.flushing {
                if is_device {
                    return Err(CaptureError::Disconnected(location));
                }
                return Ok(None);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut state.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    // Drain frames still buffered in the decoder.
                    let _ = state.decoder.send_eof();
                    state.flushing = true;
                    continue;
                }
                Err(e) => {
                    return Err(CaptureError::Read {
                        index: state.frame_index,
                        reason: e.to_string(),
                    })
                }
            }

            if packet.stream() != state.video_stream_index {
                continue;
            }
            if let Err(e) = state.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
            }
        }
    }

    fn release(&mut self) {
        if self.decode.take().is_some() {
            log::debug!("Released {}", self.location());
        }
    }
}

impl DecodeState {
    fn try_receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Read {
                index: self.frame_index,
                reason: e.to_string(),
            })?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::render_sink::RenderSink;
    use crate::video::infrastructure::ffmpeg_render_sink::FfmpegRenderSink;
    use std::path::Path;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        let metadata = StreamMetadata {
            width,
            height,
            fps: 10.0,
            source: "test".to_string(),
        };
        let mut sink = FfmpegRenderSink::new(path);
        sink.open(&metadata).unwrap();
        for i in 0..num_frames {
            let value = ((i * 40) % 256) as u8;
            let data = vec![value; (width * height * 3) as usize];
            sink.render(&Frame::new(data, width, height, 3, i)).unwrap();
        }
        sink.close().unwrap();
    }

    fn read_all(source: &mut FfmpegFrameSource) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = source.read().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 3, 160, 120);

        let mut source = FfmpegFrameSource::file(&path);
        let meta = source.open().unwrap();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert!(meta.frame_rate().is_some());
        assert_eq!(meta.source, path.display().to_string());
    }

    #[test]
    fn test_open_nonexistent_file_fails() {
        let mut source = FfmpegFrameSource::file("/nonexistent/clip.mp4");
        let err = source.open().unwrap_err();
        assert!(matches!(err, CaptureError::Open { .. }));
    }

    #[test]
    fn test_open_unknown_device_format_fails() {
        let mut source = FfmpegFrameSource::device("/dev/video0", "no-such-format");
        let err = source.open().unwrap_err();
        assert!(matches!(err, CaptureError::Open { ref reason, .. } if reason.contains("no-such-format")));
    }

    #[test]
    fn test_read_without_open_fails() {
        let mut source = FfmpegFrameSource::file("unused.mp4");
        assert_eq!(source.read().unwrap_err(), CaptureError::NotOpen);
    }

    #[test]
    fn test_file_yields_all_frames_then_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 5, 64, 48);

        let mut source = FfmpegFrameSource::file(&path);
        source.open().unwrap();
        let frames = read_all(&mut source);
        assert_eq!(frames.len(), 5);
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_frames_are_rgb_with_sequential_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 4, 64, 48);

        let mut source = FfmpegFrameSource::file(&path);
        source.open().unwrap();
        for (i, frame) in read_all(&mut source).iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 64 * 48 * 3);
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 1, 64, 48);

        let mut source = FfmpegFrameSource::file(&path);
        source.open().unwrap();
        source.release();
        source.release();
        assert_eq!(source.read().unwrap_err(), CaptureError::NotOpen);
    }
}
