use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::render_sink::RenderSink;

/// Shows annotated frames in a desktop window.
///
/// Pressing `q` or Escape, or closing the window, raises the flag returned by
/// [`WindowRenderSink::stop_flag`], which the session polls as its stop
/// signal. Keys are read while a frame is presented, so the window must be
/// driven from the thread that opened it.
pub struct WindowRenderSink {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    quit: Arc<AtomicBool>,
}

// Safety: the window is created in `open` and only touched by the session
// thread that calls `render` and `close`.
unsafe impl Send for WindowRenderSink {}

impl WindowRenderSink {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            buffer: Vec::new(),
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set once the user asks to quit from the window.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    fn request_quit(&self) {
        if !self.quit.swap(true, Ordering::Relaxed) {
            log::info!("Quit requested from the display window");
        }
    }
}

impl RenderSink for WindowRenderSink {
    fn open(&mut self, metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>> {
        let options = WindowOptions {
            resize: true,
            ..WindowOptions::default()
        };
        let window = Window::new(
            &self.title,
            metadata.width as usize,
            metadata.height as usize,
            options,
        )?;
        self.window = Some(window);
        log::info!("Display window opened (press q or Esc to stop)");
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() < 3 {
            return Err(format!("cannot display a {}-channel frame", frame.channels()).into());
        }
        let window = self.window.as_mut().ok_or("display window not open")?;
        if !window.is_open() {
            self.request_quit();
            return Ok(());
        }

        pack_rgb(frame, &mut self.buffer);
        window.update_with_buffer(
            &self.buffer,
            frame.width() as usize,
            frame.height() as usize,
        )?;

        let quit = !window.is_open()
            || window.is_key_down(Key::Escape)
            || window
                .get_keys_pressed(KeyRepeat::No)
                .into_iter()
                .any(is_quit_key);
        if quit {
            self.request_quit();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.window = None;
        Ok(())
    }
}

fn is_quit_key(key: Key) -> bool {
    matches!(key, Key::Q | Key::Escape)
}

/// Packs RGB bytes into minifb's `0RGB` pixels.
fn pack_rgb(frame: &Frame, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        frame
            .data()
            .chunks_exact(frame.channels() as usize)
            .map(|px| (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stop_signal::StopSignal;

    #[test]
    fn test_pack_rgb_layout() {
        let frame = Frame::new(vec![255, 0, 0, 0, 128, 0, 0, 0, 1, 10, 20, 30], 2, 2, 3, 0);
        let mut out = vec![42; 9];
        pack_rgb(&frame, &mut out);
        assert_eq!(out, vec![0xFF0000, 0x008000, 0x000001, 0x0A141E]);
    }

    #[test]
    fn test_pack_rgb_ignores_alpha() {
        let frame = Frame::new(vec![1, 2, 3, 255], 1, 1, 4, 0);
        let mut out = Vec::new();
        pack_rgb(&frame, &mut out);
        assert_eq!(out, vec![0x010203]);
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(Key::Q));
        assert!(is_quit_key(Key::Escape));
        assert!(!is_quit_key(Key::W));
        assert!(!is_quit_key(Key::Space));
    }

    #[test]
    fn test_quit_request_stops_the_session() {
        let sink = WindowRenderSink::new("Video Feed");
        let mut stop = sink.stop_flag();
        assert!(!stop.should_stop(1));
        sink.request_quit();
        sink.request_quit();
        assert!(stop.should_stop(2));
    }

    #[test]
    fn test_render_before_open_is_an_error() {
        let mut sink = WindowRenderSink::new("Video Feed");
        let frame = Frame::new(vec![0; 12], 2, 2, 3, 0);
        assert!(sink.render(&frame).is_err());
        assert!(!sink.stop_flag().load(Ordering::Relaxed));
    }

    #[test]
    fn test_close_without_open_is_ok() {
        let mut sink = WindowRenderSink::new("Video Feed");
        sink.close().unwrap();
        sink.close().unwrap();
    }
}
