pub mod ffmpeg_frame_source;
pub mod ffmpeg_render_sink;
pub mod image_preview_sink;
pub mod window_render_sink;
