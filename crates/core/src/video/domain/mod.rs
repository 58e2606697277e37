pub mod frame_source;
pub mod render_sink;
