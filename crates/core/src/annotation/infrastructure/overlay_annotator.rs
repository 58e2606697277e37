use image::Rgb;
use imageproc::drawing::draw_filled_circle_mut;

use crate::annotation::domain::frame_annotator::{FrameAnnotator, Overlay};
use crate::annotation::infrastructure::bitmap_font::{draw_text, text_width};
use crate::measurement::domain::point::Point;
use crate::monitoring::domain::drowsiness_tracker::HighlightColor;
use crate::shared::frame::Frame;

const MARKER_RADIUS: i32 = 2;
const TEXT_SCALE: u32 = 2;
const MARGIN: i64 = 10;
const FIRST_LINE: i64 = 30;
const SECOND_LINE: i64 = 55;
const ALARM_BANNER: &str = "STAY ALERT!";

/// CPU overlay: eye markers, EAR readout, closed-duration readout and the
/// alarm banner.
///
/// Markers are drawn before optional mirroring so they stay on the eyes;
/// text is drawn after so it reads left to right.
pub struct OverlayAnnotator {
    mirror: bool,
}

impl OverlayAnnotator {
    pub fn new(mirror: bool) -> Self {
        Self { mirror }
    }
}

impl Default for OverlayAnnotator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FrameAnnotator for OverlayAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        overlay: &Overlay,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let highlight = overlay.state.highlight.rgb();
        let alert = HighlightColor::Alert.rgb();

        if let Some(metric) = &overlay.metric {
            let markers: Vec<Point> = [metric.left.points, metric.right.points]
                .into_iter()
                .flatten()
                .flatten()
                .collect();
            if !markers.is_empty() {
                frame
                    .with_rgb_image(|img| {
                        for p in &markers {
                            let color = Rgb(highlight);
                            draw_filled_circle_mut(img, pixel_center(*p), MARKER_RADIUS, color);
                        }
                    })
                    .ok_or("markers need a packed RGB frame")?;
            }
        }

        if self.mirror {
            frame.flip_horizontal();
        }

        let right_edge = frame.width() as i64 - MARGIN;

        if let Some(metric) = &overlay.metric {
            let ear_text = format!("EAR: {:.2}", metric.ear);
            draw_text(frame, &ear_text, MARGIN, FIRST_LINE, TEXT_SCALE, highlight);

            let drowsy_text = format!("DROWSY: {:.3} Secs", overlay.state.closed_seconds());
            let x = right_aligned(&drowsy_text, right_edge);
            draw_text(frame, &drowsy_text, x, FIRST_LINE, TEXT_SCALE, alert);
        }

        if overlay.state.alarm_active {
            let x = right_aligned(ALARM_BANNER, right_edge);
            draw_text(frame, ALARM_BANNER, x, SECOND_LINE, TEXT_SCALE, alert);
        }

        Ok(())
    }
}

fn right_aligned(text: &str, right_edge: i64) -> i64 {
    (right_edge - text_width(text, TEXT_SCALE) as i64).max(MARGIN)
}

fn pixel_center(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}
