//! BlazeFace short-range face detector using ONNX Runtime via `ort`.
//!
//! Only used to locate the face; landmarks come from the face-mesh model.
use std::path::Path;

use super::execution_provider::build_session;
use super::tensor::{sample_nchw, sigmoid, PixelRange, SampleRect};
use crate::detection::domain::face_detector::{FaceBox, FaceDetector};
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model. Boxes scoring below `confidence` are
    /// discarded.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let input_tensor = sample_nchw(
            frame,
            SampleRect::full_frame(frame),
            INPUT_SIZE,
            PixelRange::Symmetric,
        );

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut dets = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            frame.width(),
            frame.height(),
        );
        Ok(nms(&mut dets, NMS_IOU_THRESH))
    }
}

/// Decode raw anchor outputs into frame-space boxes above `confidence`.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    frame_width: u32,
    frame_height: u32,
) -> Vec<FaceBox> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let size = INPUT_SIZE as f32;
    let mut dets = Vec::new();

    for (i, (&raw_score, anchor)) in score_data.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }

        let cx = anchor[0] + reg_data[offset] / size;
        let cy = anchor[1] + reg_data[offset + 1] / size;
        let w = reg_data[offset + 2] / size;
        let h = reg_data[offset + 3] / size;

        dets.push(FaceBox {
            x1: ((cx - w / 2.0) * fw).max(0.0) as f64,
            y1: ((cy - h / 2.0) * fh).max(0.0) as f64,
            x2: ((cx + w / 2.0) * fw).min(fw) as f64,
            y2: ((cy + h / 2.0) * fh).min(fh) as f64,
            score: score as f64,
        });
    }

    dets
}

/// Short-range anchors: a 16x16 grid with 2 anchors per cell followed by an
/// 8x8 grid with 6 per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

fn nms(dets: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceBox> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| k.iou(det) <= iou_thresh) {
            keep.push(*det);
        }
    }
    keep
}
