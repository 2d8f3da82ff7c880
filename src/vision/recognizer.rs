use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{frame::VideoFrame, gesture::GestureSample};

/// Normalized image coordinates, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Hand gesture model: at most one category per frame.
pub trait GestureRecognizer: Send {
    fn recognize(&mut self, frame: &VideoFrame, timestamp_ms: i64)
        -> Result<Option<GestureSample>>;
}

/// Face landmark model: the keypoints of the first face in view, if any.
pub trait FaceLandmarker: Send {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: i64) -> Result<Option<Vec<Landmark>>>;
}

/// Supplies the devices and models the input loops run on.
///
/// Model loading happens here, so a failure surfaces as unavailable input
/// instead of a crash.
pub trait InputBackend: Send + Sync {
    fn camera(&self) -> Box<dyn super::camera::CameraDevice>;
    fn gesture_recognizer(&self) -> Result<Box<dyn GestureRecognizer>>;
    fn face_landmarker(&self) -> Result<Box<dyn FaceLandmarker>>;
}
