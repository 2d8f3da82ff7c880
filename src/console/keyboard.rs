use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::vision::{
    CameraDevice, FaceLandmarker, GestureRecognizer, GestureSample, InputBackend, Landmark,
    SyntheticCamera, VideoFrame,
};

/// How far one `left`/`right` nudges the head, as a fraction of the frame.
const HEAD_STEP: f32 = 0.1;
/// The simulated head sits low in the frame, where fragments fall through.
const HEAD_Y: f32 = 0.8;

/// Keyboard stand-in for the hand and face models.
///
/// A typed gesture is shown on the next polled frame only, so it travels
/// through the same polling loop a camera frame would.
#[derive(Clone)]
pub struct KeyboardBackend {
    pending: Arc<Mutex<Option<String>>>,
    /// Nose x in screen space (already mirrored); `None` when the face is away.
    head_x: Arc<Mutex<Option<f32>>>,
}

impl KeyboardBackend {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
            head_x: Arc::new(Mutex::new(Some(0.5))),
        }
    }

    pub fn press(&self, label: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(label.to_string());
        }
    }

    /// Drops a gesture no loop has picked up yet.
    pub fn discard_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
    }

    pub fn nudge_head(&self, dx: f32) {
        if let Ok(mut head_x) = self.head_x.lock() {
            let current = head_x.unwrap_or(0.5);
            *head_x = Some((current + dx * HEAD_STEP).clamp(0.0, 1.0));
        }
    }

    pub fn center_head(&self) {
        if let Ok(mut head_x) = self.head_x.lock() {
            *head_x = Some(0.5);
        }
    }

    pub fn hide_head(&self) {
        if let Ok(mut head_x) = self.head_x.lock() {
            *head_x = None;
        }
    }
}

impl Default for KeyboardBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct KeyboardRecognizer {
    pending: Arc<Mutex<Option<String>>>,
}

impl GestureRecognizer for KeyboardRecognizer {
    fn recognize(&mut self, _frame: &VideoFrame, _timestamp_ms: i64) -> Result<Option<GestureSample>> {
        let label = self
            .pending
            .lock()
            .map_err(|_| anyhow!("keyboard gesture slot poisoned"))?
            .take();
        Ok(label.map(|label| GestureSample::new(label, 1.0)))
    }
}

struct KeyboardFace {
    head_x: Arc<Mutex<Option<f32>>>,
}

impl FaceLandmarker for KeyboardFace {
    fn detect(&mut self, _frame: &VideoFrame, _timestamp_ms: i64) -> Result<Option<Vec<Landmark>>> {
        let head_x = *self
            .head_x
            .lock()
            .map_err(|_| anyhow!("keyboard head slot poisoned"))?;

        // Landmarks arrive unmirrored, the way a camera sees the user.
        Ok(head_x.map(|x| {
            let nose = Landmark::new(1.0 - x, HEAD_Y);
            vec![nose, nose]
        }))
    }
}

impl InputBackend for KeyboardBackend {
    fn camera(&self) -> Box<dyn CameraDevice> {
        Box::new(SyntheticCamera::new())
    }

    fn gesture_recognizer(&self) -> Result<Box<dyn GestureRecognizer>> {
        Ok(Box::new(KeyboardRecognizer {
            pending: self.pending.clone(),
        }))
    }

    fn face_landmarker(&self) -> Result<Box<dyn FaceLandmarker>> {
        Ok(Box::new(KeyboardFace {
            head_x: self.head_x.clone(),
        }))
    }
}
