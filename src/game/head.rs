use serde::{Deserialize, Serialize};

use crate::vision::Landmark;

/// Index of the nose tip in the face mesh.
pub const NOSE_TIP: usize = 1;

/// Head position in arena pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HeadPosition {
    pub x: f32,
    pub y: f32,
}

impl HeadPosition {
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Projects the nose tip into the arena, mirrored horizontally like a selfie view.
pub fn head_from_landmarks(landmarks: &[Landmark], width: f32, height: f32) -> Option<HeadPosition> {
    let nose = landmarks.get(NOSE_TIP)?;
    Some(HeadPosition {
        x: (1.0 - nose.x) * width,
        y: nose.y * height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nose_is_mirrored_into_arena_pixels() {
        let landmarks = [Landmark::new(0.9, 0.9), Landmark::new(0.25, 0.5)];
        let head = head_from_landmarks(&landmarks, 1000.0, 800.0).unwrap();
        assert_eq!(head, HeadPosition { x: 750.0, y: 400.0 });
    }

    #[test]
    fn too_few_landmarks_means_no_head() {
        assert!(head_from_landmarks(&[Landmark::new(0.5, 0.5)], 100.0, 100.0).is_none());
        assert!(head_from_landmarks(&[], 100.0, 100.0).is_none());
    }

    #[test]
    fn distance() {
        let head = HeadPosition { x: 0.0, y: 0.0 };
        assert_eq!(head.distance_to(3.0, 4.0), 5.0);
    }
}
