use chrono::{DateTime, Utc};
use image::RgbImage;

/// One captured camera frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
}

impl VideoFrame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A stream that has not produced its first picture reports a zero-sized frame.
    pub fn has_picture(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }
}
