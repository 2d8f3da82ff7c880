use anyhow::{anyhow, Context, Result};
use tokio::time::{sleep, Duration};

use crate::config::CameraSettings;

use super::frame::VideoFrame;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// A video capture device.
pub trait CameraDevice: Send {
    /// Fails while the device is denied or still held by a previous owner.
    fn open(&mut self, width: u32, height: u32) -> Result<()>;

    /// Latest frame, or `None` if nothing new is available yet.
    fn grab(&mut self) -> Result<Option<VideoFrame>>;

    fn close(&mut self);
}

/// An opened camera; the device is closed when the lease is released or dropped.
pub struct CameraLease {
    device: Option<Box<dyn CameraDevice>>,
}

impl CameraLease {
    /// Opens `device`, retrying with exponential backoff while it is busy.
    pub async fn acquire(
        mut device: Box<dyn CameraDevice>,
        settings: &CameraSettings,
    ) -> Result<Self> {
        let attempts = settings.acquire_attempts.max(1);
        let mut delay = Duration::from_millis(settings.acquire_backoff_ms);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match device.open(settings.width, settings.height) {
                Ok(()) => {
                    log_info!(
                        "camera acquired at {}x{} (attempt {}/{})",
                        settings.width,
                        settings.height,
                        attempt,
                        attempts
                    );
                    return Ok(Self {
                        device: Some(device),
                    });
                }
                Err(err) => {
                    log_warn!("camera open attempt {attempt}/{attempts} failed: {err}");
                    last_err = Some(err);
                    if attempt < attempts {
                        sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("camera never opened")))
            .with_context(|| format!("camera unavailable after {attempts} attempts"))
    }

    pub fn grab(&mut self) -> Result<Option<VideoFrame>> {
        match self.device.as_mut() {
            Some(device) => device.grab(),
            None => Err(anyhow!("camera lease already released")),
        }
    }

    pub fn is_held(&self) -> bool {
        self.device.is_some()
    }

    /// Closes the device. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
            log_info!("camera released");
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera that produces blank frames of the requested size.
///
/// Stands in for real hardware when the recognizer does not look at pixels,
/// as with the keyboard-driven console.
#[derive(Debug, Default)]
pub struct SyntheticCamera {
    size: Option<(u32, u32)>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self, width: u32, height: u32) -> Result<()> {
        self.size = Some((width, height));
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<VideoFrame>> {
        let (width, height) = self.size.ok_or_else(|| anyhow!("camera is not open"))?;
        Ok(Some(VideoFrame::blank(width, height)))
    }

    fn close(&mut self) {
        self.size = None;
    }
}
