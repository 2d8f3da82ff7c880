use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::GestureThresholds,
    game::{head_from_landmarks, HeadPosition},
    oracle::{DispatchOutcome, OracleController},
};

use super::{
    camera::CameraLease,
    gesture::classify,
    recognizer::{FaceLandmarker, GestureRecognizer},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Consecutive recognizer failures tolerated before they are logged again.
const FAILURE_LOG_EVERY: u32 = 120;

/// Per-frame gesture recognition feeding the oracle controller.
///
/// Ticks that arrive late are skipped, so a slow recognizer drops frames
/// instead of building a backlog. Gestures recognized while the controller
/// is not accepting input are dropped with their frame.
pub async fn gesture_loop(
    mut camera: CameraLease,
    mut recognizer: Box<dyn GestureRecognizer>,
    controller: OracleController,
    thresholds: GestureThresholds,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poll_gesture(&mut camera, recognizer.as_mut(), &controller, &thresholds).await {
                    Ok(Some(outcome)) => {
                        failures = 0;
                        log_debug!("gesture dispatched: {outcome:?}");
                    }
                    Ok(None) => failures = 0,
                    Err(err) => {
                        if failures % FAILURE_LOG_EVERY == 0 {
                            log_warn!("gesture frame failed: {err:?}");
                        }
                        failures = failures.wrapping_add(1);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("gesture loop shutting down");
                break;
            }
        }
    }

    camera.release();
}

async fn poll_gesture(
    camera: &mut CameraLease,
    recognizer: &mut dyn GestureRecognizer,
    controller: &OracleController,
    thresholds: &GestureThresholds,
) -> Result<Option<DispatchOutcome>> {
    let Some(frame) = camera.grab()? else {
        return Ok(None);
    };
    if !frame.has_picture() {
        return Ok(None);
    }

    let Some(sample) = recognizer.recognize(&frame, frame.timestamp_ms())? else {
        return Ok(None);
    };
    // Recognition runs on every frame so a gesture shown while the oracle is
    // busy is spent on that frame instead of surfacing later.
    if !controller.accepts_gestures().await {
        return Ok(None);
    }
    let Some(event) = classify(&sample, thresholds) else {
        return Ok(None);
    };

    controller.handle_gesture(event).await.map(Some)
}

/// Per-frame face tracking publishing the head position for the catch game.
pub async fn face_loop(
    mut camera: CameraLease,
    mut landmarker: Box<dyn FaceLandmarker>,
    arena: (f32, f32),
    head_tx: watch::Sender<Option<HeadPosition>>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poll_face(&mut camera, landmarker.as_mut(), arena) {
                    Ok(Some(head)) => {
                        failures = 0;
                        head_tx.send_replace(head);
                    }
                    // No fresh frame: keep the last known position.
                    Ok(None) => {}
                    Err(err) => {
                        if failures % FAILURE_LOG_EVERY == 0 {
                            log_warn!("face frame failed: {err:?}");
                        }
                        failures = failures.wrapping_add(1);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("face loop shutting down");
                break;
            }
        }
    }

    head_tx.send_replace(None);
    camera.release();
}

/// `Ok(None)` means no frame; `Ok(Some(None))` means a frame without a face.
fn poll_face(
    camera: &mut CameraLease,
    landmarker: &mut dyn FaceLandmarker,
    (width, height): (f32, f32),
) -> Result<Option<Option<HeadPosition>>> {
    let Some(frame) = camera.grab()? else {
        return Ok(None);
    };
    if !frame.has_picture() {
        return Ok(None);
    }

    let head = landmarker
        .detect(&frame, frame.timestamp_ms())?
        .and_then(|landmarks| head_from_landmarks(&landmarks, width, height));
    Ok(Some(head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{CameraSettings, OracleConfig},
        oracle::OraclePhase,
        reading::{Reading, ReadingFuture, ReadingSource},
        vision::{camera::SyntheticCamera, GestureSample, Landmark, VideoFrame},
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    struct InstantReading;

    impl ReadingSource for InstantReading {
        fn request_reading(&self) -> ReadingFuture<'_> {
            Box::pin(async { Reading::fallback() })
        }
    }

    /// Replays a fixed list of labels, one per recognized frame.
    struct ScriptedRecognizer {
        script: Arc<Mutex<Vec<(&'static str, f32)>>>,
        frames: Arc<AtomicUsize>,
    }

    impl GestureRecognizer for ScriptedRecognizer {
        fn recognize(&mut self, _frame: &VideoFrame, _ts: i64) -> Result<Option<GestureSample>> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(None);
            }
            let (label, confidence) = script.remove(0);
            Ok(Some(GestureSample::new(label, confidence)))
        }
    }

    struct FixedFace(Option<Vec<Landmark>>);

    impl FaceLandmarker for FixedFace {
        fn detect(&mut self, _frame: &VideoFrame, _ts: i64) -> Result<Option<Vec<Landmark>>> {
            Ok(self.0.clone())
        }
    }

    async fn lease() -> CameraLease {
        CameraLease::acquire(Box::new(SyntheticCamera::new()), &CameraSettings::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn recognized_fist_opens_the_oracle() {
        let config = OracleConfig::default();
        let controller = OracleController::new(&config, Arc::new(InstantReading));
        controller.start().await.unwrap();

        let frames = Arc::new(AtomicUsize::new(0));
        let recognizer = ScriptedRecognizer {
            script: Arc::new(Mutex::new(vec![
                ("None", 0.9),
                ("Closed_Fist", 0.3),
                ("Closed_Fist", 0.9),
                ("Open_Palm", 0.9),
            ])),
            frames: frames.clone(),
        };

        let token = CancellationToken::new();
        let handle = tokio::spawn(gesture_loop(
            lease().await,
            Box::new(recognizer),
            controller.clone(),
            config.thresholds.clone(),
            config.poll_interval(),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.get_state().await.phase, OraclePhase::Opening);

        // The palm was shown while opening; it must not carry over to the reveal.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let snapshot = controller.get_snapshot().await;
        assert_eq!(snapshot.state.phase, OraclePhase::Revealed);
        assert!(!snapshot.exploding);
        assert!(frames.load(Ordering::SeqCst) > 4);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn face_loop_publishes_mirrored_head() {
        let landmarks = vec![Landmark::new(0.0, 0.0), Landmark::new(0.25, 0.5)];
        let (head_tx, head_rx) = watch::channel(None);
        let token = CancellationToken::new();

        let handle = tokio::spawn(face_loop(
            lease().await,
            Box::new(FixedFace(Some(landmarks))),
            (1000.0, 800.0),
            head_tx,
            Duration::from_millis(16),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*head_rx.borrow(), Some(HeadPosition { x: 750.0, y: 400.0 }));

        token.cancel();
        handle.await.unwrap();
        assert_eq!(*head_rx.borrow(), None);
    }
}
