use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{config::OracleConfig, game::HeadPosition, oracle::OracleController};

use super::{
    camera::CameraLease,
    loop_worker::{face_loop, gesture_loop},
    recognizer::InputBackend,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum InputStatus {
    Stopped,
    Loading,
    Active,
    /// Camera, permission or model failure; the session keeps running without input.
    Unavailable(String),
}

impl fmt::Display for InputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputStatus::Stopped => f.write_str("Standby"),
            InputStatus::Loading => f.write_str("Loading Vision..."),
            InputStatus::Active => f.write_str("Detecting..."),
            InputStatus::Unavailable(_) => f.write_str("Camera Denied"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Gesture,
    Face,
}

/// Owns at most one running input loop and the camera it holds.
pub struct InputController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    kind: Option<InputKind>,
    status_tx: watch::Sender<InputStatus>,
}

impl InputController {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(InputStatus::Stopped);
        Self {
            handle: None,
            cancel_token: None,
            kind: None,
            status_tx,
        }
    }

    pub fn status(&self) -> watch::Receiver<InputStatus> {
        self.status_tx.subscribe()
    }

    pub fn current_status(&self) -> InputStatus {
        self.status_tx.borrow().clone()
    }

    pub fn active_kind(&self) -> Option<InputKind> {
        self.kind
    }

    /// Starts hand-gesture input for the oracle.
    ///
    /// When the camera or the model cannot be had the status turns
    /// `Unavailable` and `Ok` is still returned: the oracle keeps scanning.
    pub async fn start_gesture_input(
        &mut self,
        backend: &dyn InputBackend,
        controller: OracleController,
        config: &OracleConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("input already active");
        }
        self.status_tx.send_replace(InputStatus::Loading);

        let acquired = async {
            let recognizer = backend
                .gesture_recognizer()
                .context("gesture model failed to load")?;
            let camera = CameraLease::acquire(backend.camera(), &config.camera).await?;
            Ok::<_, anyhow::Error>((recognizer, camera))
        }
        .await;

        let (recognizer, camera) = match acquired {
            Ok(parts) => parts,
            Err(err) => {
                self.mark_unavailable(err);
                return Ok(());
            }
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(gesture_loop(
            camera,
            recognizer,
            controller,
            config.thresholds.clone(),
            config.poll_interval(),
            cancel_token.clone(),
        ));

        self.running(handle, cancel_token, InputKind::Gesture);
        Ok(())
    }

    /// Starts face tracking for the catch game; same failure rules as gesture input.
    pub async fn start_face_input(
        &mut self,
        backend: &dyn InputBackend,
        head_tx: watch::Sender<Option<HeadPosition>>,
        config: &OracleConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("input already active");
        }
        self.status_tx.send_replace(InputStatus::Loading);

        let acquired = async {
            let landmarker = backend
                .face_landmarker()
                .context("face model failed to load")?;
            let camera = CameraLease::acquire(backend.camera(), &config.camera).await?;
            Ok::<_, anyhow::Error>((landmarker, camera))
        }
        .await;

        let (landmarker, camera) = match acquired {
            Ok(parts) => parts,
            Err(err) => {
                self.mark_unavailable(err);
                return Ok(());
            }
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(face_loop(
            camera,
            landmarker,
            (config.game.arena_width, config.game.arena_height),
            head_tx,
            config.poll_interval(),
            cancel_token.clone(),
        ));

        self.running(handle, cancel_token, InputKind::Face);
        Ok(())
    }

    /// Stops the loop and waits for it to hand back the camera. Safe to call more than once.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.kind = None;

        let joined = if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("input loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        };

        self.status_tx.send_replace(InputStatus::Stopped);
        joined
    }

    fn running(&mut self, handle: JoinHandle<()>, cancel_token: CancellationToken, kind: InputKind) {
        info!("{kind:?} input active");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.kind = Some(kind);
        self.status_tx.send_replace(InputStatus::Active);
    }

    fn mark_unavailable(&mut self, err: anyhow::Error) {
        warn!("input unavailable: {err:#}");
        self.status_tx
            .send_replace(InputStatus::Unavailable(format!("{err:#}")));
    }
}

impl Default for InputController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        config::CameraSettings,
        oracle::OraclePhase,
        reading::{Reading, ReadingFuture, ReadingSource},
        vision::{
            camera::{tests::BusyCamera, CameraDevice, SyntheticCamera},
            FaceLandmarker, GestureRecognizer, GestureSample, Landmark, VideoFrame,
        },
    };
    use anyhow::anyhow;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    struct InstantReading;

    impl ReadingSource for InstantReading {
        fn request_reading(&self) -> ReadingFuture<'_> {
            Box::pin(async { Reading::fallback() })
        }
    }

    struct AlwaysFist;

    impl GestureRecognizer for AlwaysFist {
        fn recognize(&mut self, _frame: &VideoFrame, _ts: i64) -> anyhow::Result<Option<GestureSample>> {
            Ok(Some(GestureSample::new("Closed_Fist", 0.99)))
        }
    }

    struct CenteredFace;

    impl FaceLandmarker for CenteredFace {
        fn detect(&mut self, _frame: &VideoFrame, _ts: i64) -> anyhow::Result<Option<Vec<Landmark>>> {
            Ok(Some(vec![Landmark::new(0.5, 0.5); 2]))
        }
    }

    /// Backend whose camera is busy for a configurable number of opens.
    pub(crate) struct TestBackend {
        pub busy_for: u32,
        pub model_broken: bool,
        pub closes: Arc<AtomicU32>,
    }

    impl TestBackend {
        pub(crate) fn healthy() -> Self {
            Self {
                busy_for: 0,
                model_broken: false,
                closes: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl InputBackend for TestBackend {
        fn camera(&self) -> Box<dyn CameraDevice> {
            let mut camera = BusyCamera::new(self.busy_for);
            camera.closes = self.closes.clone();
            Box::new(camera)
        }

        fn gesture_recognizer(&self) -> anyhow::Result<Box<dyn GestureRecognizer>> {
            if self.model_broken {
                return Err(anyhow!("model download failed"));
            }
            Ok(Box::new(AlwaysFist))
        }

        fn face_landmarker(&self) -> anyhow::Result<Box<dyn FaceLandmarker>> {
            if self.model_broken {
                return Err(anyhow!("model download failed"));
            }
            Ok(Box::new(CenteredFace))
        }
    }

    fn fast_config() -> OracleConfig {
        OracleConfig {
            camera: CameraSettings {
                acquire_attempts: 2,
                acquire_backoff_ms: 10,
                ..CameraSettings::default()
            },
            ..OracleConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gesture_input_drives_the_controller_and_releases_the_camera() {
        let config = fast_config();
        let backend = TestBackend::healthy();
        let controller = OracleController::new(&config, Arc::new(InstantReading));
        controller.start().await.unwrap();

        let mut input = InputController::new();
        input
            .start_gesture_input(&backend, controller.clone(), &config)
            .await
            .unwrap();
        assert_eq!(input.current_status(), InputStatus::Active);
        assert_eq!(input.active_kind(), Some(InputKind::Gesture));
        assert!(input
            .start_gesture_input(&backend, controller.clone(), &config)
            .await
            .is_err());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(controller.get_state().await.phase, OraclePhase::Opening);

        input.stop().await.unwrap();
        input.stop().await.unwrap();
        assert_eq!(input.current_status(), InputStatus::Stopped);
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_camera_leaves_the_oracle_scanning() {
        let config = fast_config();
        let backend = TestBackend {
            busy_for: u32::MAX,
            ..TestBackend::healthy()
        };
        let controller = OracleController::new(&config, Arc::new(InstantReading));
        controller.start().await.unwrap();

        let mut input = InputController::new();
        input
            .start_gesture_input(&backend, controller.clone(), &config)
            .await
            .unwrap();

        assert!(matches!(input.current_status(), InputStatus::Unavailable(_)));
        assert_eq!(input.current_status().to_string(), "Camera Denied");
        assert_eq!(controller.get_state().await.phase, OraclePhase::Scanning);
        input.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn broken_model_is_reported_not_fatal() {
        let config = fast_config();
        let backend = TestBackend {
            model_broken: true,
            ..TestBackend::healthy()
        };
        let (head_tx, _head_rx) = watch::channel(None);

        let mut input = InputController::new();
        input.start_face_input(&backend, head_tx, &config).await.unwrap();

        match input.current_status() {
            InputStatus::Unavailable(reason) => assert!(reason.contains("face model")),
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(input.active_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn face_input_survives_a_busy_camera() {
        let config = fast_config();
        let backend = TestBackend {
            busy_for: 1,
            ..TestBackend::healthy()
        };
        let (head_tx, head_rx) = watch::channel(None);

        let mut input = InputController::new();
        input.start_face_input(&backend, head_tx, &config).await.unwrap();
        assert_eq!(input.active_kind(), Some(InputKind::Face));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let head = (*head_rx.borrow()).unwrap();
        assert_eq!(head.x, config.game.arena_width / 2.0);

        input.stop().await.unwrap();
    }

    #[test]
    fn synthetic_camera_needs_open() {
        let mut camera = SyntheticCamera::new();
        assert!(camera.grab().is_err());
        camera.open(4, 4).unwrap();
        assert!(camera.grab().unwrap().unwrap().has_picture());
    }
}
