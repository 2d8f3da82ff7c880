use std::sync::Arc;

use anyhow::{bail, Result};
use log::{info, warn};
use tokio::sync::{watch, Mutex};

use crate::{
    config::OracleConfig,
    game::GameController,
    oracle::{AppMode, OracleController, SessionSnapshot},
    reading::ReadingSource,
    vision::{InputBackend, InputController, InputStatus},
};

/// Everything one running session owns: the oracle, its input loop and the game.
///
/// `start` and `shutdown` are both idempotent.
pub struct OracleApp {
    config: OracleConfig,
    backend: Arc<dyn InputBackend>,
    oracle: OracleController,
    input: Mutex<InputController>,
    game: Mutex<GameController>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    ShutDown,
}

impl OracleApp {
    pub fn new(
        config: OracleConfig,
        reading_source: Arc<dyn ReadingSource>,
        backend: Arc<dyn InputBackend>,
    ) -> Self {
        let oracle = OracleController::new(&config, reading_source);
        let game = GameController::new(config.game.arena_width, config.game.arena_height);

        Self {
            config,
            backend,
            oracle,
            input: Mutex::new(InputController::new()),
            game: Mutex::new(game),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    pub fn oracle(&self) -> &OracleController {
        &self.oracle
    }

    pub async fn input_status(&self) -> watch::Receiver<InputStatus> {
        self.input.lock().await.status()
    }

    pub async fn current_input_status(&self) -> InputStatus {
        self.input.lock().await.current_status()
    }

    pub async fn subscribe_game(&self) -> tokio::sync::broadcast::Receiver<crate::game::GameEvent> {
        self.game.lock().await.subscribe()
    }

    pub async fn game_snapshot(&self) -> crate::game::CatchGame {
        self.game.lock().await.snapshot().await
    }

    /// Starts the oracle and the input matching the current mode.
    pub async fn start(&self) -> Result<SessionSnapshot> {
        let mut lifecycle = self.lifecycle.lock().await;
        if *lifecycle != Lifecycle::Created {
            return Ok(self.oracle.get_snapshot().await);
        }

        let snapshot = self.oracle.start().await?;
        self.start_input_for(snapshot.state.mode).await?;
        *lifecycle = Lifecycle::Running;
        info!("session {} started", snapshot.state.session_id);
        Ok(snapshot)
    }

    /// Switches mode, handing the camera from one input loop to the other.
    ///
    /// Holds the lifecycle lock throughout. Refused after shutdown.
    pub async fn switch_mode(&self, mode: AppMode) -> Result<SessionSnapshot> {
        let lifecycle = self.lifecycle.lock().await;
        if *lifecycle == Lifecycle::ShutDown {
            bail!("session already shut down");
        }

        let previous = self.oracle.get_state().await.mode;
        let snapshot = self.oracle.switch_mode(mode).await?;

        if *lifecycle != Lifecycle::Running || previous == mode {
            return Ok(snapshot);
        }

        self.stop_input().await;
        self.start_input_for(mode).await?;
        Ok(snapshot)
    }

    pub async fn begin_game_round(&self) -> Result<()> {
        let mode = self.oracle.get_state().await.mode;
        if mode != AppMode::Game {
            bail!("the catch game only runs in game mode");
        }
        self.game.lock().await.begin_round().await;
        Ok(())
    }

    /// Stops every loop and pending timer. Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if *lifecycle == Lifecycle::ShutDown {
            return;
        }

        self.stop_input().await;
        self.oracle.shutdown().await;
        *lifecycle = Lifecycle::ShutDown;
        info!("session shut down");
    }

    async fn start_input_for(&self, mode: AppMode) -> Result<()> {
        let mut input = self.input.lock().await;
        match mode {
            AppMode::Oracle => {
                input
                    .start_gesture_input(self.backend.as_ref(), self.oracle.clone(), &self.config)
                    .await
            }
            AppMode::Game => {
                let mut game = self.game.lock().await;
                input
                    .start_face_input(self.backend.as_ref(), game.head_sender(), &self.config)
                    .await?;
                game.start_loop(self.config.poll_interval()).await
            }
        }
    }

    async fn stop_input(&self) {
        if let Err(err) = self.input.lock().await.stop().await {
            warn!("input loop did not stop cleanly: {err:#}");
        }
        if let Err(err) = self.game.lock().await.stop_loop().await {
            warn!("game loop did not stop cleanly: {err:#}");
        }
    }
}
