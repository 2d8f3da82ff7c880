use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{
    head::HeadPosition,
    loop_worker::{game_loop, GameEvent},
    state::CatchGame,
};

const EVENT_CAPACITY: usize = 64;

/// Runs the catch game loop and exposes the round controls.
pub struct GameController {
    game: Arc<Mutex<CatchGame>>,
    events: broadcast::Sender<GameEvent>,
    head_tx: watch::Sender<Option<HeadPosition>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl GameController {
    pub fn new(width: f32, height: f32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (head_tx, _) = watch::channel(None);
        Self {
            game: Arc::new(Mutex::new(CatchGame::new(width, height))),
            events,
            head_tx,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Sender the face input publishes head positions on.
    pub fn head_sender(&self) -> watch::Sender<Option<HeadPosition>> {
        self.head_tx.clone()
    }

    pub fn head_position(&self) -> Option<HeadPosition> {
        *self.head_tx.borrow()
    }

    pub async fn snapshot(&self) -> CatchGame {
        self.game.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn start_loop(&mut self, frame_interval: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("game loop already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(game_loop(
            self.game.clone(),
            self.head_tx.subscribe(),
            self.events.clone(),
            frame_interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Starts a fresh round; also the restart after game over.
    pub async fn begin_round(&self) {
        self.game.lock().await.start();
        info!("catch game round started");
        let _ = self.events.send(GameEvent::Started);
    }

    /// Stops the loop; the current round is kept for when the game resumes.
    pub async fn stop_loop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("game loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::GameStatus;

    #[tokio::test(start_paused = true)]
    async fn round_lifecycle() {
        let mut game = GameController::new(800.0, 600.0);
        let mut events = game.subscribe();

        game.start_loop(Duration::from_millis(16)).await.unwrap();
        assert!(game.start_loop(Duration::from_millis(16)).await.is_err());
        assert_eq!(game.snapshot().await.status, GameStatus::Ready);

        game.begin_round().await;
        assert_eq!(events.recv().await.unwrap(), GameEvent::Started);

        // Nobody is catching: the first fragment reaches the floor eventually.
        let over = loop {
            match events.recv().await.unwrap() {
                GameEvent::GameOver { score } => break score,
                _ => continue,
            }
        };
        assert_eq!(over, 0);

        game.stop_loop().await.unwrap();
        game.stop_loop().await.unwrap();
        assert!(!game.is_running());
    }

    #[test]
    fn head_sender_feeds_head_position() {
        let game = GameController::new(800.0, 600.0);
        game.head_sender()
            .send_replace(Some(HeadPosition { x: 1.0, y: 2.0 }));
        assert_eq!(game.head_position(), Some(HeadPosition { x: 1.0, y: 2.0 }));
    }
}
