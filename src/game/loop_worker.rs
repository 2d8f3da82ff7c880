use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{head::HeadPosition, state::CatchGame};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum GameEvent {
    Started,
    Caught { score: u32 },
    GameOver { score: u32 },
}

/// Advances the game once per frame using the freshest head position.
pub async fn game_loop(
    game: Arc<Mutex<CatchGame>>,
    head_rx: watch::Receiver<Option<HeadPosition>>,
    events: broadcast::Sender<GameEvent>,
    frame_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rng = StdRng::from_entropy();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let head = *head_rx.borrow();
                let (outcome, score) = {
                    let mut guard = game.lock().await;
                    let outcome = guard.tick(head, &mut rng);
                    (outcome, guard.score)
                };

                if outcome.caught > 0 {
                    let _ = events.send(GameEvent::Caught { score });
                }
                if outcome.game_over {
                    log_info!("catch game over with score {score}");
                    let _ = events.send(GameEvent::GameOver { score });
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("game loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{FallingItem, GameStatus};

    #[tokio::test(start_paused = true)]
    async fn catches_and_misses_are_broadcast() {
        let game = Arc::new(Mutex::new(CatchGame::new(800.0, 600.0)));
        {
            let mut guard = game.lock().await;
            guard.start();
            guard.items.push(FallingItem { id: 1, x: 400.0, y: 300.0, emoji: "🌟", speed: 3.0 });
            guard.items.push(FallingItem { id: 2, x: 50.0, y: 590.0, emoji: "🌙", speed: 3.0 });
        }

        let (_head_tx, head_rx) = watch::channel(Some(HeadPosition { x: 400.0, y: 310.0 }));
        let (events_tx, mut events) = broadcast::channel(16);
        let token = CancellationToken::new();

        let handle = tokio::spawn(game_loop(
            game.clone(),
            head_rx,
            events_tx,
            Duration::from_millis(16),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(events.recv().await.unwrap(), GameEvent::Caught { score: 1 });
        assert_eq!(events.recv().await.unwrap(), GameEvent::GameOver { score: 1 });
        assert_eq!(game.lock().await.status, GameStatus::GameOver);
    }
}
