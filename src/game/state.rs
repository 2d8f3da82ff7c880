use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use super::head::HeadPosition;

pub const EMOJIS: [&str; 8] = ["🌟", "🌙", "☀️", "🪐", "☄️", "🔮", "✨", "🧿"];
/// Frames between spawns at score zero.
pub const SPAWN_RATE: u64 = 60;
pub const MIN_SPAWN_INTERVAL: u64 = 20;
pub const GRAVITY_SPEED: f32 = 3.0;
pub const SPEED_PER_POINT: f32 = 0.1;
pub const CATCH_RADIUS: f32 = 60.0;
pub const SPAWN_Y: f32 = -50.0;
pub const SPAWN_MARGIN: f32 = 25.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Ready,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FallingItem {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub emoji: &'static str,
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub spawned: bool,
    pub caught: u32,
    pub game_over: bool,
}

/// The catch mini-game: fragments fall and the head catches them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchGame {
    pub status: GameStatus,
    pub score: u32,
    pub items: Vec<FallingItem>,
    pub width: f32,
    pub height: f32,
    frame: u64,
    next_id: u64,
}

impl CatchGame {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            status: GameStatus::Ready,
            score: 0,
            items: Vec::new(),
            width,
            height,
            frame: 0,
            next_id: 0,
        }
    }

    /// Begins a round, or restarts one after game over.
    pub fn start(&mut self) {
        self.status = GameStatus::Playing;
        self.score = 0;
        self.items.clear();
        self.frame = 0;
    }

    /// Frames between spawns, shrinking as the score grows.
    pub fn spawn_interval(&self) -> u64 {
        SPAWN_RATE
            .saturating_sub(u64::from(self.score / 5))
            .max(MIN_SPAWN_INTERVAL)
    }

    pub fn fall_speed(&self) -> f32 {
        GRAVITY_SPEED + self.score as f32 * SPEED_PER_POINT
    }

    /// Advances one frame. Items only move while playing.
    pub fn tick<R: Rng + ?Sized>(&mut self, head: Option<HeadPosition>, rng: &mut R) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.status != GameStatus::Playing {
            return outcome;
        }

        self.frame += 1;
        if self.frame % self.spawn_interval() == 0 {
            self.spawn(rng);
            outcome.spawned = true;
        }

        let floor = self.height;
        let mut caught = 0;
        let mut fell = false;
        for item in &mut self.items {
            item.y += item.speed;
        }
        // Catching and hitting the floor are judged independently, so a catch
        // below the floor still ends the round.
        self.items.retain(|item| {
            if item.y > floor {
                fell = true;
            }
            let hit = head.is_some_and(|head| head.distance_to(item.x, item.y) < CATCH_RADIUS);
            if hit {
                caught += 1;
            }
            !hit
        });

        self.score += caught;
        outcome.caught = caught;
        if fell {
            self.status = GameStatus::GameOver;
            outcome.game_over = true;
        }
        outcome
    }

    fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let span = (self.width - 2.0 * SPAWN_MARGIN).max(1.0);
        let item = FallingItem {
            id: self.next_id,
            x: rng.gen_range(0.0..span) + SPAWN_MARGIN,
            y: SPAWN_Y,
            emoji: EMOJIS.choose(rng).copied().unwrap_or("✨"),
            speed: self.fall_speed(),
        };
        self.next_id += 1;
        self.items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn nothing_moves_before_start() {
        let mut game = CatchGame::new(800.0, 600.0);
        let mut rng = rng();
        for _ in 0..200 {
            assert_eq!(game.tick(None, &mut rng), TickOutcome::default());
        }
        assert!(game.items.is_empty());
        assert_eq!(game.status, GameStatus::Ready);
    }

    #[test]
    fn spawns_on_the_interval_inside_the_margins() {
        let mut game = CatchGame::new(800.0, 600.0);
        let mut rng = rng();
        game.start();

        for _ in 0..59 {
            assert!(!game.tick(None, &mut rng).spawned);
        }
        assert!(game.tick(None, &mut rng).spawned);

        let item = &game.items[0];
        assert!(item.x >= SPAWN_MARGIN && item.x < 800.0 - SPAWN_MARGIN);
        assert_eq!(item.speed, GRAVITY_SPEED);
        assert!(EMOJIS.contains(&item.emoji));
    }

    #[test]
    fn difficulty_scales_with_score() {
        let mut game = CatchGame::new(800.0, 600.0);
        assert_eq!(game.spawn_interval(), 60);
        game.score = 50;
        assert_eq!(game.spawn_interval(), 50);
        assert!((game.fall_speed() - 8.0).abs() < 1e-4);
        game.score = 1000;
        assert_eq!(game.spawn_interval(), MIN_SPAWN_INTERVAL);
    }

    #[test]
    fn head_catches_nearby_items() {
        let mut game = CatchGame::new(800.0, 600.0);
        game.start();
        game.items.push(FallingItem {
            id: 99,
            x: 400.0,
            y: 297.0,
            emoji: "🔮",
            speed: 3.0,
        });

        let head = HeadPosition { x: 400.0, y: 340.0 };
        let outcome = game.tick(Some(head), &mut rng());

        assert_eq!(outcome.caught, 1);
        assert_eq!(game.score, 1);
        assert!(game.items.is_empty());
        assert_eq!(game.status, GameStatus::Playing);
    }

    #[test]
    fn a_missed_item_ends_the_round_and_start_resets() {
        let mut game = CatchGame::new(800.0, 600.0);
        game.start();
        game.score = 3;
        game.items.push(FallingItem {
            id: 1,
            x: 100.0,
            y: 599.0,
            emoji: "🌙",
            speed: 3.0,
        });

        let outcome = game.tick(Some(HeadPosition { x: 700.0, y: 100.0 }), &mut rng());
        assert!(outcome.game_over);
        assert_eq!(game.status, GameStatus::GameOver);

        game.start();
        assert_eq!(game.status, GameStatus::Playing);
        assert_eq!(game.score, 0);
        assert!(game.items.is_empty());
    }

    #[test]
    fn catch_below_the_floor_still_ends_the_round() {
        let mut game = CatchGame::new(800.0, 600.0);
        game.start();
        game.items.push(FallingItem {
            id: 7,
            x: 400.0,
            y: 599.0,
            emoji: "✨",
            speed: 3.0,
        });

        let outcome = game.tick(Some(HeadPosition { x: 400.0, y: 600.0 }), &mut rng());
        assert_eq!(outcome.caught, 1);
        assert_eq!(game.score, 1);
        assert!(outcome.game_over);
        assert_eq!(game.status, GameStatus::GameOver);
    }
}
