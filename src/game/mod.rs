pub mod controller;
pub mod head;
pub mod loop_worker;
pub mod state;

pub use controller::GameController;
pub use head::{head_from_landmarks, HeadPosition};
pub use loop_worker::GameEvent;
pub use state::{CatchGame, GameStatus};
