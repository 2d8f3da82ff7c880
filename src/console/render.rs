use crate::{
    game::GameEvent,
    oracle::{AppMode, OracleEvent, OraclePhase, RevealVariant},
    reading::Reading,
};

pub fn reading(reading: &Reading, variant: Option<RevealVariant>) -> String {
    let frame = variant.map(|v| v.as_str()).unwrap_or("Mystic Book");
    format!("  ~ {} ~\n  {}\n  ({})", reading.title, reading.prophecy, frame)
}

/// Console line for an oracle event, if it is worth showing.
pub fn oracle_event(event: &OracleEvent) -> Option<String> {
    match event {
        OracleEvent::StateChanged { snapshot, .. } if snapshot.state.mode == AppMode::Game => {
            Some("Catch the falling stars with your head. Type `begin`.".to_string())
        }
        OracleEvent::StateChanged { to, snapshot, .. } => match to {
            OraclePhase::Idle => None,
            OraclePhase::Scanning => Some("Show a CLOSED FIST to summon the book.".to_string()),
            OraclePhase::Opening => Some("The astrolabe turns... consulting the stars.".to_string()),
            OraclePhase::Revealed => snapshot.state.reading.as_ref().map(|r| {
                format!(
                    "{}\nShow an OPEN PALM to release it.",
                    reading(r, snapshot.state.reveal_variant)
                )
            }),
        },
        OracleEvent::ExplosionStarted { .. } => {
            Some("The page shatters into stardust.".to_string())
        }
        OracleEvent::CompletionDiscarded { .. } => None,
    }
}

pub fn game_event(event: &GameEvent) -> String {
    match event {
        GameEvent::Started => "SCORE: 0".to_string(),
        GameEvent::Caught { score } => format!("SCORE: {score}"),
        GameEvent::GameOver { score } => {
            format!("Connection Lost. Final score: {score}. Type `begin` to play again.")
        }
    }
}
