use std::str::FromStr;

use anyhow::bail;

use crate::{
    app::OracleApp,
    oracle::{AppMode, SessionSnapshot},
};

use super::{keyboard::KeyboardBackend, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadMove {
    Left,
    Right,
    Center,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Fist,
    Palm,
    Reset,
    Mode(AppMode),
    BeginRound,
    Head(HeadMove),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> anyhow::Result<Self> {
        let command = match input.trim().to_ascii_lowercase().as_str() {
            "fist" | "f" => ConsoleCommand::Fist,
            "palm" | "p" => ConsoleCommand::Palm,
            "reset" | "r" => ConsoleCommand::Reset,
            "oracle" => ConsoleCommand::Mode(AppMode::Oracle),
            "game" => ConsoleCommand::Mode(AppMode::Game),
            "begin" | "b" => ConsoleCommand::BeginRound,
            "left" | "a" => ConsoleCommand::Head(HeadMove::Left),
            "right" | "d" => ConsoleCommand::Head(HeadMove::Right),
            "center" => ConsoleCommand::Head(HeadMove::Center),
            "away" => ConsoleCommand::Head(HeadMove::Away),
            "status" | "s" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command `{other}` (type `help`)"),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  fist | palm          show a gesture to the camera
  reset                put the revealed reading away
  oracle | game        switch mode
  begin                start or restart the catch game
  left | right         move your head
  center | away        recenter your head, or leave the frame
  status               print the session
  quit                 leave";

/// Runs one command against the session, returning the line to print.
pub async fn execute(
    command: ConsoleCommand,
    app: &OracleApp,
    keyboard: &KeyboardBackend,
) -> Result<Option<String>, String> {
    match command {
        ConsoleCommand::Fist => {
            keyboard.press("Closed_Fist");
            Ok(None)
        }
        ConsoleCommand::Palm => {
            keyboard.press("Open_Palm");
            Ok(None)
        }
        ConsoleCommand::Reset => app
            .oracle()
            .reset()
            .await
            .map(|_| None)
            .map_err(|e| e.to_string()),
        ConsoleCommand::Mode(mode) => {
            keyboard.discard_pending();
            app.switch_mode(mode)
                .await
                .map(|_| None)
                .map_err(|e| e.to_string())
        }
        ConsoleCommand::BeginRound => app
            .begin_game_round()
            .await
            .map(|_| None)
            .map_err(|e| e.to_string()),
        ConsoleCommand::Head(head_move) => {
            match head_move {
                HeadMove::Left => keyboard.nudge_head(-1.0),
                HeadMove::Right => keyboard.nudge_head(1.0),
                HeadMove::Center => keyboard.center_head(),
                HeadMove::Away => keyboard.hide_head(),
            }
            Ok(None)
        }
        ConsoleCommand::Status => {
            let snapshot = app.oracle().get_snapshot().await;
            let input = app.current_input_status().await;
            Ok(Some(status_line(&snapshot, &input.to_string())))
        }
        ConsoleCommand::Help => Ok(Some(HELP.to_string())),
        ConsoleCommand::Quit => Ok(None),
    }
}

fn status_line(snapshot: &SessionSnapshot, input: &str) -> String {
    let state = &snapshot.state;
    let mut line = format!("[{}] {} | vision: {}", state.mode, state.phase, input);
    if snapshot.exploding {
        line.push_str(" | exploding");
    }
    if let Some(reading) = &state.reading {
        line.push('\n');
        line.push_str(&render::reading(reading, state.reveal_variant));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!("fist".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Fist);
        assert_eq!(" PALM \n".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Palm);
        assert_eq!(
            "game".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Mode(AppMode::Game)
        );
        assert_eq!(
            "away".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Head(HeadMove::Away)
        );
        assert_eq!("q".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn rejects_unknown_and_empty_input() {
        let err = "dance".parse::<ConsoleCommand>().unwrap_err();
        assert!(err.to_string().contains("dance"));
        assert!("   ".parse::<ConsoleCommand>().is_err());
    }
}
