use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::reading::Reading;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OraclePhase {
    Idle,
    Scanning,
    Opening,
    Revealed,
}

impl Default for OraclePhase {
    fn default() -> Self {
        OraclePhase::Idle
    }
}

impl OraclePhase {
    /// Edges reachable through gestures, timers and the manual reset.
    pub fn can_advance_to(self, next: OraclePhase) -> bool {
        matches!(
            (self, next),
            (OraclePhase::Idle, OraclePhase::Scanning)
                | (OraclePhase::Scanning, OraclePhase::Opening)
                | (OraclePhase::Opening, OraclePhase::Revealed)
                | (OraclePhase::Revealed, OraclePhase::Scanning)
        )
    }

    /// Edges that selecting oracle mode may take on top of [`Self::can_advance_to`].
    pub fn can_reenter_to(self, next: OraclePhase) -> bool {
        next == OraclePhase::Scanning || self.can_advance_to(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OraclePhase::Idle => "IDLE",
            OraclePhase::Scanning => "SCANNING",
            OraclePhase::Opening => "OPENING",
            OraclePhase::Revealed => "REVEALED",
        }
    }
}

impl fmt::Display for OraclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AppMode {
    Oracle,
    Game,
}

impl Default for AppMode {
    fn default() -> Self {
        AppMode::Oracle
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppMode::Oracle => f.write_str("ORACLE"),
            AppMode::Game => f.write_str("GAME"),
        }
    }
}

/// Alternative presentations of the same reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RevealVariant {
    Book,
    Artifact,
    ZodiacWhite,
    ZodiacGold,
}

impl RevealVariant {
    pub const ALL: [RevealVariant; 4] = [
        RevealVariant::Book,
        RevealVariant::Artifact,
        RevealVariant::ZodiacWhite,
        RevealVariant::ZodiacGold,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&RevealVariant::Book)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RevealVariant::Book => "Mystic Book",
            RevealVariant::Artifact => "Mystic Artifact",
            RevealVariant::ZodiacWhite => "White Zodiac",
            RevealVariant::ZodiacGold => "Gold Zodiac",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub mode: AppMode,
    pub phase: OraclePhase,
    pub reading: Option<Reading>,
    pub reveal_variant: Option<RevealVariant>,
    /// Set while the explosion runs; blocks all gesture input.
    pub is_transitioning: bool,
    pub revealed_at: Option<DateTime<Utc>>,
    /// Bumped whenever a pending reveal or explosion completion must be dropped.
    #[serde(skip)]
    pub episode: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            mode: AppMode::Oracle,
            phase: OraclePhase::Idle,
            reading: None,
            reveal_variant: None,
            is_transitioning: false,
            revealed_at: None,
            episode: 0,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exploding(&self) -> bool {
        self.phase == OraclePhase::Revealed && self.is_transitioning
    }

    fn advance(&mut self, next: OraclePhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            bail!("illegal oracle transition {} -> {}", self.phase, next);
        }
        self.phase = next;
        Ok(())
    }

    pub fn begin_scanning(&mut self) -> Result<()> {
        self.advance(OraclePhase::Scanning)?;
        self.reading = None;
        self.revealed_at = None;
        self.is_transitioning = false;
        Ok(())
    }

    /// Returns the episode the pending reveal belongs to.
    pub fn begin_opening(&mut self, variant: RevealVariant) -> Result<u64> {
        self.advance(OraclePhase::Opening)?;
        self.reveal_variant = Some(variant);
        self.episode = self.episode.wrapping_add(1);
        Ok(self.episode)
    }

    pub fn reveal(&mut self, reading: Reading, at: DateTime<Utc>) -> Result<()> {
        self.advance(OraclePhase::Revealed)?;
        self.reading = Some(reading);
        self.revealed_at = Some(at);
        Ok(())
    }

    pub fn begin_exploding(&mut self) -> Result<u64> {
        if self.phase != OraclePhase::Revealed {
            bail!("nothing to shatter while {}", self.phase);
        }
        self.is_transitioning = true;
        self.episode = self.episode.wrapping_add(1);
        Ok(self.episode)
    }

    /// Ends the explosion or a manual reset: back to scanning with no reading.
    pub fn dismiss(&mut self) -> Result<()> {
        if self.phase != OraclePhase::Revealed {
            bail!("nothing to reset while {}", self.phase);
        }
        self.episode = self.episode.wrapping_add(1);
        self.begin_scanning()
    }

    pub fn enter_game(&mut self) {
        self.mode = AppMode::Game;
        self.is_transitioning = false;
        self.episode = self.episode.wrapping_add(1);
    }

    /// Selecting oracle mode always lands in scanning, whatever was in progress.
    pub fn enter_oracle(&mut self) {
        self.mode = AppMode::Oracle;
        self.phase = OraclePhase::Scanning;
        self.reading = None;
        self.revealed_at = None;
        self.is_transitioning = false;
        self.episode = self.episode.wrapping_add(1);
    }

    /// Whether a completion scheduled in `episode` may still be applied in `phase`.
    pub fn is_current(&self, episode: u64, phase: OraclePhase) -> bool {
        self.mode == AppMode::Oracle && self.phase == phase && self.episode == episode
    }
}
