use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    config::{GestureThresholds, OracleConfig},
    reading::ReadingSource,
    vision::{Gesture, GestureEvent},
};

use super::{AppMode, OraclePhase, RevealVariant, SessionState};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub exploding: bool,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            exploding: state.is_exploding(),
            state: state.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransitionCause {
    Start,
    Gesture,
    Timer,
    Reset,
    ModeSwitch,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum OracleEvent {
    StateChanged {
        from: OraclePhase,
        to: OraclePhase,
        cause: TransitionCause,
        snapshot: SessionSnapshot,
    },
    ExplosionStarted {
        snapshot: SessionSnapshot,
    },
    /// A reveal or explosion completion arrived after the session moved on.
    CompletionDiscarded {
        episode: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotOracleMode,
    PhaseMismatch(OraclePhase),
    Transitioning,
    BelowThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Opening(RevealVariant),
    Exploding,
    Ignored(IgnoreReason),
}

#[derive(Clone)]
pub struct OracleController {
    state: Arc<Mutex<SessionState>>,
    reading_source: Arc<dyn ReadingSource>,
    events: broadcast::Sender<OracleEvent>,
    thresholds: GestureThresholds,
    reveal_delay: Duration,
    explosion: Duration,
    timers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl OracleController {
    pub fn new(config: &OracleConfig, reading_source: Arc<dyn ReadingSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            reading_source,
            events,
            thresholds: config.thresholds.clone(),
            reveal_delay: config.reveal_delay(),
            explosion: config.explosion_duration(),
            timers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OracleEvent> {
        self.events.subscribe()
    }

    pub async fn get_state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.state.lock().await)
    }

    /// Leaves IDLE for SCANNING when the session starts in oracle mode.
    pub async fn start(&self) -> Result<SessionSnapshot> {
        let mut state = self.state.lock().await;
        if state.mode == AppMode::Oracle && state.phase == OraclePhase::Idle {
            state.begin_scanning()?;
            info!("oracle session {} scanning", state.session_id);
            self.emit_changed(OraclePhase::Idle, &state, TransitionCause::Start);
        }
        Ok(SessionSnapshot::from(&*state))
    }

    /// Whether a gesture could currently have any effect.
    pub async fn accepts_gestures(&self) -> bool {
        let state = self.state.lock().await;
        state.mode == AppMode::Oracle
            && !state.is_transitioning
            && matches!(state.phase, OraclePhase::Scanning | OraclePhase::Revealed)
    }

    pub async fn handle_gesture(&self, event: GestureEvent) -> Result<DispatchOutcome> {
        if !event.clears_threshold(&self.thresholds) {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::BelowThreshold));
        }

        let mut state = self.state.lock().await;
        if state.mode != AppMode::Oracle {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NotOracleMode));
        }
        if state.is_transitioning {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::Transitioning));
        }

        match (event.gesture, state.phase) {
            (Gesture::ClosedFist, OraclePhase::Scanning) => {
                let variant = RevealVariant::random(&mut rand::thread_rng());
                let episode = state.begin_opening(variant)?;
                info!(
                    "closed fist ({:.2}) opened episode {} as {}",
                    event.confidence,
                    episode,
                    variant.as_str()
                );
                self.emit_changed(OraclePhase::Scanning, &state, TransitionCause::Gesture);
                drop(state);

                self.spawn_reveal(episode).await;
                Ok(DispatchOutcome::Opening(variant))
            }
            (Gesture::OpenPalm, OraclePhase::Revealed) => {
                let episode = state.begin_exploding()?;
                info!("open palm ({:.2}) shattering the reading", event.confidence);
                let _ = self.events.send(OracleEvent::ExplosionStarted {
                    snapshot: SessionSnapshot::from(&*state),
                });
                drop(state);

                self.spawn_explosion(episode).await;
                Ok(DispatchOutcome::Exploding)
            }
            (_, phase) => Ok(DispatchOutcome::Ignored(IgnoreReason::PhaseMismatch(phase))),
        }
    }

    /// Manual dismissal of a revealed reading, skipping the explosion.
    pub async fn reset(&self) -> Result<SessionSnapshot> {
        let mut state = self.state.lock().await;
        if state.mode != AppMode::Oracle {
            bail!("reset is only available in oracle mode");
        }
        if state.phase != OraclePhase::Revealed {
            bail!("nothing to reset while {}", state.phase);
        }

        state.dismiss()?;
        self.emit_changed(OraclePhase::Revealed, &state, TransitionCause::Reset);
        Ok(SessionSnapshot::from(&*state))
    }

    pub async fn switch_mode(&self, mode: AppMode) -> Result<SessionSnapshot> {
        let mut state = self.state.lock().await;
        let from = state.phase;

        match mode {
            AppMode::Game => {
                if state.mode == AppMode::Game {
                    return Ok(SessionSnapshot::from(&*state));
                }
                state.enter_game();
            }
            AppMode::Oracle => state.enter_oracle(),
        }

        info!("switched to {} mode ({} -> {})", mode, from, state.phase);
        self.emit_changed(from, &state, TransitionCause::ModeSwitch);
        Ok(SessionSnapshot::from(&*state))
    }

    /// Aborts pending reveal and explosion timers. Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        for handle in timers.drain(..) {
            handle.abort();
        }
    }

    async fn spawn_reveal(&self, episode: u64) {
        let state = self.state.clone();
        let source = self.reading_source.clone();
        let events = self.events.clone();
        let delay = self.reveal_delay;

        let handle = tokio::spawn(async move {
            let reading = source.request_reading().await;
            // The pause runs after the reading settles, however fast that was.
            time::sleep(delay).await;

            let mut guard = state.lock().await;
            if !guard.is_current(episode, OraclePhase::Opening) {
                info!("discarding reading \"{}\" from stale episode {}", reading.title, episode);
                let _ = events.send(OracleEvent::CompletionDiscarded { episode });
                return;
            }

            if let Err(err) = guard.reveal(reading, Utc::now()) {
                error!("failed to reveal episode {}: {err}", episode);
                return;
            }
            send_changed(&events, OraclePhase::Opening, &guard, TransitionCause::Timer);
        });

        self.track(handle).await;
    }

    async fn spawn_explosion(&self, episode: u64) {
        let state = self.state.clone();
        let events = self.events.clone();
        let duration = self.explosion;

        let handle = tokio::spawn(async move {
            time::sleep(duration).await;

            let mut guard = state.lock().await;
            if !guard.is_current(episode, OraclePhase::Revealed) || !guard.is_transitioning {
                let _ = events.send(OracleEvent::CompletionDiscarded { episode });
                return;
            }

            if let Err(err) = guard.dismiss() {
                error!("failed to finish explosion for episode {}: {err}", episode);
                return;
            }
            send_changed(&events, OraclePhase::Revealed, &guard, TransitionCause::Timer);
        });

        self.track(handle).await;
    }

    async fn track(&self, handle: JoinHandle<()>) {
        let mut timers = self.timers.lock().await;
        timers.retain(|handle| !handle.is_finished());
        timers.push(handle);
    }

    fn emit_changed(&self, from: OraclePhase, state: &SessionState, cause: TransitionCause) {
        send_changed(&self.events, from, state, cause);
    }
}

fn send_changed(
    events: &broadcast::Sender<OracleEvent>,
    from: OraclePhase,
    state: &SessionState,
    cause: TransitionCause,
) {
    // No subscribers is fine; the state itself is the source of truth.
    let _ = events.send(OracleEvent::StateChanged {
        from,
        to: state.phase,
        cause,
        snapshot: SessionSnapshot::from(state),
    });
}
