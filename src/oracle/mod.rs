pub mod controller;
pub mod state;

pub use controller::{
    DispatchOutcome, IgnoreReason, OracleController, OracleEvent, SessionSnapshot, TransitionCause,
};
pub use state::{AppMode, OraclePhase, RevealVariant, SessionState};
