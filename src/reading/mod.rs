pub mod gemini;

use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin};

pub use gemini::GeminiReadingSource;

pub const FALLBACK_TITLE: &str = "The Silent Stars";
pub const FALLBACK_PROPHECY: &str =
    "The celestial interference is strong. The stars are shifting, please gaze into the void again later.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reading {
    pub title: String,
    pub prophecy: String,
}

impl Reading {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            prophecy: FALLBACK_PROPHECY.to_string(),
        }
    }
}

pub type ReadingFuture<'a> = Pin<Box<dyn Future<Output = Reading> + Send + 'a>>;

/// Something that can produce a reading.
///
/// The returned future always settles with a value; implementations absorb
/// their own failures, typically by resolving to [`Reading::fallback`].
pub trait ReadingSource: Send + Sync {
    fn request_reading(&self) -> ReadingFuture<'_>;
}
