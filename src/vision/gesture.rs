use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GestureThresholds;

/// Gestures the oracle reacts to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Gesture {
    ClosedFist,
    OpenPalm,
}

impl Gesture {
    /// Maps a recognizer category name onto a gesture.
    ///
    /// `Closed_Fist`, `CLOSED_FIST`, `closed-fist` and `closed fist` are all the
    /// same category; anything else (including `None`) is not a gesture.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "closedfist" | "fist" => Some(Gesture::ClosedFist),
            "openpalm" | "palm" => Some(Gesture::OpenPalm),
            _ => None,
        }
    }

    pub fn threshold(&self, thresholds: &GestureThresholds) -> f32 {
        match self {
            Gesture::ClosedFist => thresholds.closed_fist,
            Gesture::OpenPalm => thresholds.open_palm,
        }
    }
}

/// Raw recognizer output for one frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GestureSample {
    pub label: String,
    pub confidence: f32,
    pub captured_at: DateTime<Utc>,
}

impl GestureSample {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GestureEvent {
    pub gesture: Gesture,
    pub confidence: f32,
}

impl GestureEvent {
    pub fn new(gesture: Gesture, confidence: f32) -> Self {
        Self {
            gesture,
            confidence,
        }
    }

    pub fn clears_threshold(&self, thresholds: &GestureThresholds) -> bool {
        self.confidence > self.gesture.threshold(thresholds)
    }
}

/// Turns a sample into an event when the label is known and the score clears its threshold.
pub fn classify(sample: &GestureSample, thresholds: &GestureThresholds) -> Option<GestureEvent> {
    let gesture = Gesture::from_label(&sample.label)?;
    let event = GestureEvent::new(gesture, sample.confidence);
    event.clears_threshold(thresholds).then_some(event)
}
