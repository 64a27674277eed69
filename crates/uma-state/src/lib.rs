use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A detected choice marker in absolute screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Normalized cross-correlation score in [0, 1]
    pub confidence: f64,
    /// Mean grayscale value of the matched box (0-255)
    pub brightness: f64,
}

impl TemplateMatch {
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Steps of one decision cycle, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Detected,
    Stabilizing,
    Extracting,
    Matching,
    Resolving,
    Mapped,
    Done,
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Detected => "detected",
            Stage::Stabilizing => "stabilizing",
            Stage::Extracting => "extracting",
            Stage::Matching => "matching",
            Stage::Resolving => "resolving",
            Stage::Mapped => "mapped",
            Stage::Done => "done",
            Stage::Fallback => "fallback",
        }
    }
}

/// Why a cycle could not follow the normal path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("no choice markers on screen")]
    PerceptionMiss,

    #[error("no text recognized in the event name region")]
    ExtractionFailure,

    #[error("unknown entity '{text}'")]
    LookupMiss { text: String },

    #[error("entity '{name}' has no options in the knowledge base")]
    NoOptions { name: String },

    #[error("resolved ordinal {ordinal} exceeds detected choice count {detected}")]
    MappingOutOfRange { ordinal: usize, detected: usize },

    #[error("label '{label}' has no ordinal for {detected} detected choices")]
    UnrecognizedLabel { label: String, detected: usize },

    #[error("screen capture failed: {0}")]
    Capture(String),
}

/// The choice handed to the actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// 1-based position among `markers`, top to bottom
    pub chosen_ordinal: usize,
    /// True only when the ordinal came from a knowledge-base resolution or an override
    pub confident: bool,
    pub rationale: String,
    /// Markers detected by the re-check pass, ordered top to bottom
    pub markers: Vec<TemplateMatch>,
}

impl Decision {
    /// Tap target for the chosen marker.
    pub fn tap_point(&self) -> Option<(u32, u32)> {
        self.chosen_ordinal
            .checked_sub(1)
            .and_then(|i| self.markers.get(i))
            .map(TemplateMatch::center)
    }
}

/// Terminal result of one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// First pass found nothing to act on.
    Idle,
    /// Normal path completed.
    Done(Decision),
    /// A stage failed but markers are available; act on the fallback ordinal.
    Fallback {
        decision: Decision,
        reason: String,
    },
    /// A stage failed and there is nothing safe to tap.
    NoOp { rationale: String },
    /// Configured to stop the whole run.
    Abort { rationale: String },
}

impl Outcome {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Outcome::Done(decision) | Outcome::Fallback { decision, .. } => Some(decision),
            _ => None,
        }
    }

    pub fn tap_point(&self) -> Option<(u32, u32)> {
        self.decision().and_then(Decision::tap_point)
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Outcome::Abort { .. })
    }
}
