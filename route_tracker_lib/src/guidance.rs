#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceKind {
    /// The upcoming maneuver is close enough that its instruction is spoken early.
    ApproachingManeuver,
    AtManeuver,
    ApproachingDestination,
    Other,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceGuidance {
    pub text: String,
    pub kind: GuidanceKind,
}

impl VoiceGuidance {
    pub fn new(text: impl Into<String>, kind: GuidanceKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}
