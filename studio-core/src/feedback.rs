//! Review-ask gate.
//!
//! After each successful generation the cumulative published count is
//! compared against a fixed schedule. Crossing the next threshold asks for a
//! satisfaction survey once and advances the persisted stage.

use serde::{Deserialize, Serialize};

use crate::CoreResult;

/// Published-image counts at which the survey is offered.
pub const REVIEW_SCHEDULE: [u64; 4] = [3, 7, 15, 50];

/// How far along the review-ask schedule the user is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStage {
    /// Never asked.
    #[default]
    None,
    /// Asked once.
    FirstAsked,
    /// Asked twice.
    SecondAsked,
    /// Asked three times.
    ThirdAsked,
    /// Done asking.
    Never,
}

impl ReviewStage {
    /// Published count that triggers the next ask from this stage.
    #[must_use]
    pub fn threshold(self) -> Option<u64> {
        match self {
            Self::None => Some(REVIEW_SCHEDULE[0]),
            Self::FirstAsked => Some(REVIEW_SCHEDULE[1]),
            Self::SecondAsked => Some(REVIEW_SCHEDULE[2]),
            Self::ThirdAsked => Some(REVIEW_SCHEDULE[3]),
            Self::Never => None,
        }
    }

    /// The stage after asking once more.
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::None => Self::FirstAsked,
            Self::FirstAsked => Self::SecondAsked,
            Self::SecondAsked => Self::ThirdAsked,
            Self::ThirdAsked | Self::Never => Self::Never,
        }
    }
}

/// Persisted review-ask state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackGate {
    /// Current stage.
    pub stage: ReviewStage,
    /// Cumulative number of published images.
    pub published_total: u64,
}

impl FeedbackGate {
    /// Fresh gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more published image.
    pub fn record_published(&mut self) {
        self.published_total += 1;
    }

    /// Advance at most one stage if its threshold has been reached.
    ///
    /// Returns the new stage when the survey should be shown.
    pub fn check(&mut self) -> Option<ReviewStage> {
        let threshold = self.stage.threshold()?;
        if self.published_total < threshold {
            return None;
        }
        self.stage = self.stage.advance();
        tracing::info!(
            "Review prompt due at {} published images, stage now {:?}",
            self.published_total,
            self.stage
        );
        Some(self.stage)
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
