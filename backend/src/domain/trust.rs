//! Trust score arithmetic and classification.
//!
//! Scores are integers bounded to [0, 1000]. Payment events nudge the
//! score by fixed amounts; classification maps the score onto the display
//! bands the dashboard shows.

pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 1000;

/// Score assigned to new users and freshly admitted members.
pub const STARTING_SCORE: i64 = 500;

/// Reward for settling a contribution within its payment window.
pub const ON_TIME_REWARD: i64 = 5;

/// Penalty for settling after the due date.
pub const LATE_PENALTY: i64 = 10;

/// Penalty for never settling a cycle's contribution.
pub const DEFAULT_PENALTY: i64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl TrustLevel {
    pub fn label(&self) -> &'static str {
        match self {
            TrustLevel::Excellent => "Excellent",
            TrustLevel::Good => "Good",
            TrustLevel::Fair => "Fair",
            TrustLevel::Poor => "Poor",
            TrustLevel::VeryPoor => "Very Poor",
        }
    }
}

pub fn clamp_score(score: i64) -> i64 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

/// Total over [0, 1000]; monotonic non-decreasing in score.
pub fn trust_level(score: i64) -> TrustLevel {
    if score >= 850 {
        TrustLevel::Excellent
    } else if score >= 700 {
        TrustLevel::Good
    } else if score >= 550 {
        TrustLevel::Fair
    } else if score >= 400 {
        TrustLevel::Poor
    } else {
        TrustLevel::VeryPoor
    }
}

/// Score as a percentage of the maximum; display only, never a
/// scheduling input.
pub fn trust_progress(score: i64) -> f64 {
    score as f64 / SCORE_MAX as f64 * 100.0
}
