//! Score banding: maps a 0–100 score to a display tier.
//!
//! Several views band scores with slightly different cut-offs. They are kept
//! as separate functions, each named after the view that uses it.

use serde::Serialize;

use crate::models::feedback::Feedback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Strong,
    Moderate,
    Weak,
}

/// Category-detail badges: above 69 strong, 40–69 moderate, below 40 weak.
pub fn category_tier(score: u8) -> Tier {
    if score > 69 {
        Tier::Strong
    } else if score > 39 {
        Tier::Moderate
    } else {
        Tier::Weak
    }
}

/// Summary-view category text: above 70 strong, 50–70 moderate, below 50 weak.
pub fn summary_tier(score: u8) -> Tier {
    if score > 70 {
        Tier::Strong
    } else if score > 49 {
        Tier::Moderate
    } else {
        Tier::Weak
    }
}

/// ATS panel: above 69 strong, 50–69 moderate, below 50 weak.
pub fn ats_tier(score: u8) -> Tier {
    if score > 69 {
        Tier::Strong
    } else if score > 49 {
        Tier::Moderate
    } else {
        Tier::Weak
    }
}

/// Pass/fail icon on score badges (check vs warning).
pub fn badge_passes(score: u8) -> bool {
    score > 69
}

/// Tiers for every score of one feedback record, keyed by the view that
/// renders them.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBands {
    pub summary: ViewBands,
    pub details: ViewBands,
    pub ats: Tier,
    pub ats_passes: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewBands {
    pub tone_and_style: Tier,
    pub content: Tier,
    pub structure: Tier,
    pub skills: Tier,
}

impl ViewBands {
    fn with(feedback: &Feedback, band: fn(u8) -> Tier) -> Self {
        Self {
            tone_and_style: band(feedback.tone_and_style.score),
            content: band(feedback.content.score),
            structure: band(feedback.structure.score),
            skills: band(feedback.skills.score),
        }
    }
}

impl ScoreBands {
    pub fn from_feedback(feedback: &Feedback) -> Self {
        Self {
            summary: ViewBands::with(feedback, summary_tier),
            details: ViewBands::with(feedback, category_tier),
            ats: ats_tier(feedback.ats.score),
            ats_passes: badge_passes(feedback.ats.score),
        }
    }
}
