//! Feedback data model: the scoring result shared by the analysis pipeline
//! (producer) and every reader of a stored resume record.
//!
//! Field names on the wire follow the stored JSON shape exactly
//! (`overallScore`, `ATS`, `toneAndStyle`, tips as `{type, tip, explanation}`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Highest score any category (or the overall figure) may carry.
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

/// One actionable remark inside a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    /// Headline shown in the quick-tips list.
    #[serde(rename = "tip")]
    pub summary: String,
    pub explanation: String,
}

/// Score plus ordered tips for one evaluation axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub score: u8,
    pub tips: Vec<Tip>,
}

/// The ATS axis carries bare suggestion strings instead of full tips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsFeedback {
    pub score: u8,
    #[serde(deserialize_with = "deserialize_ats_tips")]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "overallScore")]
    pub overall_score: u8,
    #[serde(rename = "ATS")]
    pub ats: AtsFeedback,
    #[serde(rename = "toneAndStyle")]
    pub tone_and_style: CategoryFeedback,
    pub content: CategoryFeedback,
    pub structure: CategoryFeedback,
    pub skills: CategoryFeedback,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackInvalid {
    #[error("{field} score {score} is outside 0..=100")]
    ScoreOutOfRange { field: &'static str, score: u8 },

    #[error("{field} tip #{index} has an empty {part}")]
    EmptyTip {
        field: &'static str,
        index: usize,
        part: &'static str,
    },
}

impl Feedback {
    /// The four categories that carry full tips, paired with their wire names.
    pub fn categories(&self) -> [(&'static str, &CategoryFeedback); 4] {
        [
            ("toneAndStyle", &self.tone_and_style),
            ("content", &self.content),
            ("structure", &self.structure),
            ("skills", &self.skills),
        ]
    }

    /// Checks the invariants serde alone cannot express: scores stay within
    /// 0..=100 and no persisted tip has an empty headline or explanation.
    pub fn validate(&self) -> Result<(), FeedbackInvalid> {
        check_score("overallScore", self.overall_score)?;
        check_score("ATS", self.ats.score)?;
        for (index, tip) in self.ats.tips.iter().enumerate() {
            if tip.trim().is_empty() {
                return Err(FeedbackInvalid::EmptyTip {
                    field: "ATS",
                    index,
                    part: "tip",
                });
            }
        }

        for (field, category) in self.categories() {
            check_score(field, category.score)?;
            for (index, tip) in category.tips.iter().enumerate() {
                if tip.summary.trim().is_empty() {
                    return Err(FeedbackInvalid::EmptyTip {
                        field,
                        index,
                        part: "tip",
                    });
                }
                if tip.explanation.trim().is_empty() {
                    return Err(FeedbackInvalid::EmptyTip {
                        field,
                        index,
                        part: "explanation",
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_score(field: &'static str, score: u8) -> Result<(), FeedbackInvalid> {
    if score > MAX_SCORE {
        return Err(FeedbackInvalid::ScoreOutOfRange { field, score });
    }
    Ok(())
}

/// Models sometimes answer the ATS block with `{type, tip}` objects; only the
/// text is kept.
fn deserialize_ats_tips<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AtsTip {
        Text(String),
        Object { tip: String },
    }

    let tips = Vec::<AtsTip>::deserialize(deserializer)?;
    Ok(tips
        .into_iter()
        .map(|t| match t {
            AtsTip::Text(text) => text,
            AtsTip::Object { tip } => tip,
        })
        .collect())
}

/// A record's feedback slot: the empty string while scoring is in flight,
/// the full object once the final write lands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedbackState {
    #[default]
    Pending,
    Complete(Feedback),
}

impl FeedbackState {
    pub fn is_pending(&self) -> bool {
        matches!(self, FeedbackState::Pending)
    }

    pub fn as_complete(&self) -> Option<&Feedback> {
        match self {
            FeedbackState::Complete(feedback) => Some(feedback),
            FeedbackState::Pending => None,
        }
    }
}

impl Serialize for FeedbackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FeedbackState::Pending => serializer.serialize_str(""),
            FeedbackState::Complete(feedback) => feedback.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FeedbackState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Full(Box<Feedback>),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(text) if text.is_empty() => Ok(FeedbackState::Pending),
            Wire::Text(_) => Err(serde::de::Error::custom(
                "feedback must be an empty string or a feedback object",
            )),
            Wire::Full(feedback) => Ok(FeedbackState::Complete(*feedback)),
        }
    }
}
