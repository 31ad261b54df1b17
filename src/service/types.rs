use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// How a service instance produces scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// A trained model is loaded.
    Model,
    /// No checkpoint could be loaded; every score is a labelled pseudo score.
    PseudoScore,
}

/// Where a returned score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Encoder + scorer.
    Model,
    /// `sigmoid(dot)` of raw embedding rows after the full model failed.
    EmbeddingDot,
    /// Hash-derived stand-in. Not a model output.
    PseudoScore,
}

impl ScoreSource {
    pub fn is_fallback(self) -> bool {
        self != ScoreSource::Model
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingBucket {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl PairingBucket {
    /// `> 0.8` excellent, `> 0.6` good, `> 0.4` acceptable, otherwise poor.
    pub fn from_score(score: f32) -> Self {
        if score > 0.8 {
            PairingBucket::Excellent
        } else if score > 0.6 {
            PairingBucket::Good
        } else if score > 0.4 {
            PairingBucket::Acceptable
        } else {
            PairingBucket::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PairingBucket::Excellent => "excellent",
            PairingBucket::Good => "good",
            PairingBucket::Acceptable => "acceptable",
            PairingBucket::Poor => "poor",
        }
    }

    fn verdict(&self) -> &'static str {
        match self {
            PairingBucket::Excellent => {
                "This is an excellent match with highly complementary flavor profiles."
            }
            PairingBucket::Good => "This is a good pairing with several compatible flavor notes.",
            PairingBucket::Acceptable => "This pairing is acceptable but not exceptional.",
            PairingBucket::Poor => "These items don't pair particularly well together.",
        }
    }

    /// Template explanation for a scored pair.
    pub fn explain(&self, liquor: &str, ingredient: &str, score: f32) -> String {
        format!(
            "{liquor} pairs with {ingredient} with a compatibility score of {score:.2}. {}",
            self.verdict()
        )
    }
}

impl std::fmt::Display for PairingBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub liquor_id: NodeId,
    pub ingredient_id: NodeId,
    pub score: f32,
    pub bucket: PairingBucket,
    pub explanation: String,
    pub source: ScoreSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub ingredient_id: NodeId,
    pub name: String,
    pub score: f32,
    pub source: ScoreSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
}
