use crate::ClassifyError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const NUM_CLASSES: usize = 4;

/// Decimal places kept when scores are presented.
pub const SCORE_DECIMALS: i32 = 4;

/// Dementia severity classes, in the classifier's output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "Mild Dementia")]
    MildDementia,
    #[serde(rename = "Moderate Dementia")]
    ModerateDementia,
    #[serde(rename = "Non Demented")]
    NonDemented,
    #[serde(rename = "Very mild Dementia")]
    VeryMildDementia,
}

impl Stage {
    /// Index `i` of this array is the label of output `i`.
    pub const ALL: [Stage; NUM_CLASSES] = [
        Stage::MildDementia,
        Stage::ModerateDementia,
        Stage::NonDemented,
        Stage::VeryMildDementia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MildDementia => "Mild Dementia",
            Stage::ModerateDementia => "Moderate Dementia",
            Stage::NonDemented => "Non Demented",
            Stage::VeryMildDementia => "Very mild Dementia",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("{} is not a known stage", s))
    }
}

/// Round to [`SCORE_DECIMALS`] places. Applying it twice changes nothing.
pub fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (score * factor).round() / factor
}

/// Index of the largest value; the first one wins a tie. NaN never wins.
pub fn stable_argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if *v <= values[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// One rounded score per [`Stage`], serialized as an ordered
/// `{label: score}` object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScores([f64; NUM_CLASSES]);

impl ConfidenceScores {
    pub fn new(scores: [f64; NUM_CLASSES]) -> Self {
        Self(scores.map(round_score))
    }

    pub fn zeros() -> Self {
        Self([0.0; NUM_CLASSES])
    }

    pub fn get(&self, stage: Stage) -> f64 {
        self.0[stage.index()]
    }

    pub fn values(&self) -> &[f64; NUM_CLASSES] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, f64)> + '_ {
        Stage::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// Stage with the highest (rounded) score.
    pub fn top(&self) -> Option<Stage> {
        stable_argmax(&self.0).and_then(Stage::from_index)
    }
}

impl Serialize for ConfidenceScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for (stage, score) in self.iter() {
            map.serialize_entry(stage.as_str(), &score)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted_stage: Stage,
    pub confidence_scores: ConfidenceScores,
}

/// Map a raw classifier output vector onto the label set.
///
/// The arg-max is taken over the rounded scores so the reported stage is
/// always the first maximum of the reported map.
pub fn map_scores(raw: &[f32]) -> Result<Prediction, ClassifyError> {
    let values: [f32; NUM_CLASSES] =
        raw.try_into()
            .map_err(|_| ClassifyError::OutputShape {
                expected: NUM_CLASSES,
                actual: raw.len(),
            })?;

    let confidence_scores = ConfidenceScores::new(values.map(f64::from));
    let predicted_stage = confidence_scores
        .top()
        .ok_or(ClassifyError::InvalidScores)?;

    Ok(Prediction {
        predicted_stage,
        confidence_scores,
    })
}
