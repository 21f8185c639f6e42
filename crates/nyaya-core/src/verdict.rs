use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::VerdictError;
use crate::participant::{Opinion, ParticipantId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictLabel {
    Approve,
    Reject,
    Conditional,
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Conditional => "CONDITIONAL",
        })
    }
}

/// Coarse grading of the constitutional score for summary display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
    Failing,
}

impl ScoreBand {
    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Strong
        } else if score >= 60.0 {
            Self::Fair
        } else if score >= 40.0 {
            Self::Weak
        } else {
            Self::Failing
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Fair => "fair",
            Self::Weak => "weak",
            Self::Failing => "failing",
        }
    }
}

/// The bench's aggregated outcome for a completed session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: VerdictLabel,
    pub constitutional_score: f64,
    pub citizen_summary: String,
    #[serde(default)]
    pub critical_issues: Vec<String>,
    #[serde(default)]
    pub mandatory_actions: Vec<String>,
}

impl Verdict {
    pub fn validate(&self) -> Result<(), VerdictError> {
        let score = self.constitutional_score;
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(VerdictError::ScoreOutOfRange(score));
        }
        Ok(())
    }

    pub fn score_band(&self) -> ScoreBand {
        ScoreBand::for_score(self.constitutional_score)
    }
}

/// Finished review as handed to the post-verdict query: the service expects
/// the same shape it produced in its `complete` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub case_id: String,
    pub agent_opinions: BTreeMap<String, Opinion>,
    pub verdict: Verdict,
}

impl AnalysisRecord {
    pub fn new<'a>(
        case_id: impl Into<String>,
        opinions: impl IntoIterator<Item = (ParticipantId, &'a Opinion)>,
        verdict: Verdict,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            agent_opinions: opinions
                .into_iter()
                .map(|(id, opinion)| (id.key().to_string(), opinion.clone()))
                .collect(),
            verdict,
        }
    }
}
