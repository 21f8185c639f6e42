//! Participant state: one review dimension and its forward-only lifecycle.
//!
//! ```text
//! idle ──▶ analyzing ──▶ completed
//!   └──────────────────────▲
//! ```
//!
//! `apply` is the only way state changes. Backward moves are reported as a
//! `TransitionAnomaly` and leave the participant untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of review dimensions the reviewing service knows about.
/// Which of them take part in a session is decided by a `Roster`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantId {
    Transparency,
    Equity,
    Legality,
    Accountability,
    SocialJustice,
}

impl ParticipantId {
    pub const ALL: [Self; 5] = [
        Self::Transparency,
        Self::Equity,
        Self::Legality,
        Self::Accountability,
        Self::SocialJustice,
    ];

    /// Wire key used by the reviewing service.
    pub fn key(self) -> &'static str {
        match self {
            Self::Transparency => "transparency",
            Self::Equity => "equity",
            Self::Legality => "legality",
            Self::Accountability => "accountability",
            Self::SocialJustice => "social_justice",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Transparency => "Transparency",
            Self::Equity => "Equity",
            Self::Legality => "Legality",
            Self::Accountability => "Accountability",
            Self::SocialJustice => "Social Justice",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ParticipantId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| format!("unknown participant: {s}"))
    }
}

/// Ordered so that `a < b` means `b` is further along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Idle,
    Analyzing,
    Completed,
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Approve,
    Reject,
    Conditional,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Conditional => "conditional",
        })
    }
}

/// Ordered by severity, `Low` lowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// One flagged rule violation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_violated: String,
    pub issue: String,
    pub severity: Severity,
}

/// A participant's final position on the case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub stance: Stance,
    pub citizen_explanation: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Inputs to the participant transition function.
#[derive(Clone, Debug, PartialEq)]
pub enum ParticipantUpdate {
    /// `progress` with state `analyzing`.
    Analyzing,
    /// A transient thought while analyzing.
    Thought(String),
    /// `progress` with state `completed`, optionally carrying the opinion.
    Completed(Option<Opinion>),
    /// Forced completion from the terminal `complete` event. Its opinion,
    /// when present, is authoritative.
    Finalized(Option<Opinion>),
}

/// Whether an accepted update changed anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

/// An update that the participant refused. The participant is unchanged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionAnomaly {
    #[error("{participant} cannot move back from {from} to {to}")]
    Regression {
        participant: ParticipantId,
        from: ParticipantStatus,
        to: ParticipantStatus,
    },
    #[error("{participant} received a thought while {status}")]
    StrayThought {
        participant: ParticipantId,
        status: ParticipantStatus,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    id: ParticipantId,
    status: ParticipantStatus,
    transient_message: Option<String>,
    opinion: Option<Opinion>,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            status: ParticipantStatus::Idle,
            transient_message: None,
            opinion: None,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn status(&self) -> ParticipantStatus {
        self.status
    }

    /// Latest thought received while analyzing, `None` for "no thought yet".
    pub fn transient_message(&self) -> Option<&str> {
        self.transient_message.as_deref()
    }

    /// Present only once completed.
    pub fn opinion(&self) -> Option<&Opinion> {
        self.opinion.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ParticipantStatus::Completed
    }

    /// The thought to render: only while analyzing, and never once an
    /// opinion is set.
    pub fn displayed_thought(&self) -> Option<&str> {
        if self.status == ParticipantStatus::Analyzing && self.opinion.is_none() {
            self.transient_message.as_deref()
        } else {
            None
        }
    }

    /// Apply one update. On `Err` the participant is left exactly as it was.
    pub fn apply(&mut self, update: ParticipantUpdate) -> Result<Applied, TransitionAnomaly> {
        use ParticipantStatus::*;

        match update {
            ParticipantUpdate::Analyzing => match self.status {
                Idle => {
                    self.status = Analyzing;
                    Ok(Applied::Changed)
                }
                Analyzing => Ok(Applied::Unchanged),
                Completed => Err(TransitionAnomaly::Regression {
                    participant: self.id,
                    from: Completed,
                    to: Analyzing,
                }),
            },
            ParticipantUpdate::Thought(message) => match self.status {
                Analyzing => {
                    if self.transient_message.as_deref() == Some(message.as_str()) {
                        return Ok(Applied::Unchanged);
                    }
                    self.transient_message = Some(message);
                    Ok(Applied::Changed)
                }
                status => Err(TransitionAnomaly::StrayThought {
                    participant: self.id,
                    status,
                }),
            },
            ParticipantUpdate::Completed(opinion) => match self.status {
                Idle | Analyzing => {
                    self.status = Completed;
                    self.opinion = opinion;
                    Ok(Applied::Changed)
                }
                // Repeated completion keeps the first outcome.
                Completed => Ok(Applied::Unchanged),
            },
            ParticipantUpdate::Finalized(opinion) => {
                let mut applied = Applied::Unchanged;
                if self.status != Completed {
                    self.status = Completed;
                    applied = Applied::Changed;
                }
                if let Some(opinion) = opinion {
                    if self.opinion.as_ref() != Some(&opinion) {
                        self.opinion = Some(opinion);
                        applied = Applied::Changed;
                    }
                }
                Ok(applied)
            }
        }
    }
}
