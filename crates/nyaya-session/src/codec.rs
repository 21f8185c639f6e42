//! Session protocol codec.
//!
//! Every inbound frame is a JSON object discriminated by `status`. Decoding
//! happens in two steps: the status is read first so that a broken
//! `complete`/`error` frame is still known to be terminal, then the whole
//! frame is checked against its shape and the active roster.

use std::collections::BTreeMap;
use std::fmt;

use nyaya_core::{CaseRecord, Opinion, ParticipantId, Roster, Verdict, VerdictError};
use serde::Deserialize;
use serde_json::Value;

/// Caption used for an `error` frame that carries no message.
pub const UNSPECIFIED_FAILURE: &str = "The reviewing service reported an error.";

/// Frame classification taken from the `status` field alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Info,
    Progress,
    Thought,
    Complete,
    Error,
    /// Not JSON, no status, or a status outside the protocol.
    Unknown,
}

impl FrameKind {
    fn from_status(status: &str) -> Self {
        match status {
            "info" => Self::Info,
            "progress" => Self::Progress,
            "thought" => Self::Thought,
            "complete" => Self::Complete,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Progress => "progress",
            Self::Thought => "thought",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Analyzing,
    Completed,
}

/// A decoded, validated inbound event.
#[derive(Clone, Debug, PartialEq)]
pub enum ReviewEvent {
    Info {
        message: String,
    },
    Progress {
        participant: ParticipantId,
        state: ProgressState,
        opinion: Option<Opinion>,
    },
    Thought {
        participant: ParticipantId,
        message: String,
    },
    /// Opinions are in roster order.
    Complete {
        verdict: Verdict,
        opinions: Vec<(ParticipantId, Opinion)>,
    },
    Failure {
        message: String,
    },
}

impl ReviewEvent {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Info { .. } => FrameKind::Info,
            Self::Progress { .. } => FrameKind::Progress,
            Self::Thought { .. } => FrameKind::Thought,
            Self::Complete { .. } => FrameKind::Complete,
            Self::Failure { .. } => FrameKind::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    #[error("frame is not valid JSON: {0}")]
    NotJson(String),
    #[error("frame has no status field")]
    MissingStatus,
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
    #[error("invalid frame shape: {0}")]
    InvalidShape(String),
    #[error("unknown participant {0:?}")]
    UnknownParticipant(String),
    #[error(transparent)]
    InvalidVerdict(#[from] VerdictError),
}

/// A frame that could not be decoded, with whatever classification was
/// possible before decoding gave up.
#[derive(Debug, thiserror::Error)]
#[error("{kind} frame rejected: {failure}")]
pub struct DecodeError {
    pub kind: FrameKind,
    pub failure: DecodeFailure,
}

impl DecodeError {
    fn new(kind: FrameKind, failure: DecodeFailure) -> Self {
        Self { kind, failure }
    }

    /// A rejected `complete` or `error` frame still ends the session.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    pub fn error_kind(&self) -> &'static str {
        match self.failure {
            DecodeFailure::NotJson(_) => "not_json",
            DecodeFailure::MissingStatus => "missing_status",
            DecodeFailure::UnknownStatus(_) => "unknown_status",
            DecodeFailure::InvalidShape(_) => "invalid_shape",
            DecodeFailure::UnknownParticipant(_) => "unknown_participant",
            DecodeFailure::InvalidVerdict(_) => "invalid_verdict",
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum WireFrame {
    Info {
        #[serde(default)]
        message: String,
    },
    Progress {
        #[serde(alias = "participant")]
        agent: String,
        state: ProgressState,
        #[serde(default)]
        result: Option<Opinion>,
    },
    Thought {
        #[serde(alias = "participant")]
        agent: String,
        message: String,
    },
    Complete {
        result: WireResult,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Deserialize)]
struct WireResult {
    #[serde(default)]
    agent_opinions: BTreeMap<String, Opinion>,
    verdict: Verdict,
}

/// Decodes frames against the roster a session was started with.
#[derive(Clone, Debug, Default)]
pub struct FrameCodec {
    roster: Roster,
}

impl FrameCodec {
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn decode(&self, raw: &str) -> Result<ReviewEvent, DecodeError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| DecodeError::new(FrameKind::Unknown, DecodeFailure::NotJson(e.to_string())))?;

        let kind = match value.get("status") {
            Some(Value::String(status)) => match FrameKind::from_status(status) {
                FrameKind::Unknown => {
                    return Err(DecodeError::new(
                        FrameKind::Unknown,
                        DecodeFailure::UnknownStatus(status.clone()),
                    ))
                }
                kind => kind,
            },
            _ => {
                return Err(DecodeError::new(
                    FrameKind::Unknown,
                    DecodeFailure::MissingStatus,
                ))
            }
        };

        let frame: WireFrame = serde_json::from_value(value)
            .map_err(|e| DecodeError::new(kind, DecodeFailure::InvalidShape(e.to_string())))?;

        let event = match frame {
            WireFrame::Info { message } => ReviewEvent::Info { message },
            WireFrame::Progress {
                agent,
                state,
                result,
            } => ReviewEvent::Progress {
                participant: self.participant(kind, &agent)?,
                state,
                opinion: result,
            },
            WireFrame::Thought { agent, message } => ReviewEvent::Thought {
                participant: self.participant(kind, &agent)?,
                message,
            },
            WireFrame::Complete { result } => {
                result
                    .verdict
                    .validate()
                    .map_err(|e| DecodeError::new(kind, e.into()))?;
                let mut opinions = Vec::with_capacity(result.agent_opinions.len());
                for (key, opinion) in result.agent_opinions {
                    opinions.push((self.participant(kind, &key)?, opinion));
                }
                opinions.sort_by_key(|(id, _)| self.position(*id));
                ReviewEvent::Complete {
                    verdict: result.verdict,
                    opinions,
                }
            }
            WireFrame::Error { message } => ReviewEvent::Failure {
                message: message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string()),
            },
        };
        Ok(event)
    }

    fn participant(&self, kind: FrameKind, key: &str) -> Result<ParticipantId, DecodeError> {
        self.roster.resolve(key).ok_or_else(|| {
            DecodeError::new(kind, DecodeFailure::UnknownParticipant(key.to_string()))
        })
    }

    fn position(&self, id: ParticipantId) -> usize {
        self.roster
            .members()
            .iter()
            .position(|member| *member == id)
            .unwrap_or(usize::MAX)
    }
}

/// The one outbound frame of a session.
pub fn encode_case(case: &CaseRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nyaya_core::{Severity, Stance, VerdictLabel};
    use serde_json::json;

    fn codec() -> FrameCodec {
        FrameCodec::new(Roster::standard())
    }

    fn opinion_json(stance: &str) -> Value {
        json!({
            "stance": stance,
            "citizen_explanation": "Notice period was too short.",
            "findings": [
                {"rule_violated": "GFR 161", "issue": "10-day window", "severity": "critical"}
            ]
        })
    }

    fn verdict_json() -> Value {
        json!({
            "verdict": "REJECT",
            "constitutional_score": 35,
            "citizen_summary": "The tender should be re-issued.",
            "critical_issues": ["Short bidding window"]
        })
    }

    #[test]
    fn decodes_info() {
        let event = codec()
            .decode(r#"{"status": "info", "message": "Bench assembled"}"#)
            .unwrap();
        assert_eq!(
            event,
            ReviewEvent::Info {
                message: "Bench assembled".into()
            }
        );
    }

    #[test]
    fn decodes_progress_with_either_participant_field() {
        let event = codec()
            .decode(r#"{"status": "progress", "agent": "transparency", "state": "analyzing"}"#)
            .unwrap();
        assert_eq!(
            event,
            ReviewEvent::Progress {
                participant: ParticipantId::Transparency,
                state: ProgressState::Analyzing,
                opinion: None,
            }
        );

        let event = codec()
            .decode(r#"{"status": "progress", "participant": "equity", "state": "analyzing"}"#)
            .unwrap();
        assert!(matches!(
            event,
            ReviewEvent::Progress {
                participant: ParticipantId::Equity,
                ..
            }
        ));
    }

    #[test]
    fn progress_completed_carries_opinion() {
        let frame = json!({
            "status": "progress",
            "agent": "legality",
            "state": "completed",
            "result": opinion_json("reject"),
        });
        let ReviewEvent::Progress { opinion, state, .. } =
            codec().decode(&frame.to_string()).unwrap()
        else {
            panic!("expected progress");
        };
        assert_eq!(state, ProgressState::Completed);
        let opinion = opinion.unwrap();
        assert_eq!(opinion.stance, Stance::Reject);
        assert_eq!(opinion.findings[0].severity, Severity::Critical);
    }

    #[test]
    fn decodes_thought() {
        let event = codec()
            .decode(r#"{"status": "thought", "agent": "accountability", "message": "checking approvals"}"#)
            .unwrap();
        assert_eq!(
            event,
            ReviewEvent::Thought {
                participant: ParticipantId::Accountability,
                message: "checking approvals".into(),
            }
        );
    }

    #[test]
    fn complete_orders_opinions_by_roster() {
        let frame = json!({
            "status": "complete",
            "result": {
                "case_id": "TENDER-2024-001",
                "agent_opinions": {
                    "legality": opinion_json("reject"),
                    "transparency": opinion_json("conditional"),
                },
                "verdict": verdict_json(),
            }
        });
        let event = codec().decode(&frame.to_string()).unwrap();
        let ReviewEvent::Complete { verdict, opinions } = event else {
            panic!("expected complete");
        };
        assert_eq!(verdict.verdict, VerdictLabel::Reject);
        let order: Vec<_> = opinions.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, [ParticipantId::Transparency, ParticipantId::Legality]);
    }

    #[test]
    fn error_without_message_gets_default() {
        let event = codec().decode(r#"{"status": "error"}"#).unwrap();
        assert_eq!(
            event,
            ReviewEvent::Failure {
                message: UNSPECIFIED_FAILURE.into()
            }
        );
        assert!(event.is_terminal());
    }

    #[test]
    fn unknown_participant_is_rejected() {
        let err = codec()
            .decode(r#"{"status": "progress", "agent": "chief_justice", "state": "analyzing"}"#)
            .unwrap_err();
        assert_eq!(err.kind, FrameKind::Progress);
        assert_eq!(err.error_kind(), "unknown_participant");
        assert!(!err.is_terminal());
    }

    #[test]
    fn off_roster_participant_is_rejected() {
        let frame = r#"{"status": "thought", "agent": "social_justice", "message": "x"}"#;
        assert!(codec().decode(frame).is_err());
        assert!(FrameCodec::new(Roster::extended()).decode(frame).is_ok());
    }

    #[test]
    fn out_of_set_values_are_rejected() {
        let bad_state = r#"{"status": "progress", "agent": "equity", "state": "paused"}"#;
        assert_eq!(codec().decode(bad_state).unwrap_err().error_kind(), "invalid_shape");

        let bad_stance = json!({
            "status": "progress",
            "agent": "equity",
            "state": "completed",
            "result": opinion_json("abstain"),
        });
        assert!(codec().decode(&bad_stance.to_string()).is_err());
    }

    #[test]
    fn unclassifiable_frames() {
        assert_eq!(codec().decode("not json").unwrap_err().error_kind(), "not_json");
        assert_eq!(
            codec().decode(r#"{"message": "hi"}"#).unwrap_err().error_kind(),
            "missing_status"
        );
        let err = codec().decode(r#"{"status": "paused"}"#).unwrap_err();
        assert_eq!(err.kind, FrameKind::Unknown);
        assert_eq!(err.error_kind(), "unknown_status");
    }

    #[test]
    fn malformed_terminal_frame_is_still_terminal() {
        let err = codec()
            .decode(r#"{"status": "complete", "result": {"agent_opinions": {}}}"#)
            .unwrap_err();
        assert!(err.is_terminal());

        let frame = json!({
            "status": "complete",
            "result": {
                "agent_opinions": {"chief_justice": opinion_json("approve")},
                "verdict": verdict_json(),
            }
        });
        let err = codec().decode(&frame.to_string()).unwrap_err();
        assert!(err.is_terminal());
        assert_eq!(err.error_kind(), "unknown_participant");
    }

    #[test]
    fn verdict_score_is_validated() {
        let mut verdict = verdict_json();
        verdict["constitutional_score"] = json!(140);
        let frame = json!({"status": "complete", "result": {"verdict": verdict}});
        let err = codec().decode(&frame.to_string()).unwrap_err();
        assert_eq!(err.error_kind(), "invalid_verdict");
        assert!(err.is_terminal());
    }

    #[test]
    fn encode_case_round_trips_through_the_wire_shape() {
        let case = CaseRecord::from_json(
            r#"{"tender_id": "T-1", "title": "Desks", "estimated_value": 100,
                "procurement_method": "open_tender",
                "bids": [{"vendor_name": "A", "bid_amount": 90, "is_msme": false}]}"#,
        )
        .unwrap();
        let frame: Value = serde_json::from_str(&encode_case(&case).unwrap()).unwrap();
        assert_eq!(frame["tender_id"], "T-1");
        assert_eq!(frame["procurement_method"], "open_tender");
        assert_eq!(frame["bids"][0]["vendor_name"], "A");
    }
}
