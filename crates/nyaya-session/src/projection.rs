//! Read-only views over a `Session` for rendering.
//!
//! Everything here is a pure function of the session it borrows, so the same
//! calls serve live progress and the replay of a finished review.

use nyaya_core::{Finding, Opinion, Participant, ParticipantId, ParticipantStatus, Severity, Stance, Verdict};

use crate::session::{Session, SessionPhase};

/// Shown in a card while a participant is analyzing but has no thought yet.
pub const THINKING_PLACEHOLDER: &str = "Analyzing...";

/// Findings shown on a card; the full list is in the risk summary.
pub const HIGHLIGHTED_FINDINGS: usize = 2;

/// One entry of the linear progress indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub participant: ParticipantId,
    pub label: &'static str,
    pub state: ParticipantStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Bubble<'a> {
    Silent,
    Thinking(&'a str),
    Stance {
        stance: Stance,
        explanation: &'a str,
    },
}

/// Display record for one participant card.
#[derive(Clone, Debug, PartialEq)]
pub struct Card<'a> {
    pub participant: ParticipantId,
    pub label: &'static str,
    pub state: ParticipantStatus,
    pub bubble: Bubble<'a>,
    pub opinion: Option<&'a Opinion>,
    pub highlighted_findings: &'a [Finding],
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlaggedFinding<'a> {
    pub participant: ParticipantId,
    pub finding: &'a Finding,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskSummary<'a> {
    pub findings: Vec<FlaggedFinding<'a>>,
    pub critical: usize,
    pub high: usize,
}

impl RiskSummary<'_> {
    pub fn is_clear(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn worst(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.finding.severity).max()
    }
}

/// Everything one render pass needs.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionView<'a> {
    pub phase: SessionPhase,
    pub caption: &'a str,
    pub steps: Vec<Step>,
    pub cards: Vec<Card<'a>>,
    pub risk: RiskSummary<'a>,
    pub verdict: Option<&'a Verdict>,
}

pub fn steps(session: &Session) -> Vec<Step> {
    session
        .participants()
        .iter()
        .map(|p| Step {
            participant: p.id(),
            label: p.id().label(),
            state: p.status(),
        })
        .collect()
}

pub fn card(participant: &Participant) -> Card<'_> {
    let opinion = participant.opinion();
    let bubble = match (participant.status(), opinion) {
        (_, Some(opinion)) => Bubble::Stance {
            stance: opinion.stance,
            explanation: &opinion.citizen_explanation,
        },
        (ParticipantStatus::Analyzing, None) => {
            Bubble::Thinking(participant.displayed_thought().unwrap_or(THINKING_PLACEHOLDER))
        }
        _ => Bubble::Silent,
    };
    let highlighted_findings = opinion
        .map(|o| &o.findings[..o.findings.len().min(HIGHLIGHTED_FINDINGS)])
        .unwrap_or(&[]);

    Card {
        participant: participant.id(),
        label: participant.id().label(),
        state: participant.status(),
        bubble,
        opinion,
        highlighted_findings,
    }
}

pub fn cards(session: &Session) -> Vec<Card<'_>> {
    session.participants().iter().map(card).collect()
}

/// All findings of completed participants, in roster then finding order.
pub fn risk_summary(session: &Session) -> RiskSummary<'_> {
    let mut summary = RiskSummary::default();
    for participant in session.participants().iter().filter(|p| p.is_completed()) {
        let Some(opinion) = participant.opinion() else {
            continue;
        };
        for finding in &opinion.findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium | Severity::Low => {}
            }
            summary.findings.push(FlaggedFinding {
                participant: participant.id(),
                finding,
            });
        }
    }
    summary
}

pub fn view(session: &Session) -> SessionView<'_> {
    SessionView {
        phase: session.phase(),
        caption: session.caption(),
        steps: steps(session),
        cards: cards(session),
        risk: risk_summary(session),
        verdict: session.verdict(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SessionController;
    use crate::mock::{frames, sample_case};
    use nyaya_core::Roster;
    use serde_json::json;

    fn running() -> SessionController {
        let mut controller = SessionController::new(sample_case(), Roster::standard());
        controller.start().unwrap();
        controller.on_connected().unwrap();
        controller
    }

    #[test]
    fn steps_follow_roster_order() {
        let mut controller = running();
        controller.on_frame(&frames::progress("legality", "analyzing"));
        let steps = steps(controller.session());
        let labels: Vec<_> = steps.iter().map(|s| s.label).collect();
        assert_eq!(labels, ["Transparency", "Equity", "Legality", "Accountability"]);
        assert_eq!(steps[2].state, ParticipantStatus::Analyzing);
        assert_eq!(steps[0].state, ParticipantStatus::Idle);
    }

    #[test]
    fn card_bubbles_track_status() {
        let mut controller = running();
        controller.on_frame(&frames::progress("transparency", "analyzing"));
        controller.on_frame(&frames::progress("equity", "analyzing"));
        controller.on_frame(&frames::thought("equity", "weighing MSME preference"));

        let cards = cards(controller.session());
        assert_eq!(cards[0].bubble, Bubble::Thinking(THINKING_PLACEHOLDER));
        assert_eq!(cards[1].bubble, Bubble::Thinking("weighing MSME preference"));
        assert_eq!(cards[2].bubble, Bubble::Silent);
        assert!(cards[2].highlighted_findings.is_empty());
    }

    #[test]
    fn completed_card_shows_stance_and_first_findings() {
        let mut controller = running();
        controller.on_frame(&frames::progress("legality", "analyzing"));
        controller.on_frame(&frames::thought("legality", "reading GFR"));
        let opinion = json!({
            "stance": "reject",
            "citizen_explanation": "Limited tender used above the threshold.",
            "findings": [
                {"rule_violated": "GFR 162", "issue": "a", "severity": "critical"},
                {"rule_violated": "GFR 161", "issue": "b", "severity": "high"},
                {"rule_violated": "GFR 173", "issue": "c", "severity": "low"}
            ]
        });
        controller.on_frame(&frames::progress_with_opinion("legality", opinion));

        let session = controller.session();
        let card = card(session.participant(ParticipantId::Legality).unwrap());
        assert_eq!(
            card.bubble,
            Bubble::Stance {
                stance: Stance::Reject,
                explanation: "Limited tender used above the threshold.",
            }
        );
        assert_eq!(card.highlighted_findings.len(), HIGHLIGHTED_FINDINGS);
        assert_eq!(card.highlighted_findings[0].rule_violated, "GFR 162");
        assert_eq!(card.opinion.unwrap().findings.len(), 3);
    }

    #[test]
    fn risk_summary_counts_critical_and_high() {
        let mut controller = running();
        controller.on_frame(&frames::progress_with_opinion(
            "transparency",
            frames::opinion("reject", "critical"),
        ));
        controller.on_frame(&frames::progress_with_opinion(
            "equity",
            frames::opinion("conditional", "high"),
        ));
        controller.on_frame(&frames::progress_with_opinion(
            "accountability",
            frames::opinion("approve", "low"),
        ));

        let risk = risk_summary(controller.session());
        assert_eq!(risk.findings.len(), 3);
        assert_eq!(risk.critical, 1);
        assert_eq!(risk.high, 1);
        assert_eq!(risk.worst(), Some(Severity::Critical));
        assert_eq!(risk.findings[1].participant, ParticipantId::Equity);
    }

    #[test]
    fn empty_session_has_clear_risk() {
        let controller = running();
        let risk = risk_summary(controller.session());
        assert!(risk.is_clear());
        assert_eq!(risk.worst(), None);
    }

    #[test]
    fn view_is_recomputable_without_side_effects() {
        let mut controller = running();
        controller.on_frame(&frames::complete(
            &[("transparency", frames::opinion("reject", "critical"))],
            frames::verdict("REJECT", 30.0),
        ));
        let session = controller.into_session();
        let first = view(&session);
        let second = view(&session);
        assert_eq!(first, second);
        assert_eq!(first.phase, SessionPhase::Complete);
        assert_eq!(first.verdict.unwrap().constitutional_score, 30.0);
        assert_eq!(first.risk.critical, 1);
    }
}
