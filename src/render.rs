//! Plain-text rendering of session projections.

use std::fmt::Write as _;

use nyaya_core::{CaseRecord, ParticipantStatus};
use nyaya_session::projection::{Bubble, Card, RiskSummary, SessionView};
use nyaya_session::SessionPhase;
use nyaya_telemetry::JournalEntry;

fn marker(state: ParticipantStatus) -> &'static str {
    match state {
        ParticipantStatus::Idle => "[ ]",
        ParticipantStatus::Analyzing => "[~]",
        ParticipantStatus::Completed => "[x]",
    }
}

pub fn case_header(case: &CaseRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} | {}", case.tender_id, case.title);
    if !case.department.is_empty() {
        let _ = writeln!(out, "  Department: {}", case.department);
    }
    let _ = writeln!(
        out,
        "  {} | estimated value {:.0} | {} bid(s)",
        case.procurement_method.label(),
        case.estimated_value,
        case.bids.len()
    );
    if let Some(l1) = case.lowest_bid() {
        let _ = writeln!(out, "  L1: {} at {:.0}", l1.vendor_name, l1.bid_amount);
    }
    if let Some(days) = case.bidding_window_days() {
        let _ = writeln!(out, "  Bidding window: {days} day(s)");
    }
    out
}

/// One-line progress indicator with the current caption.
pub fn progress_line(view: &SessionView<'_>) -> String {
    let steps: Vec<String> = view
        .steps
        .iter()
        .map(|s| format!("{} {}", marker(s.state), s.label))
        .collect();
    format!("{}  {}", steps.join("  "), view.caption)
}

pub fn card(card: &Card<'_>) -> String {
    let mut out = format!("{} {}", marker(card.state), card.label);
    match &card.bubble {
        Bubble::Silent => {}
        Bubble::Thinking(thought) => {
            let _ = write!(out, ": {thought}");
        }
        Bubble::Stance {
            stance,
            explanation,
        } => {
            let _ = write!(out, ": {} - {explanation}", stance.to_string().to_uppercase());
        }
    }
    for finding in card.highlighted_findings {
        let _ = write!(
            out,
            "\n    ({}) {}: {}",
            finding.severity, finding.rule_violated, finding.issue
        );
    }
    out
}

pub fn risk(risk: &RiskSummary<'_>) -> String {
    if risk.is_clear() {
        return "No findings raised.".into();
    }
    let mut out = format!(
        "{} finding(s): {} critical, {} high",
        risk.findings.len(),
        risk.critical,
        risk.high
    );
    for flagged in &risk.findings {
        let _ = write!(
            out,
            "\n  - [{}] {} ({}): {}",
            flagged.finding.severity,
            flagged.participant.label(),
            flagged.finding.rule_violated,
            flagged.finding.issue
        );
    }
    out
}

/// Full report for a session in a terminal phase.
pub fn report(view: &SessionView<'_>) -> String {
    let mut out = String::new();
    match (view.phase, view.verdict) {
        (SessionPhase::Complete, Some(verdict)) => {
            let _ = writeln!(
                out,
                "VERDICT: {}  (constitutional score {:.0}/100, {})",
                verdict.verdict,
                verdict.constitutional_score,
                verdict.score_band().label()
            );
            let _ = writeln!(out, "{}", verdict.citizen_summary);
            if !verdict.critical_issues.is_empty() {
                let _ = writeln!(out, "\nCritical issues:");
                for issue in &verdict.critical_issues {
                    let _ = writeln!(out, "  - {issue}");
                }
            }
            if !verdict.mandatory_actions.is_empty() {
                let _ = writeln!(out, "\nMandatory actions:");
                for action in &verdict.mandatory_actions {
                    let _ = writeln!(out, "  - {action}");
                }
            }
        }
        (phase, _) => {
            let _ = writeln!(out, "Review {phase}: {}", view.caption);
        }
    }

    let _ = writeln!(out, "\nBench:");
    for c in &view.cards {
        let _ = writeln!(out, "  {}", card(c));
    }
    let _ = writeln!(out, "\n{}", risk(&view.risk));
    out
}

pub fn journal_entry(entry: &JournalEntry) -> String {
    let mut out = format!(
        "{} {:5} [{}] {}",
        entry.recorded_at,
        entry.level,
        entry.kind.as_deref().unwrap_or(nyaya_telemetry::UNCLASSIFIED),
        entry.message
    );
    if let Some(detail) = &entry.detail {
        let _ = write!(out, ": {detail}");
    }
    if let Some(participant) = &entry.participant {
        let _ = write!(out, " participant={participant}");
    }
    if let Some(session) = &entry.session_id {
        let _ = write!(out, " session={session}");
    }
    out
}

pub fn tally(counts: &[(String, u64)]) -> String {
    let parts: Vec<String> = counts.iter().map(|(kind, n)| format!("{kind}: {n}")).collect();
    format!("By kind: {}", parts.join(", "))
}
