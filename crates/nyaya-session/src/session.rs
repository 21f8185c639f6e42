use std::fmt;
use std::sync::Arc;

use nyaya_core::{
    AnalysisRecord, CaseRecord, Participant, ParticipantId, Roster, SessionId, Verdict,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Connecting,
    Analyzing,
    Complete,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Analyzing => "analyzing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// A protocol problem that was absorbed instead of ending the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anomaly {
    pub participant: Option<ParticipantId>,
    pub detail: String,
}

/// One review of one case. Only `SessionController` mutates it; everything
/// else sees it through `&Session` or a cloned snapshot.
#[derive(Clone, Debug)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) case: Arc<CaseRecord>,
    pub(crate) participants: Vec<Participant>,
    pub(crate) phase: SessionPhase,
    pub(crate) caption: String,
    pub(crate) verdict: Option<Verdict>,
    pub(crate) anomalies: Vec<Anomaly>,
}

impl Session {
    pub(crate) fn new(case: CaseRecord, roster: &Roster) -> Self {
        Self {
            id: SessionId::new(),
            case: Arc::new(case),
            participants: roster.members().iter().map(|id| Participant::new(*id)).collect(),
            phase: SessionPhase::Idle,
            caption: String::new(),
            verdict: None,
            anomalies: Vec::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn case(&self) -> &CaseRecord {
        &self.case
    }

    /// Participants in canonical display order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == id)
    }

    pub(crate) fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id() == id)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Set only once the phase is `complete`.
    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// The finished review for the post-verdict query. `None` unless the
    /// session completed.
    pub fn analysis_record(&self) -> Option<AnalysisRecord> {
        if self.phase != SessionPhase::Complete {
            return None;
        }
        let verdict = self.verdict.clone()?;
        let opinions = self
            .participants
            .iter()
            .filter_map(|p| p.opinion().map(|opinion| (p.id(), opinion)));
        Some(AnalysisRecord::new(
            self.case.tender_id.clone(),
            opinions,
            verdict,
        ))
    }
}
