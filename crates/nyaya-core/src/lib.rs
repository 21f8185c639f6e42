pub mod case;
pub mod errors;
pub mod ids;
pub mod participant;
pub mod roster;
pub mod verdict;

pub use case::{Bid, CaseRecord, ProcurementMethod};
pub use errors::{CaseError, VerdictError};
pub use ids::{QuestionId, SessionId};
pub use participant::{
    Applied, Finding, Opinion, Participant, ParticipantId, ParticipantStatus, ParticipantUpdate,
    Severity, Stance, TransitionAnomaly,
};
pub use roster::{Roster, RosterVariant};
pub use verdict::{AnalysisRecord, ScoreBand, Verdict, VerdictLabel};
