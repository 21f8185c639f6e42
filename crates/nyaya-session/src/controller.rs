//! Session controller.
//!
//! ```text
//! idle ─start─▶ connecting ─on_connected─▶ analyzing ─Complete─▶ complete
//!                   │                          │
//!                   └──── transport error ─────┴─ Failure / close ─▶ failed
//! ```
//!
//! The controller never performs I/O. Every input returns at most one
//! `Directive` for the runner to execute, and the link state guarantees the
//! case is sent once and the connection closed once.

use std::collections::BTreeMap;

use nyaya_core::{
    Applied, CaseRecord, Opinion, ParticipantId, ParticipantUpdate, Roster, Verdict,
};
use tracing::{debug, info, warn};

use crate::codec::{encode_case, FrameCodec, ProgressState, ReviewEvent};
use crate::error::{SessionError, TransportError};
use crate::session::{Anomaly, Session, SessionPhase};

pub mod captions {
    pub const CONNECTING: &str = "Initializing connection...";
    pub const SUBMITTED: &str = "Case submitted. Awaiting the Constitutional Bench...";
    pub const COMPLETE: &str = "Verdict delivered.";
    pub const CONNECTION_FAILED: &str = "Could not reach the reviewing service.";
    pub const CONNECTION_LOST: &str = "Connection to the reviewing service was lost.";
    pub const UNREADABLE_UPDATE: &str = "Received an unreadable update from the reviewing service.";
    pub const UNREADABLE_RESULT: &str = "The reviewing service returned an unreadable result.";
    pub use crate::codec::UNSPECIFIED_FAILURE as SERVICE_ERROR;

    pub fn analyzing(label: &str) -> String {
        format!("{label} agent is analyzing...")
    }
}

/// Work the runner must perform on the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    Send(String),
    Close,
}

/// Lifecycle of the one connection a session owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Unopened,
    Opening,
    Open,
    Closed,
}

pub struct SessionController {
    session: Session,
    codec: FrameCodec,
    link: LinkState,
}

impl SessionController {
    pub fn new(case: CaseRecord, roster: Roster) -> Self {
        let session = Session::new(case, &roster);
        Self {
            session,
            codec: FrameCodec::new(roster),
            link: LinkState::Unopened,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// `idle → connecting`. The caller opens the connection next.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Idle, "start")?;
        self.session.phase = SessionPhase::Connecting;
        self.session.caption = captions::CONNECTING.to_string();
        self.link = LinkState::Opening;
        info!(session_id = %self.session.id, tender_id = %self.session.case.tender_id, "review started");
        Ok(())
    }

    /// `connecting → analyzing`: the connection is writable, so the case goes
    /// out now and never again.
    pub fn on_connected(&mut self) -> Result<Option<Directive>, SessionError> {
        self.expect_phase(SessionPhase::Connecting, "transmit the case")?;
        self.link = LinkState::Open;

        match encode_case(&self.session.case) {
            Ok(frame) => {
                self.session.phase = SessionPhase::Analyzing;
                self.session.caption = captions::SUBMITTED.to_string();
                info!(session_id = %self.session.id, "case transmitted");
                Ok(Some(Directive::Send(frame)))
            }
            Err(e) => {
                warn!(session_id = %self.session.id, kind = "encode", detail = %e, "case could not be encoded");
                Ok(self.fail(captions::CONNECTION_FAILED))
            }
        }
    }

    /// Decode and apply one raw inbound frame.
    pub fn on_frame(&mut self, raw: &str) -> Option<Directive> {
        if self.session.phase != SessionPhase::Analyzing {
            debug!(session_id = %self.session.id, phase = %self.session.phase, "frame ignored");
            return None;
        }
        debug!(session_id = %self.session.id, frame = raw, "frame received");

        match self.codec.decode(raw) {
            Ok(event) => self.apply(event),
            Err(err) => {
                self.record_anomaly(None, err.to_string());
                if err.is_terminal() {
                    self.fail(captions::UNREADABLE_RESULT)
                } else {
                    self.session.caption = captions::UNREADABLE_UPDATE.to_string();
                    None
                }
            }
        }
    }

    /// Apply one decoded event. Only meaningful while analyzing; events for a
    /// session in any other phase are dropped.
    pub fn apply(&mut self, event: ReviewEvent) -> Option<Directive> {
        if self.session.phase != SessionPhase::Analyzing {
            debug!(session_id = %self.session.id, kind = %event.kind(), "event ignored");
            return None;
        }

        match event {
            ReviewEvent::Info { message } => {
                self.session.caption = message;
                None
            }
            ReviewEvent::Progress {
                participant,
                state: ProgressState::Analyzing,
                ..
            } => {
                if self
                    .update_participant(participant, ParticipantUpdate::Analyzing)
                    .is_some()
                {
                    self.session.caption = captions::analyzing(participant.label());
                }
                None
            }
            ReviewEvent::Progress {
                participant,
                state: ProgressState::Completed,
                opinion,
            } => {
                self.update_participant(participant, ParticipantUpdate::Completed(opinion));
                None
            }
            ReviewEvent::Thought {
                participant,
                message,
            } => {
                self.update_participant(participant, ParticipantUpdate::Thought(message));
                None
            }
            ReviewEvent::Complete { verdict, opinions } => self.complete(verdict, opinions),
            ReviewEvent::Failure { message } => {
                warn!(session_id = %self.session.id, kind = "service_error", detail = %message, "reviewing service reported failure");
                self.fail(message)
            }
        }
    }

    /// The remote side closed the channel. Nothing left to close.
    pub fn on_transport_closed(&mut self) {
        self.link = LinkState::Closed;
        if self.session.phase.is_terminal() {
            return;
        }
        warn!(session_id = %self.session.id, kind = "hangup", phase = %self.session.phase, "connection closed before a verdict");
        self.fail(captions::CONNECTION_LOST);
    }

    pub fn on_transport_error(&mut self, err: &TransportError) -> Option<Directive> {
        if self.session.phase.is_terminal() {
            debug!(session_id = %self.session.id, error = %err, "transport error after terminal phase");
            return None;
        }
        warn!(
            session_id = %self.session.id,
            kind = err.error_kind(),
            detail = %err,
            "transport failure"
        );
        let caption = match err {
            TransportError::Connect(_) => captions::CONNECTION_FAILED,
            _ => captions::CONNECTION_LOST,
        };
        self.fail(caption)
    }

    /// Discard the session. Consumes the controller so nothing can touch the
    /// session afterwards; returns `Close` if the link is still open.
    pub fn abandon(self) -> Option<Directive> {
        info!(session_id = %self.session.id, phase = %self.session.phase, "review abandoned");
        (self.link == LinkState::Open).then_some(Directive::Close)
    }

    fn complete(&mut self, verdict: Verdict, opinions: Vec<(ParticipantId, Opinion)>) -> Option<Directive> {
        let mut opinions: BTreeMap<ParticipantId, Opinion> = opinions.into_iter().collect();
        let session_id = self.session.id.clone();

        for participant in &mut self.session.participants {
            let opinion = opinions.remove(&participant.id());
            if opinion.is_none() && participant.opinion().is_none() {
                warn!(session_id = %session_id, participant = %participant.id(), kind = "missing_opinion", "completed without an opinion");
            }
            // Finalized is accepted from every status.
            let _ = participant.apply(ParticipantUpdate::Finalized(opinion));
        }
        for stray in opinions.into_keys() {
            self.record_anomaly(Some(stray), format!("{stray} is not on this session's roster"));
        }

        info!(
            session_id = %self.session.id,
            verdict = %verdict.verdict,
            score = verdict.constitutional_score,
            "verdict delivered"
        );
        self.session.verdict = Some(verdict);
        self.session.phase = SessionPhase::Complete;
        self.session.caption = captions::COMPLETE.to_string();
        self.close_link()
    }

    fn fail(&mut self, caption: impl Into<String>) -> Option<Directive> {
        if self.session.phase.is_terminal() {
            return None;
        }
        self.session.phase = SessionPhase::Failed;
        self.session.verdict = None;
        self.session.caption = caption.into();
        warn!(session_id = %self.session.id, kind = "review_failed", detail = %self.session.caption, "review failed");
        self.close_link()
    }

    fn close_link(&mut self) -> Option<Directive> {
        let was_open = self.link == LinkState::Open;
        self.link = LinkState::Closed;
        was_open.then_some(Directive::Close)
    }

    /// Route one update to its participant. Refused updates become anomalies.
    fn update_participant(&mut self, id: ParticipantId, update: ParticipantUpdate) -> Option<Applied> {
        let Some(participant) = self.session.participant_mut(id) else {
            self.record_anomaly(Some(id), format!("{id} is not on this session's roster"));
            return None;
        };
        match participant.apply(update) {
            Ok(applied) => Some(applied),
            Err(anomaly) => {
                self.record_anomaly(Some(id), anomaly.to_string());
                None
            }
        }
    }

    fn record_anomaly(&mut self, participant: Option<ParticipantId>, detail: String) {
        match participant {
            Some(p) => warn!(session_id = %self.session.id, participant = %p, kind = "protocol", detail = %detail, "protocol anomaly"),
            None => warn!(session_id = %self.session.id, kind = "protocol", detail = %detail, "protocol anomaly"),
        }
        self.session.anomalies.push(Anomaly { participant, detail });
    }

    fn expect_phase(&self, expected: SessionPhase, action: &'static str) -> Result<(), SessionError> {
        if self.session.phase == expected {
            Ok(())
        } else {
            Err(SessionError::IllegalPhase {
                action,
                phase: self.session.phase,
            })
        }
    }
}
