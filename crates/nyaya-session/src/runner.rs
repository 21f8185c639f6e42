//! Drives one `SessionController` over a `Connector`.

use std::sync::Arc;

use nyaya_core::{CaseRecord, Roster};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::controller::{Directive, SessionController};
use crate::session::{Session, SessionPhase};
use crate::transport::{Connection, Connector};

/// How a review ended.
#[derive(Debug)]
pub enum ReviewOutcome {
    Completed(Session),
    Failed(Session),
    /// Cancelled by the reviewer. The session is discarded.
    Abandoned,
}

impl ReviewOutcome {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Completed(session) | Self::Failed(session) => Some(session),
            Self::Abandoned => None,
        }
    }

    fn from_controller(controller: SessionController) -> Self {
        let session = controller.into_session();
        match session.phase() {
            SessionPhase::Complete => Self::Completed(session),
            _ => Self::Failed(session),
        }
    }
}

/// Receives a snapshot after every processed input.
pub trait SessionObserver: Send {
    fn on_update(&mut self, session: &Session);
}

impl SessionObserver for () {
    fn on_update(&mut self, _session: &Session) {}
}

impl SessionObserver for watch::Sender<Session> {
    fn on_update(&mut self, session: &Session) {
        self.send_replace(session.clone());
    }
}

enum Wake<T> {
    Cancelled,
    Ready(T),
}

pub struct ReviewRunner {
    connector: Arc<dyn Connector>,
    roster: Roster,
}

impl ReviewRunner {
    pub fn new(connector: Arc<dyn Connector>, roster: Roster) -> Self {
        Self { connector, roster }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// A fresh controller for `case` on this runner's roster.
    pub fn prepare(&self, case: CaseRecord) -> SessionController {
        SessionController::new(case, self.roster.clone())
    }

    pub async fn run(
        &self,
        case: CaseRecord,
        cancel: CancellationToken,
        observer: &mut dyn SessionObserver,
    ) -> ReviewOutcome {
        self.drive(self.prepare(case), cancel, observer).await
    }

    /// Run `controller` to a terminal phase or until `cancel` fires. Frames are
    /// processed one at a time, and the observer sees each result before the
    /// next frame is read.
    pub async fn drive(
        &self,
        controller: SessionController,
        cancel: CancellationToken,
        observer: &mut dyn SessionObserver,
    ) -> ReviewOutcome {
        let span = info_span!("review", session_id = %controller.session().id());
        self.drive_inner(controller, cancel, observer)
            .instrument(span)
            .await
    }

    async fn drive_inner(
        &self,
        mut controller: SessionController,
        cancel: CancellationToken,
        observer: &mut dyn SessionObserver,
    ) -> ReviewOutcome {
        if let Err(e) = controller.start() {
            warn!(error = %e, "review not started");
            return ReviewOutcome::from_controller(controller);
        }
        observer.on_update(controller.session());

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Cancelled,
            result = self.connector.connect() => Wake::Ready(result),
        };
        let mut connection = match connected {
            Wake::Cancelled => {
                controller.abandon();
                return ReviewOutcome::Abandoned;
            }
            Wake::Ready(Ok(connection)) => connection,
            Wake::Ready(Err(err)) => {
                controller.on_transport_error(&err);
                observer.on_update(controller.session());
                return ReviewOutcome::from_controller(controller);
            }
        };

        let directive = match controller.on_connected() {
            Ok(directive) => directive,
            Err(e) => {
                warn!(error = %e, "case not transmitted");
                None
            }
        };
        execute(connection.as_mut(), &mut controller, directive).await;
        observer.on_update(controller.session());

        while !controller.phase().is_terminal() {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                frame = connection.next_frame() => Wake::Ready(frame),
            };
            let directive = match wake {
                Wake::Cancelled => {
                    if controller.abandon() == Some(Directive::Close) {
                        close(connection.as_mut()).await;
                    }
                    return ReviewOutcome::Abandoned;
                }
                Wake::Ready(Some(Ok(frame))) => controller.on_frame(&frame),
                Wake::Ready(Some(Err(err))) => controller.on_transport_error(&err),
                Wake::Ready(None) => {
                    controller.on_transport_closed();
                    None
                }
            };
            execute(connection.as_mut(), &mut controller, directive).await;
            observer.on_update(controller.session());
        }

        ReviewOutcome::from_controller(controller)
    }
}

/// Carry out a directive, feeding send failures back into the controller.
async fn execute(
    connection: &mut dyn Connection,
    controller: &mut SessionController,
    mut directive: Option<Directive>,
) {
    while let Some(next) = directive.take() {
        match next {
            Directive::Send(frame) => {
                if let Err(err) = connection.send(frame).await {
                    directive = controller.on_transport_error(&err);
                }
            }
            Directive::Close => close(connection).await,
        }
    }
}

async fn close(connection: &mut dyn Connection) {
    if let Err(err) = connection.close().await {
        debug!(error = %err, kind = err.error_kind(), "close failed");
    }
}
