//! At most one live review per client.

use std::sync::Arc;

use nyaya_core::{CaseRecord, SessionId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::runner::{ReviewOutcome, ReviewRunner};
use crate::session::Session;

struct ActiveReview {
    session_id: SessionId,
    cancel: CancellationToken,
    task: JoinHandle<ReviewOutcome>,
}

/// Owns the single in-flight review. Starting a new review tears down the
/// previous one first, so a discarded session never receives another frame.
pub struct ReviewDesk {
    runner: Arc<ReviewRunner>,
    active: Option<ActiveReview>,
}

impl ReviewDesk {
    pub fn new(runner: Arc<ReviewRunner>) -> Self {
        Self {
            runner,
            active: None,
        }
    }

    pub fn active_session(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|a| &a.session_id)
    }

    /// Start reviewing `case`. The returned receiver holds the latest
    /// snapshot of the new session.
    pub async fn start(&mut self, case: CaseRecord) -> watch::Receiver<Session> {
        self.abandon().await;

        let controller = self.runner.prepare(case);
        let session_id = controller.session().id().clone();
        let (tx, rx) = watch::channel(controller.session().clone());
        let cancel = CancellationToken::new();

        let runner = Arc::clone(&self.runner);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut tx = tx;
            runner.drive(controller, task_cancel, &mut tx).await
        });

        info!(session_id = %session_id, "review desk started session");
        self.active = Some(ActiveReview {
            session_id,
            cancel,
            task,
        });
        rx
    }

    /// Cancel the live review, if any, and wait for its connection to close.
    /// Returns whether there was one.
    pub async fn abandon(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!(session_id = %active.session_id, error = %e, "review task ended abnormally");
        }
        true
    }

    /// Wait for the live review to finish on its own.
    pub async fn wait(&mut self) -> Option<ReviewOutcome> {
        let active = self.active.take()?;
        match active.task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(session_id = %active.session_id, error = %e, "review task ended abnormally");
                None
            }
        }
    }
}

impl Drop for ReviewDesk {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}
