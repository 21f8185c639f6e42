//! Scripted transport for deterministic tests without a reviewing service.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use nyaya_core::{Bid, CaseRecord, ProcurementMethod};
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::transport::{Connection, Connector};

/// One scripted step on the inbound side of a connection.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Deliver this raw frame.
    Frame(String),
    /// Fail the receive with this reason.
    Fail(String),
    /// Close the channel from the remote side.
    Hangup,
    /// Never deliver anything again.
    Stall,
}

/// What the scripted connections saw, shared with the test.
#[derive(Debug, Default)]
pub struct ConnectionLog {
    connects: Mutex<usize>,
    sent: Mutex<Vec<String>>,
    closes: Mutex<usize>,
}

impl ConnectionLog {
    pub fn connects(&self) -> usize {
        *self.connects.lock()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock()
    }
}

/// Connector that hands out pre-programmed connections in sequence. A
/// connect with no script left is refused.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    refusal: Option<String>,
    log: Arc<ConnectionLog>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self::sequence(vec![steps])
    }

    pub fn sequence(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            refusal: None,
            log: Arc::default(),
        }
    }

    /// Every connect fails with `reason`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            refusal: Some(reason.into()),
            log: Arc::default(),
        }
    }

    /// Convenience: deliver these frames, then hang up.
    pub fn frames(frames: impl IntoIterator<Item = String>) -> Self {
        let mut steps: Vec<_> = frames.into_iter().map(ScriptStep::Frame).collect();
        steps.push(ScriptStep::Hangup);
        Self::new(steps)
    }

    pub fn log(&self) -> Arc<ConnectionLog> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        *self.log.connects.lock() += 1;
        if let Some(reason) = &self.refusal {
            return Err(TransportError::Connect(reason.clone()));
        }
        let steps = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Connect("no scripted connection left".into()))?;
        Ok(Box::new(ScriptedConnection {
            steps: steps.into(),
            log: Arc::clone(&self.log),
            closed: false,
        }))
    }
}

struct ScriptedConnection {
    steps: VecDeque<ScriptStep>,
    log: Arc<ConnectionLog>,
    closed: bool,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send("connection closed".into()));
        }
        self.log.sent.lock().push(frame);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        if self.closed {
            return None;
        }
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => Some(Ok(frame)),
            Some(ScriptStep::Fail(reason)) => Some(Err(TransportError::Receive(reason))),
            Some(ScriptStep::Hangup) | None => None,
            Some(ScriptStep::Stall) => futures::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        *self.log.closes.lock() += 1;
        Ok(())
    }
}

/// A small valid case for tests and demos.
pub fn sample_case() -> CaseRecord {
    CaseRecord {
        tender_id: "TENDER-2024-001".into(),
        title: "Supply of Computer Equipment for Government Schools".into(),
        department: "Department of Education".into(),
        estimated_value: 5_000_000.0,
        procurement_method: ProcurementMethod::LimitedTender,
        publication_date: "2024-01-15".into(),
        bid_opening_date: "2024-01-25".into(),
        bids: vec![
            Bid {
                vendor_name: "ABC Technologies".into(),
                bid_amount: 4_800_000.0,
                is_msme: false,
                technical_score: Some(85.0),
            },
            Bid {
                vendor_name: "XYZ Computers".into(),
                bid_amount: 5_100_000.0,
                is_msme: true,
                technical_score: Some(82.0),
            },
        ],
        selected_vendor: "ABC Technologies".into(),
        selection_reason: "Lowest bid".into(),
        documents_available: vec!["Tender Notice".into()],
    }
}

/// Builders for raw frames as the reviewing service sends them.
pub mod frames {
    use serde_json::{json, Value};

    pub fn info(message: &str) -> String {
        json!({"status": "info", "message": message}).to_string()
    }

    pub fn progress(agent: &str, state: &str) -> String {
        json!({"status": "progress", "agent": agent, "state": state}).to_string()
    }

    pub fn progress_with_opinion(agent: &str, opinion: Value) -> String {
        json!({"status": "progress", "agent": agent, "state": "completed", "result": opinion})
            .to_string()
    }

    pub fn thought(agent: &str, message: &str) -> String {
        json!({"status": "thought", "agent": agent, "message": message}).to_string()
    }

    pub fn complete(opinions: &[(&str, Value)], verdict: Value) -> String {
        let agent_opinions: serde_json::Map<String, Value> = opinions
            .iter()
            .map(|(key, opinion)| (key.to_string(), opinion.clone()))
            .collect();
        json!({
            "status": "complete",
            "result": {
                "case_id": "TENDER-2024-001",
                "agent_opinions": agent_opinions,
                "verdict": verdict,
            }
        })
        .to_string()
    }

    pub fn error(message: Option<&str>) -> String {
        match message {
            Some(message) => json!({"status": "error", "message": message}).to_string(),
            None => json!({"status": "error"}).to_string(),
        }
    }

    /// An opinion with one finding of the given severity.
    pub fn opinion(stance: &str, severity: &str) -> Value {
        json!({
            "stance": stance,
            "citizen_explanation": format!("The bench leans {stance} on this tender."),
            "findings": [
                {"rule_violated": "GFR 2017 Rule 161", "issue": "Bid window shorter than 21 days", "severity": severity}
            ]
        })
    }

    pub fn verdict(label: &str, score: f64) -> Value {
        json!({
            "verdict": label,
            "constitutional_score": score,
            "citizen_summary": "The procurement process needs corrective action.",
            "critical_issues": ["Bid window shorter than 21 days"],
            "mandatory_actions": ["Re-issue the tender with a 21-day window"]
        })
    }
}
