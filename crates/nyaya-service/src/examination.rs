use nyaya_core::{AnalysisRecord, CaseRecord, QuestionId};
use serde::Serialize;

use crate::client::ServiceClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Reviewer,
    Bench,
}

/// One line of the cross-examination. A question and its answer share an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub question_id: QuestionId,
    pub speaker: Speaker,
    pub content: String,
}

/// Questions put to the bench after a verdict, and its answers. Holds its
/// own copy of the finished review; the session it came from is not touched.
#[derive(Clone, Debug)]
pub struct CrossExamination {
    case: CaseRecord,
    record: AnalysisRecord,
    transcript: Vec<Exchange>,
}

impl CrossExamination {
    pub fn new(case: CaseRecord, record: AnalysisRecord) -> Self {
        Self {
            case,
            record,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    /// Ask one question. Blank questions are ignored and return `None`; any
    /// service failure is answered with the recess message.
    pub async fn ask(&mut self, client: &ServiceClient, question: &str) -> Option<&str> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        let question_id = QuestionId::new();
        self.transcript.push(Exchange {
            question_id: question_id.clone(),
            speaker: Speaker::Reviewer,
            content: question.to_string(),
        });

        let answer = client.ask_or_recess(&self.case, &self.record, question).await;
        self.transcript.push(Exchange {
            question_id,
            speaker: Speaker::Bench,
            content: answer,
        });
        self.transcript.last().map(|e| e.content.as_str())
    }
}
