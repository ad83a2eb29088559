//! Collaborator traits the session engine calls into.
//!
//! The content and scoring services are implemented by the
//! `examsession-providers` crate; results handoffs by `examsession-report`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, SubmissionError};
use crate::model::{Question, SubmissionResult};
use crate::outcome::ExamOutcome;
use crate::session::Lifecycle;

// ---------------------------------------------------------------------------
// Content service
// ---------------------------------------------------------------------------

/// Source of question sets.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Human-readable service name (e.g. "http").
    fn name(&self) -> &str;

    /// Fetch the ordered questions of one subject.
    async fn get_questions(&self, subject_id: &str) -> Result<Vec<Question>, ServiceError>;
}

// ---------------------------------------------------------------------------
// Scoring service
// ---------------------------------------------------------------------------

/// Grades one subject's answers.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Human-readable service name (e.g. "http").
    fn name(&self) -> &str;

    /// Submit the answers for one subject and return the graded result.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, ServiceError>;
}

/// Answers for one subject, one entry per loaded question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub subject_id: String,
    pub answers: Vec<AnswerEntry>,
}

/// One question of a submission; `selected_option_id` is absent when unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
}

impl SubmitRequest {
    /// Number of entries carrying a selection.
    pub fn answered(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.selected_option_id.is_some())
            .count()
    }
}

// ---------------------------------------------------------------------------
// Results handoff
// ---------------------------------------------------------------------------

/// Consumer of a completed session's aggregated outcome.
pub trait ResultsHandoff: Send + Sync {
    /// Receive the finished outcome. Called exactly once per completed
    /// session, on the blocking thread pool, so file or other synchronous
    /// I/O is fine here.
    fn deliver(&self, outcome: &ExamOutcome) -> anyhow::Result<()>;
}

/// Handoff that drops the outcome; the controller's return value still carries it.
pub struct DiscardHandoff;

impl ResultsHandoff for DiscardHandoff {
    fn deliver(&self, _: &ExamOutcome) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Progress notifications from a running session.
pub trait SessionObserver: Send + Sync {
    fn on_lifecycle(&self, lifecycle: Lifecycle);
    fn on_tick(&self, remaining_secs: u64);
    fn on_submission_error(&self, error: &SubmissionError);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_lifecycle(&self, _: Lifecycle) {}
    fn on_tick(&self, _: u64) {}
    fn on_submission_error(&self, _: &SubmissionError) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_wire_shape() {
        let request = SubmitRequest {
            subject_id: "math".into(),
            answers: vec![
                AnswerEntry {
                    question_id: "q1".into(),
                    selected_option_id: Some("o2".into()),
                },
                AnswerEntry {
                    question_id: "q2".into(),
                    selected_option_id: None,
                },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subjectId": "math",
                "answers": [
                    {"questionId": "q1", "selectedOptionId": "o2"},
                    {"questionId": "q2"}
                ]
            })
        );
        assert_eq!(request.answered(), 1);
    }
}
