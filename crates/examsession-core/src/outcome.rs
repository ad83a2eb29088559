//! The aggregated outcome of a completed session, with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AnswerMap, FinishTrigger, QuestionSets, Subject, SubmissionResult};

/// Everything a results consumer receives once a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamOutcome {
    /// Unique session identifier.
    pub session_id: Uuid,
    /// The acting user.
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// What ended the successful attempt.
    pub trigger: FinishTrigger,
    /// One result per subject, in subject order.
    pub results: Vec<SubmissionResult>,
    pub totals: OutcomeTotals,
    /// Review data: the subjects, their questions and the final answers.
    pub subjects: Vec<Subject>,
    pub questions: QuestionSets,
    pub answers: AnswerMap,
}

/// Sums across all subjects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub score: u32,
    pub max_score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
}

impl OutcomeTotals {
    pub fn from_results(results: &[SubmissionResult]) -> Self {
        results.iter().fold(Self::default(), |acc, r| Self {
            score: acc.score + r.score,
            max_score: acc.max_score + r.max_score,
            correct_answers: acc.correct_answers + r.correct_answers,
            total_questions: acc.total_questions + r.total_questions,
        })
    }

    /// Mean score per subject.
    pub fn average_score(&self, subjects: usize) -> f64 {
        if subjects == 0 {
            0.0
        } else {
            self.score as f64 / subjects as f64
        }
    }
}

impl ExamOutcome {
    /// Save the outcome as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize outcome")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write outcome to {}", path.display()))?;
        Ok(())
    }

    /// Load an outcome from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read outcome from {}", path.display()))?;
        let outcome: ExamOutcome =
            serde_json::from_str(&content).context("failed to parse outcome JSON")?;
        Ok(outcome)
    }
}
