//! Core data model types for examsession.
//!
//! Subjects and questions are immutable once a session starts. The
//! `AnswerMap` is the only piece of user-driven data, and it is mutated
//! exclusively through the session state machine.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gradable topic area within one assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject code used by the content and scoring services.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether the subject is mandatory for the exam.
    #[serde(default)]
    pub mandatory: bool,
    /// Maximum achievable score.
    pub max_score: u32,
}

/// An assessable item with its selectable answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// The subject this question belongs to.
    pub subject_id: String,
    /// Prompt text shown to the candidate.
    pub prompt: String,
    /// Selectable answers, in display order.
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Returns `true` if `option_id` is one of this question's options.
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// A selectable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
}

/// Loaded question lists keyed by subject id.
pub type QuestionSets = HashMap<String, Vec<Question>>;

/// Sparse record of the candidate's choices: question id → option id.
///
/// Absent entries mean "unanswered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<String, String>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected option for a question, if answered.
    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.0.get(question_id).map(String::as_str)
    }

    /// Insert or overwrite the selection for a question.
    pub(crate) fn select(&mut self, question_id: &str, option_id: &str) {
        self.0.insert(question_id.to_string(), option_id.to_string());
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.0.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(q, o)| (q.as_str(), o.as_str()))
    }
}

impl FromIterator<(String, String)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-question verdict returned by the scoring service, when it reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerVerdict {
    pub question_id: String,
    #[serde(default)]
    pub selected_option_id: Option<String>,
    pub is_correct: bool,
    #[serde(default)]
    pub correct_option_id: Option<String>,
}

/// The graded outcome of one subject's submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// Identifier assigned by the scoring service.
    pub id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub score: u32,
    pub max_score: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    /// When the scoring service recorded the result.
    pub timestamp: DateTime<Utc>,
    /// The acting user the session ran for.
    pub user_id: String,
    /// Optional per-question breakdown.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<AnswerVerdict>,
}

/// What caused a session to leave the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishTrigger {
    /// `Next` pressed on the last question of the last subject.
    LastQuestion,
    /// Explicit "finish now" (also used for retries).
    Manual,
    /// The countdown reached zero.
    Timeout,
}

impl fmt::Display for FinishTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishTrigger::LastQuestion => write!(f, "last-question"),
            FinishTrigger::Manual => write!(f, "manual"),
            FinishTrigger::Timeout => write!(f, "timeout"),
        }
    }
}

/// Cursor movement over the flattened (subject, question) sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "next" | "n" => Ok(Direction::Next),
            "previous" | "prev" | "p" => Ok(Direction::Previous),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Render a number of seconds as `HH:MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
