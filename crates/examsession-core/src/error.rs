//! Error types for the session engine.
//!
//! `ServiceError` describes one failed request to an external collaborator;
//! HTTP clients and mocks both produce it, and the loader and submission
//! coordinator wrap it with subject context.

use thiserror::Error;

/// A single request to the content or scoring service failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service does not know the requested resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with an error status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request did not complete in time.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The service could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Loading the question sets failed; no session is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The session was started with no subjects.
    #[error("no subjects selected")]
    NoSubjects,

    /// The configured countdown unit has zero length.
    #[error("countdown tick length must be greater than zero")]
    ZeroTick,

    /// The content service failed for one subject.
    #[error("failed to load questions for subject '{subject_id}': {source}")]
    Service {
        subject_id: String,
        #[source]
        source: ServiceError,
    },

    /// A subject resolved to zero questions.
    #[error("subject '{subject_id}' has no questions")]
    EmptySubject { subject_id: String },

    /// The content service returned structurally unusable data.
    #[error("malformed question set for subject '{subject_id}': {reason}")]
    Malformed { subject_id: String, reason: String },
}

/// Submitting the answers failed; nothing is handed off.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// At least one subject's scoring request failed.
    #[error("submission failed for subject '{subject_id}': {source}")]
    Service {
        subject_id: String,
        #[source]
        source: ServiceError,
        /// How many subjects failed in total.
        failed_subjects: usize,
    },

    /// A subject's scoring request exceeded the configured bound.
    #[error("submission for subject '{subject_id}' timed out after {secs}s")]
    Timeout { subject_id: String, secs: u64 },

    /// The session state could not be turned into a submission.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl SubmissionError {
    /// Human-readable reason, suitable for showing to the candidate.
    pub fn reason(&self) -> String {
        match self {
            SubmissionError::Service { source, .. } => match source {
                ServiceError::Api { message, .. } if !message.is_empty() => message.clone(),
                other => other.to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// The session state violates a structural invariant.
///
/// Unreachable while the state machine's invariants hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("subject index {index} out of range ({count} subjects)")]
    SubjectIndex { index: usize, count: usize },

    #[error("question index {index} out of range ({count} questions)")]
    QuestionIndex { index: usize, count: usize },

    #[error("no questions loaded for subject '{0}'")]
    MissingQuestions(String),

    #[error("answer recorded for unknown question '{0}'")]
    UnknownAnswerKey(String),
}

/// A user action the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The option does not belong to the current question.
    #[error("option '{option_id}' does not belong to question '{question_id}'")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },

    /// A jump target lies outside the loaded question sets.
    #[error("no question at subject {subject}, question {question}")]
    OutOfRange { subject: usize, question: usize },

    /// The session controller is no longer running.
    #[error("session is closed")]
    SessionClosed,
}
