//! Session state and the navigation/timer state machine.
//!
//! `SessionState` is plain data plus synchronous transitions. It knows
//! nothing about clocks or networks: every method answers with a [`Step`]
//! telling the owner what, if anything, has to happen next. The
//! [`controller`](crate::controller) owns one of these and serializes all
//! events onto it.
//!
//! ```text
//! Loading ──► Active ──► Finishing ──► Completed
//!    │          ▲            │
//!    ▼          └────────────┘ (submission failed)
//!  Failed
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ActionError, LoadError, ValidationError};
use crate::model::{
    AnswerMap, Direction, FinishTrigger, Question, QuestionSets, Subject,
};
use crate::traits::{AnswerEntry, SubmitRequest};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Loading,
    Active,
    Finishing,
    Completed,
    Failed,
}

impl Lifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Completed | Lifecycle::Failed)
    }
}

/// What the owner of the state has to do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The event is not valid in the current lifecycle state.
    Ignored,
    /// The state changed; keep going.
    Updated,
    /// The session entered `Finishing`; cancel the countdown and submit.
    Finish(FinishTrigger),
}

/// Answered vs. total questions across all subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    /// Completion percentage in `0.0..=100.0`.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.answered as f64 * 100.0 / self.total as f64
        }
    }
}

/// The single mutable entity of a running session.
#[derive(Debug, Clone)]
pub struct SessionState {
    subjects: Vec<Subject>,
    questions: QuestionSets,
    subject_index: usize,
    question_index: usize,
    answers: AnswerMap,
    remaining_secs: u64,
    lifecycle: Lifecycle,
    finish_trigger: Option<FinishTrigger>,
}

impl SessionState {
    /// Enter `Active` at the first question of the first subject.
    ///
    /// Every subject must have a non-empty question list in `questions`.
    pub fn new(
        subjects: Vec<Subject>,
        questions: QuestionSets,
        duration_secs: u64,
    ) -> Result<Self, LoadError> {
        if subjects.is_empty() {
            return Err(LoadError::NoSubjects);
        }
        for subject in &subjects {
            if questions.get(&subject.id).is_none_or(|qs| qs.is_empty()) {
                return Err(LoadError::EmptySubject {
                    subject_id: subject.id.clone(),
                });
            }
        }

        Ok(Self {
            subjects,
            questions,
            subject_index: 0,
            question_index: 0,
            answers: AnswerMap::new(),
            remaining_secs: duration_secs,
            lifecycle: Lifecycle::Active,
            finish_trigger: None,
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn questions(&self) -> &QuestionSets {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// What moved the session out of `Active` most recently.
    pub fn finish_trigger(&self) -> Option<FinishTrigger> {
        self.finish_trigger
    }

    /// `(subject_index, question_index)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.subject_index, self.question_index)
    }

    pub fn current_subject(&self) -> &Subject {
        &self.subjects[self.subject_index]
    }

    /// Questions of the subject at `index`; empty for an unknown index.
    pub fn subject_questions(&self, index: usize) -> &[Question] {
        self.subjects
            .get(index)
            .and_then(|s| self.questions.get(&s.id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn current_question(&self) -> &Question {
        &self.subject_questions(self.subject_index)[self.question_index]
    }

    pub fn progress(&self) -> Progress {
        Progress {
            answered: self.answers.len(),
            total: self.questions.values().map(Vec::len).sum(),
        }
    }

    // -- user actions -------------------------------------------------------

    /// Record `option_id` for the current question. The cursor does not move.
    pub fn answer(&mut self, option_id: &str) -> Result<Step, ActionError> {
        if self.lifecycle != Lifecycle::Active {
            return Ok(Step::Ignored);
        }
        let question = self.current_question();
        if !question.has_option(option_id) {
            return Err(ActionError::UnknownOption {
                question_id: question.id.clone(),
                option_id: option_id.to_string(),
            });
        }
        let question_id = question.id.clone();
        self.answers.select(&question_id, option_id);
        Ok(Step::Updated)
    }

    /// Move the cursor one question forward or back.
    ///
    /// `Next` on the very last question starts the finish; `Previous` on the
    /// very first question leaves the cursor where it is.
    pub fn navigate(&mut self, direction: Direction) -> Step {
        if self.lifecycle != Lifecycle::Active {
            return Step::Ignored;
        }
        match direction {
            Direction::Next => {
                let count = self.subject_questions(self.subject_index).len();
                if self.question_index + 1 < count {
                    self.question_index += 1;
                } else if self.subject_index + 1 < self.subjects.len() {
                    self.subject_index += 1;
                    self.question_index = 0;
                } else {
                    return self.begin_finish(FinishTrigger::LastQuestion);
                }
            }
            Direction::Previous => {
                if self.question_index > 0 {
                    self.question_index -= 1;
                } else if self.subject_index > 0 {
                    self.subject_index -= 1;
                    self.question_index = self
                        .subject_questions(self.subject_index)
                        .len()
                        .saturating_sub(1);
                } else {
                    return Step::Updated;
                }
            }
        }
        tracing::debug!(
            subject = self.subject_index,
            question = self.question_index,
            "cursor moved"
        );
        Step::Updated
    }

    /// Place the cursor directly on a question.
    pub fn jump(&mut self, subject: usize, question: usize) -> Result<Step, ActionError> {
        if self.lifecycle != Lifecycle::Active {
            return Ok(Step::Ignored);
        }
        if question >= self.subject_questions(subject).len() {
            return Err(ActionError::OutOfRange { subject, question });
        }
        self.subject_index = subject;
        self.question_index = question;
        Ok(Step::Updated)
    }

    /// Explicit "finish now". Also the retry path after a failed submission.
    pub fn finish(&mut self) -> Step {
        if self.lifecycle != Lifecycle::Active {
            return Step::Ignored;
        }
        self.begin_finish(FinishTrigger::Manual)
    }

    // -- clock --------------------------------------------------------------

    /// One countdown unit elapsed. Reaching zero starts the finish.
    pub fn tick(&mut self) -> Step {
        if self.lifecycle != Lifecycle::Active || self.remaining_secs == 0 {
            return Step::Ignored;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            return self.time_up();
        }
        Step::Updated
    }

    /// Finish because no time is left, regardless of answered questions.
    pub fn time_up(&mut self) -> Step {
        if self.lifecycle != Lifecycle::Active {
            return Step::Ignored;
        }
        self.remaining_secs = 0;
        self.begin_finish(FinishTrigger::Timeout)
    }

    fn begin_finish(&mut self, trigger: FinishTrigger) -> Step {
        self.lifecycle = Lifecycle::Finishing;
        self.finish_trigger = Some(trigger);
        Step::Finish(trigger)
    }

    // -- submission outcome -------------------------------------------------

    /// `Finishing → Active`. Cursor, answers and remaining time are kept.
    pub fn submission_failed(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Finishing {
            return false;
        }
        self.lifecycle = Lifecycle::Active;
        true
    }

    /// `Finishing → Completed`.
    pub fn complete(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Finishing {
            return false;
        }
        self.lifecycle = Lifecycle::Completed;
        true
    }

    /// Give up permanently (no one is left to retry).
    pub fn fail(&mut self) {
        if !self.lifecycle.is_terminal() {
            self.lifecycle = Lifecycle::Failed;
        }
    }

    // -- submission plan ----------------------------------------------------

    /// Check the structural invariants of the state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject_index >= self.subjects.len() {
            return Err(ValidationError::SubjectIndex {
                index: self.subject_index,
                count: self.subjects.len(),
            });
        }
        let count = self.subject_questions(self.subject_index).len();
        if self.question_index >= count {
            return Err(ValidationError::QuestionIndex {
                index: self.question_index,
                count,
            });
        }
        for subject in &self.subjects {
            if self.questions.get(&subject.id).is_none_or(|qs| qs.is_empty()) {
                return Err(ValidationError::MissingQuestions(subject.id.clone()));
            }
        }
        for (question_id, _) in self.answers.iter() {
            let known = self
                .questions
                .values()
                .flatten()
                .any(|q| q.id == question_id);
            if !known {
                return Err(ValidationError::UnknownAnswerKey(question_id.to_string()));
            }
        }
        Ok(())
    }

    /// One request per subject, in subject order, with one entry per loaded
    /// question.
    pub fn submission_plan(&self) -> Result<Vec<SubmitRequest>, ValidationError> {
        self.validate()?;
        Ok(self
            .subjects
            .iter()
            .zip(0..)
            .map(|(subject, index)| SubmitRequest {
                subject_id: subject.id.clone(),
                answers: self
                    .subject_questions(index)
                    .iter()
                    .map(|q| AnswerEntry {
                        question_id: q.id.clone(),
                        selected_option_id: self.answers.get(&q.id).map(str::to_string),
                    })
                    .collect(),
            })
            .collect())
    }

    /// Read-only view of the current position.
    pub fn snapshot(&self) -> SessionSnapshot {
        let question = self.current_question();
        SessionSnapshot {
            lifecycle: self.lifecycle,
            subject_index: self.subject_index,
            question_index: self.question_index,
            subject_count: self.subjects.len(),
            subject: self.current_subject().clone(),
            question: question.clone(),
            selected_option_id: self.answers.get(&question.id).map(str::to_string),
            answered_in_subject: self
                .subject_questions(self.subject_index)
                .iter()
                .map(|q| self.answers.contains(&q.id))
                .collect(),
            remaining_secs: self.remaining_secs,
            progress: self.progress(),
            last_error: None,
        }
    }
}

/// Point-in-time view of a session, for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub lifecycle: Lifecycle,
    pub subject_index: usize,
    pub question_index: usize,
    pub subject_count: usize,
    pub subject: Subject,
    pub question: Question,
    pub selected_option_id: Option<String>,
    /// One flag per question of the current subject.
    pub answered_in_subject: Vec<bool>,
    pub remaining_secs: u64,
    pub progress: Progress,
    /// Reason of the most recent failed submission, if the session is
    /// waiting for a retry.
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    /// `true` on the last question of the last subject.
    pub fn is_last_question(&self) -> bool {
        self.subject_index + 1 == self.subject_count
            && self.question_index + 1 == self.answered_in_subject.len()
    }
}
