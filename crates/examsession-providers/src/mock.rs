//! In-memory content and scoring services.
//!
//! Used by tests and by `examsession run --offline`. The scoring mock
//! grades the way the platform does: only keyed correct options count,
//! unanswered entries are skipped, and the score is scaled to the
//! subject's maximum.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use examsession_core::error::ServiceError;
use examsession_core::model::{AnswerVerdict, Question, QuestionSets, Subject, SubmissionResult};
use examsession_core::plan::ExamPlan;
use examsession_core::traits::{ContentService, ScoringService, SubmitRequest};

/// Serves fixed question sets.
pub struct MockContentService {
    sets: QuestionSets,
    failing: HashSet<String>,
    call_count: AtomicU32,
}

impl MockContentService {
    pub fn new(sets: QuestionSets) -> Self {
        Self {
            sets,
            failing: HashSet::new(),
            call_count: AtomicU32::new(0),
        }
    }

    /// Serve the plan's embedded question bank.
    pub fn from_plan(plan: &ExamPlan) -> Self {
        let mut sets = QuestionSets::new();
        for entry in &plan.bank {
            sets.entry(entry.question.subject_id.clone())
                .or_insert_with(Vec::new)
                .push(entry.question.clone());
        }
        Self::new(sets)
    }

    /// Make every request for `subject_id` fail.
    pub fn with_failure(mut self, subject_id: &str) -> Self {
        self.failing.insert(subject_id.to_string());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentService for MockContentService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_questions(&self, subject_id: &str) -> Result<Vec<Question>, ServiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(subject_id) {
            return Err(ServiceError::Network(format!(
                "simulated outage for subject '{subject_id}'"
            )));
        }
        // Unknown subjects have no questions, like the platform.
        Ok(self.sets.get(subject_id).cloned().unwrap_or_default())
    }
}

/// Grades submissions against an answer key.
pub struct MockScoringService {
    subjects: HashMap<String, Subject>,
    questions: HashMap<String, Vec<String>>,
    key: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, u32>>,
    next_id: AtomicU32,
}

impl MockScoringService {
    /// `key` maps question id → correct option id.
    pub fn new(subjects: &[Subject], sets: &QuestionSets, key: HashMap<String, String>) -> Self {
        Self {
            subjects: subjects
                .iter()
                .map(|s| (s.id.clone(), s.clone()))
                .collect(),
            questions: sets
                .iter()
                .map(|(subject, qs)| (subject.clone(), qs.iter().map(|q| q.id.clone()).collect()))
                .collect(),
            key,
            delays: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Grade against the plan's embedded bank and answer key.
    pub fn from_plan(plan: &ExamPlan) -> Self {
        let mut sets = QuestionSets::new();
        let mut key = HashMap::new();
        for entry in &plan.bank {
            sets.entry(entry.question.subject_id.clone())
                .or_insert_with(Vec::new)
                .push(entry.question.clone());
            if let Some(correct) = &entry.correct_option_id {
                key.insert(entry.question.id.clone(), correct.clone());
            }
        }
        Self::new(&plan.subjects, &sets, key)
    }

    /// Delay every response for `subject_id`.
    pub fn with_delay(mut self, subject_id: &str, delay: Duration) -> Self {
        self.delays.insert(subject_id.to_string(), delay);
        self
    }

    /// Start failing requests for `subject_id`.
    pub fn fail_subject(&self, subject_id: &str) {
        self.lock_failing().insert(subject_id.to_string());
    }

    /// Stop failing requests for `subject_id`.
    pub fn recover_subject(&self, subject_id: &str) {
        self.lock_failing().remove(subject_id);
    }

    /// Number of requests received for one subject.
    pub fn calls_for(&self, subject_id: &str) -> u32 {
        self.lock_calls().get(subject_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.lock_calls().values().sum()
    }

    fn lock_failing(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.failing.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn grade(&self, request: &SubmitRequest) -> Result<SubmissionResult, ServiceError> {
        let subject = self
            .subjects
            .get(&request.subject_id)
            .ok_or_else(|| ServiceError::NotFound(request.subject_id.clone()))?;
        let known = self
            .questions
            .get(&request.subject_id)
            .filter(|qs| !qs.is_empty())
            .ok_or_else(|| ServiceError::Api {
                status: 400,
                message: "subject has no questions".into(),
            })?;

        let mut correct = 0u32;
        let mut verdicts = Vec::new();
        for entry in &request.answers {
            if !known.contains(&entry.question_id) {
                return Err(ServiceError::Api {
                    status: 400,
                    message: format!(
                        "question '{}' not found in subject '{}'",
                        entry.question_id, request.subject_id
                    ),
                });
            }
            let Some(selected) = &entry.selected_option_id else {
                continue;
            };
            let expected = self.key.get(&entry.question_id);
            let is_correct = expected == Some(selected);
            if is_correct {
                correct += 1;
            }
            verdicts.push(AnswerVerdict {
                question_id: entry.question_id.clone(),
                selected_option_id: Some(selected.clone()),
                is_correct,
                correct_option_id: expected.cloned(),
            });
        }

        let total = known.len() as u32;
        let max_score = if subject.max_score == 0 {
            total
        } else {
            subject.max_score
        };
        let score = (f64::from(correct) * f64::from(max_score) / f64::from(total)).round() as u32;

        Ok(SubmissionResult {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            score,
            max_score,
            total_questions: total,
            correct_answers: correct,
            timestamp: Utc::now(),
            user_id: String::new(),
            answers: verdicts,
        })
    }
}

#[async_trait]
impl ScoringService for MockScoringService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, ServiceError> {
        *self
            .lock_calls()
            .entry(request.subject_id.clone())
            .or_insert(0) += 1;

        if let Some(delay) = self.delays.get(&request.subject_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.lock_failing().contains(&request.subject_id) {
            return Err(ServiceError::Api {
                status: 503,
                message: format!("scoring unavailable for '{}'", request.subject_id),
            });
        }
        self.grade(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examsession_core::model::AnswerOption;
    use examsession_core::traits::AnswerEntry;

    fn fixture() -> (Vec<Subject>, QuestionSets, HashMap<String, String>) {
        let subjects = vec![Subject {
            id: "math".into(),
            name: "Mathematics".into(),
            mandatory: true,
            max_score: 10,
        }];
        let questions: Vec<Question> = (1..=4)
            .map(|i| Question {
                id: format!("m{i}"),
                subject_id: "math".into(),
                prompt: format!("q{i}"),
                options: vec![
                    AnswerOption {
                        id: format!("m{i}-a"),
                        text: "a".into(),
                    },
                    AnswerOption {
                        id: format!("m{i}-b"),
                        text: "b".into(),
                    },
                ],
            })
            .collect();
        let key = questions
            .iter()
            .map(|q| (q.id.clone(), format!("{}-a", q.id)))
            .collect();
        let mut sets = QuestionSets::new();
        sets.insert("math".into(), questions);
        (subjects, sets, key)
    }

    fn entry(question: &str, option: Option<&str>) -> AnswerEntry {
        AnswerEntry {
            question_id: question.into(),
            selected_option_id: option.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn grades_and_scales_to_max_score() {
        let (subjects, sets, key) = fixture();
        let scoring = MockScoringService::new(&subjects, &sets, key);
        let request = SubmitRequest {
            subject_id: "math".into(),
            answers: vec![
                entry("m1", Some("m1-a")),
                entry("m2", Some("m2-b")),
                entry("m3", None),
                entry("m4", Some("m4-a")),
            ],
        };
        let result = scoring.submit(&request).await.unwrap();
        assert_eq!(result.correct_answers, 2);
        assert_eq!(result.total_questions, 4);
        // round(2 * 10 / 4)
        assert_eq!(result.score, 5);
        assert_eq!(result.answers.len(), 3);
        assert!(!result.answers[1].is_correct);
        assert_eq!(result.answers[1].correct_option_id.as_deref(), Some("m2-a"));
        assert_eq!(scoring.calls_for("math"), 1);
    }

    #[tokio::test]
    async fn rejects_foreign_question() {
        let (subjects, sets, key) = fixture();
        let scoring = MockScoringService::new(&subjects, &sets, key);
        let request = SubmitRequest {
            subject_id: "math".into(),
            answers: vec![entry("h1", Some("x"))],
        };
        let err = scoring.submit(&request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn failure_toggle() {
        let (subjects, sets, key) = fixture();
        let scoring = MockScoringService::new(&subjects, &sets, key);
        let request = SubmitRequest {
            subject_id: "math".into(),
            answers: vec![],
        };
        scoring.fail_subject("math");
        assert!(scoring.submit(&request).await.is_err());
        scoring.recover_subject("math");
        assert!(scoring.submit(&request).await.is_ok());
        assert_eq!(scoring.total_calls(), 2);
    }

    #[tokio::test]
    async fn content_failure_and_unknown_subject() {
        let (_, sets, _) = fixture();
        let content = MockContentService::new(sets).with_failure("history");
        assert_eq!(content.get_questions("math").await.unwrap().len(), 4);
        assert!(content.get_questions("history").await.is_err());
        assert!(content.get_questions("physics").await.unwrap().is_empty());
        assert_eq!(content.call_count(), 3);
    }
}
