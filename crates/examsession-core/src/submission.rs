//! Submission coordinator.
//!
//! Fans the per-subject requests out concurrently, waits for every one of
//! them, and only then decides: either all subjects were graded and the
//! results come back in subject order, or the whole submission failed.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{ServiceError, SubmissionError};
use crate::model::SubmissionResult;
use crate::traits::{ScoringService, SubmitRequest};

/// Configuration for the submission coordinator.
#[derive(Debug, Clone, Default)]
pub struct SubmissionConfig {
    /// Upper bound for each subject's scoring request (None = wait forever).
    pub request_timeout: Option<Duration>,
}

/// Runs all-or-nothing submissions against a scoring service.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    scoring: Arc<dyn ScoringService>,
    config: SubmissionConfig,
}

impl SubmissionCoordinator {
    pub fn new(scoring: Arc<dyn ScoringService>, config: SubmissionConfig) -> Self {
        Self { scoring, config }
    }

    /// Submit every subject and aggregate.
    ///
    /// In-flight siblings are never cancelled: a failure is only reported
    /// after all requests have finished, and successful results of the
    /// other subjects are discarded.
    pub async fn submit_all(
        &self,
        requests: Vec<SubmitRequest>,
        user_id: &str,
    ) -> Result<Vec<SubmissionResult>, SubmissionError> {
        tracing::info!(
            "submitting {} subjects to {}",
            requests.len(),
            self.scoring.name()
        );

        let outcomes = join_all(requests.iter().map(|request| self.submit_one(request))).await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        let mut failed = 0usize;
        for (request, outcome) in requests.iter().zip(outcomes) {
            match outcome {
                Ok(mut result) => {
                    result.user_id = user_id.to_string();
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!("subject '{}' submission failed: {e}", request.subject_id);
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(results),
            Some(SubmissionError::Service {
                subject_id, source, ..
            }) => Err(SubmissionError::Service {
                subject_id,
                source,
                failed_subjects: failed,
            }),
            Some(other) => Err(other),
        }
    }

    async fn submit_one(&self, request: &SubmitRequest) -> Result<SubmissionResult, SubmissionError> {
        let call = self.scoring.submit(request);
        let outcome = match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(SubmissionError::Timeout {
                        subject_id: request.subject_id.clone(),
                        secs: limit.as_secs(),
                    })
                }
            },
            None => call.await,
        };
        let result = outcome.map_err(|source| SubmissionError::Service {
            subject_id: request.subject_id.clone(),
            source,
            failed_subjects: 1,
        })?;
        if result.subject_id != request.subject_id {
            return Err(SubmissionError::Service {
                subject_id: request.subject_id.clone(),
                source: ServiceError::InvalidResponse(format!(
                    "result is for subject '{}'",
                    result.subject_id
                )),
                failed_subjects: 1,
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::traits::AnswerEntry;

    /// Grades everything as correct after a per-subject delay.
    struct SlowScoring {
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
        completed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScoringService for SlowScoring {
        fn name(&self) -> &str {
            "slow"
        }

        async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, ServiceError> {
            if let Some(delay) = self.delays.get(&request.subject_id) {
                tokio::time::sleep(*delay).await;
            }
            self.completed
                .lock()
                .unwrap()
                .push(request.subject_id.clone());
            if self.failing.contains(&request.subject_id) {
                return Err(ServiceError::Api {
                    status: 500,
                    message: "grading unavailable".into(),
                });
            }
            let total = request.answers.len() as u32;
            Ok(SubmissionResult {
                id: format!("r-{}", request.subject_id),
                subject_id: request.subject_id.clone(),
                subject_name: request.subject_id.to_uppercase(),
                score: request.answered() as u32,
                max_score: total,
                total_questions: total,
                correct_answers: request.answered() as u32,
                timestamp: Utc::now(),
                user_id: "server-side".into(),
                answers: vec![],
            })
        }
    }

    fn scoring(delays: &[(&str, u64)], failing: &[&str]) -> Arc<SlowScoring> {
        Arc::new(SlowScoring {
            delays: delays
                .iter()
                .map(|(s, ms)| (s.to_string(), Duration::from_millis(*ms)))
                .collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            completed: Mutex::new(vec![]),
        })
    }

    fn request(subject_id: &str, answered: usize, total: usize) -> SubmitRequest {
        SubmitRequest {
            subject_id: subject_id.into(),
            answers: (0..total)
                .map(|i| AnswerEntry {
                    question_id: format!("{subject_id}-{i}"),
                    selected_option_id: (i < answered).then(|| format!("{subject_id}-{i}-a")),
                })
                .collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_subject_order_not_completion_order() {
        // The first subject answers last.
        let service = scoring(&[("math", 300), ("history", 10)], &[]);
        let coordinator = SubmissionCoordinator::new(service.clone(), SubmissionConfig::default());

        let results = coordinator
            .submit_all(vec![request("math", 3, 3), request("history", 2, 3)], "user-7")
            .await
            .unwrap();

        assert_eq!(*service.completed.lock().unwrap(), vec!["history", "math"]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].subject_id, "math");
        assert_eq!(results[1].subject_id, "history");
        assert_eq!(results[1].correct_answers, 2);
        assert!(results.iter().all(|r| r.user_id == "user-7"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_discards_everything_after_all_complete() {
        let service = scoring(&[("math", 10), ("history", 200)], &["math"]);
        let coordinator = SubmissionCoordinator::new(service.clone(), SubmissionConfig::default());

        let err = coordinator
            .submit_all(vec![request("math", 1, 3), request("history", 1, 3)], "u")
            .await
            .unwrap_err();

        // The slow sibling still ran to completion.
        assert_eq!(service.completed.lock().unwrap().len(), 2);
        match err {
            SubmissionError::Service {
                subject_id,
                failed_subjects,
                ..
            } => {
                assert_eq!(subject_id, "math");
                assert_eq!(failed_subjects, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_every_failed_subject() {
        let service = scoring(&[], &["math", "history"]);
        let coordinator = SubmissionCoordinator::new(service, SubmissionConfig::default());
        let err = coordinator
            .submit_all(vec![request("math", 0, 1), request("history", 0, 1)], "u")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Service {
                failed_subjects: 2,
                ..
            }
        ));
        assert_eq!(err.reason(), "grading unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_fails_the_submission() {
        let service = scoring(&[("math", 10_000)], &[]);
        let coordinator = SubmissionCoordinator::new(
            service,
            SubmissionConfig {
                request_timeout: Some(Duration::from_secs(2)),
            },
        );
        let err = coordinator
            .submit_all(vec![request("math", 1, 1)], "u")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::Timeout {
                subject_id: "math".into(),
                secs: 2
            }
        );
    }
}
