//! Question loading.
//!
//! All subjects are fetched concurrently. The load is all-or-nothing: the
//! first failing subject aborts the whole load and no session is started.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::LoadError;
use crate::model::{Question, QuestionSets, Subject};
use crate::traits::ContentService;

/// Resolves the question sets of a session's subjects.
pub struct QuestionLoader {
    content: Arc<dyn ContentService>,
}

impl QuestionLoader {
    pub fn new(content: Arc<dyn ContentService>) -> Self {
        Self { content }
    }

    /// Load every subject's questions, failing fast on the first error.
    ///
    /// Subjects with zero questions, questions without options, and question
    /// ids that repeat across subjects are rejected here, so a session can
    /// never start with a set it could not submit.
    pub async fn load(&self, subjects: &[Subject]) -> Result<QuestionSets, LoadError> {
        if subjects.is_empty() {
            return Err(LoadError::NoSubjects);
        }

        tracing::info!(
            "loading questions for {} subjects from {}",
            subjects.len(),
            self.content.name()
        );

        let fetches = subjects.iter().map(|subject| async move {
            let questions = self
                .content
                .get_questions(&subject.id)
                .await
                .map_err(|source| LoadError::Service {
                    subject_id: subject.id.clone(),
                    source,
                })?;
            check_subject(subject, &questions)?;
            tracing::debug!("subject '{}': {} questions", subject.id, questions.len());
            Ok::<_, LoadError>((subject.id.clone(), questions))
        });

        let loaded = try_join_all(fetches).await.inspect_err(|e| {
            tracing::error!("question load failed: {e}");
        })?;

        let mut seen = HashSet::new();
        for (subject_id, questions) in &loaded {
            for q in questions {
                if !seen.insert(q.id.as_str()) {
                    return Err(LoadError::Malformed {
                        subject_id: subject_id.clone(),
                        reason: format!("question id '{}' appears more than once", q.id),
                    });
                }
            }
        }

        Ok(loaded.into_iter().collect())
    }
}

fn check_subject(subject: &Subject, questions: &[Question]) -> Result<(), LoadError> {
    if questions.is_empty() {
        return Err(LoadError::EmptySubject {
            subject_id: subject.id.clone(),
        });
    }
    if let Some(q) = questions.iter().find(|q| q.options.is_empty()) {
        return Err(LoadError::Malformed {
            subject_id: subject.id.clone(),
            reason: format!("question '{}' has no options", q.id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::error::ServiceError;
    use crate::model::AnswerOption;

    struct FixedContent {
        sets: HashMap<String, Vec<Question>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ContentService for FixedContent {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn get_questions(&self, subject_id: &str) -> Result<Vec<Question>, ServiceError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.sets
                .get(subject_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(subject_id.to_string()))
        }
    }

    fn subject(id: &str) -> Subject {
        Subject {
            id: id.into(),
            name: id.to_uppercase(),
            mandatory: false,
            max_score: 10,
        }
    }

    fn question(id: &str, subject_id: &str, options: usize) -> Question {
        Question {
            id: id.into(),
            subject_id: subject_id.into(),
            prompt: format!("prompt {id}"),
            options: (0..options)
                .map(|i| AnswerOption {
                    id: format!("{id}-{i}"),
                    text: format!("option {i}"),
                })
                .collect(),
        }
    }

    fn loader(sets: Vec<(&str, Vec<Question>)>) -> (QuestionLoader, Arc<FixedContent>) {
        let content = Arc::new(FixedContent {
            sets: sets
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: AtomicU32::new(0),
        });
        (QuestionLoader::new(content.clone()), content)
    }

    #[tokio::test]
    async fn loads_all_subjects() {
        let (loader, content) = loader(vec![
            ("math", vec![question("m1", "math", 4), question("m2", "math", 4)]),
            ("history", vec![question("h1", "history", 2)]),
        ]);
        let sets = loader
            .load(&[subject("math"), subject("history")])
            .await
            .unwrap();
        assert_eq!(sets["math"].len(), 2);
        assert_eq!(sets["math"][0].id, "m1");
        assert_eq!(sets["history"].len(), 1);
        assert_eq!(content.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn one_failing_subject_fails_the_load() {
        let (loader, _) = loader(vec![("math", vec![question("m1", "math", 4)])]);
        let err = loader
            .load(&[subject("math"), subject("missing")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Service { ref subject_id, .. } if subject_id == "missing"
        ));
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let (loader, _) = loader(vec![
            ("math", vec![question("m1", "math", 4)]),
            ("history", vec![]),
        ]);
        let err = loader
            .load(&[subject("math"), subject("history")])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LoadError::EmptySubject {
                subject_id: "history".into()
            }
        );
    }

    #[tokio::test]
    async fn no_subjects_is_rejected() {
        let (loader, _) = loader(vec![]);
        assert_eq!(loader.load(&[]).await.unwrap_err(), LoadError::NoSubjects);
    }

    #[tokio::test]
    async fn duplicate_question_ids_are_malformed() {
        let (loader, _) = loader(vec![
            ("math", vec![question("q1", "math", 2)]),
            ("history", vec![question("q1", "history", 2)]),
        ]);
        let err = loader
            .load(&[subject("math"), subject("history")])
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[tokio::test]
    async fn optionless_question_is_malformed() {
        let (loader, _) = loader(vec![("math", vec![question("m1", "math", 0)])]);
        let err = loader.load(&[subject("math")]).await.unwrap_err();
        assert!(err.to_string().contains("no options"));
    }
}
