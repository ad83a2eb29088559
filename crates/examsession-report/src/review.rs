//! Per-question review of a completed session.

use serde::Serialize;

use examsession_core::model::{AnswerVerdict, Question};
use examsession_core::outcome::ExamOutcome;

/// How one question fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unanswered,
    /// Answered, but the scoring service returned no per-question verdict.
    Ungraded,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Correct => "correct",
            Verdict::Incorrect => "incorrect",
            Verdict::Unanswered => "unanswered",
            Verdict::Ungraded => "answered",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionReview {
    pub question_id: String,
    pub prompt: String,
    pub selected_option_id: Option<String>,
    pub selected_text: Option<String>,
    pub correct_option_id: Option<String>,
    pub correct_text: Option<String>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectReview {
    pub subject_id: String,
    pub subject_name: String,
    pub score: u32,
    pub max_score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub questions: Vec<QuestionReview>,
}

/// Build the review for every subject, in subject order.
///
/// Subjects without a matching result are skipped.
pub fn build_review(outcome: &ExamOutcome) -> Vec<SubjectReview> {
    outcome
        .subjects
        .iter()
        .filter_map(|subject| {
            let result = outcome.results.iter().find(|r| r.subject_id == subject.id)?;
            let questions = outcome
                .questions
                .get(&subject.id)
                .map(|qs| {
                    qs.iter()
                        .map(|q| {
                            let selected = outcome.answers.get(&q.id);
                            let verdict = result.answers.iter().find(|v| v.question_id == q.id);
                            review_question(q, selected, verdict)
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(SubjectReview {
                subject_id: subject.id.clone(),
                subject_name: result.subject_name.clone(),
                score: result.score,
                max_score: result.max_score,
                correct_answers: result.correct_answers,
                total_questions: result.total_questions,
                questions,
            })
        })
        .collect()
}

fn review_question(
    question: &Question,
    selected: Option<&str>,
    verdict: Option<&AnswerVerdict>,
) -> QuestionReview {
    let text_of = |id: &str| {
        question
            .options
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.text.clone())
    };
    let correct_option_id = verdict.and_then(|v| v.correct_option_id.clone());
    let verdict = match (selected, verdict) {
        (None, _) => Verdict::Unanswered,
        (Some(_), Some(v)) if v.is_correct => Verdict::Correct,
        (Some(_), Some(_)) => Verdict::Incorrect,
        (Some(_), None) => Verdict::Ungraded,
    };
    QuestionReview {
        question_id: question.id.clone(),
        prompt: question.prompt.clone(),
        selected_option_id: selected.map(str::to_string),
        selected_text: selected.and_then(text_of),
        correct_text: correct_option_id.as_deref().and_then(text_of),
        correct_option_id,
        verdict,
    }
}
