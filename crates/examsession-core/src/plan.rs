//! TOML exam plan parser.
//!
//! A plan names the ordered subjects of one exam and, optionally, its
//! duration and an embedded question bank for offline runs.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{AnswerOption, Question, Subject};

/// A parsed exam plan.
#[derive(Debug, Clone)]
pub struct ExamPlan {
    pub id: String,
    pub name: String,
    /// Plan-level duration; callers fall back to configuration when absent.
    pub duration_secs: Option<u64>,
    /// Subjects in presentation order.
    pub subjects: Vec<Subject>,
    /// Embedded questions, used when running without a content service.
    pub bank: Vec<BankQuestion>,
}

/// A question from the embedded bank together with its answer key.
#[derive(Debug, Clone)]
pub struct BankQuestion {
    pub question: Question,
    pub correct_option_id: Option<String>,
}

impl ExamPlan {
    /// Bank questions of one subject, in file order.
    pub fn bank_for<'a>(&'a self, subject_id: &'a str) -> impl Iterator<Item = &'a BankQuestion> {
        self.bank
            .iter()
            .filter(move |b| b.question.subject_id == subject_id)
    }
}

#[derive(Debug, Deserialize)]
struct TomlPlanFile {
    exam: TomlExamHeader,
    #[serde(default)]
    subjects: Vec<TomlSubject>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlExamHeader {
    id: String,
    name: String,
    #[serde(default)]
    duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlSubject {
    id: String,
    name: String,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    max_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    subject: String,
    prompt: String,
    options: Vec<String>,
    /// Zero-based index of the correct option.
    #[serde(default)]
    correct: Option<usize>,
}

/// Parse a plan file.
pub fn parse_plan(path: &Path) -> Result<ExamPlan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam plan: {}", path.display()))?;

    parse_plan_str(&content, path)
}

/// Parse a TOML string into an `ExamPlan` (useful for testing).
pub fn parse_plan_str(content: &str, source_path: &Path) -> Result<ExamPlan> {
    let parsed: TomlPlanFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    anyhow::ensure!(
        !parsed.subjects.is_empty(),
        "exam plan {} has no subjects",
        source_path.display()
    );
    if let Some(0) = parsed.exam.duration_secs {
        anyhow::bail!("exam plan {}: duration_secs must be > 0", source_path.display());
    }

    let bank = parsed
        .questions
        .into_iter()
        .map(|q| {
            if let Some(idx) = q.correct {
                anyhow::ensure!(
                    idx < q.options.len(),
                    "question '{}': correct option {} out of range ({} options)",
                    q.id,
                    idx,
                    q.options.len()
                );
            }
            let options: Vec<AnswerOption> = q
                .options
                .into_iter()
                .enumerate()
                .map(|(i, text)| AnswerOption {
                    id: format!("{}-{}", q.id, i + 1),
                    text,
                })
                .collect();
            let correct_option_id = q.correct.map(|idx| options[idx].id.clone());
            Ok(BankQuestion {
                question: Question {
                    id: q.id,
                    subject_id: q.subject,
                    prompt: q.prompt,
                    options,
                },
                correct_option_id,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Subjects without an explicit maximum are worth one point per bank question.
    let subjects = parsed
        .subjects
        .into_iter()
        .map(|s| {
            let max_score = s.max_score.unwrap_or_else(|| {
                bank.iter()
                    .filter(|b| b.question.subject_id == s.id)
                    .count() as u32
            });
            Subject {
                id: s.id,
                name: s.name,
                mandatory: s.mandatory,
                max_score,
            }
        })
        .collect();

    Ok(ExamPlan {
        id: parsed.exam.id,
        name: parsed.exam.name,
        duration_secs: parsed.exam.duration_secs,
        subjects,
        bank,
    })
}

/// A warning from plan validation.
#[derive(Debug, Clone)]
pub struct PlanWarning {
    /// The subject or question the warning is about, if any.
    pub subject_id: Option<String>,
    pub message: String,
}

/// Validate a plan for common issues.
pub fn validate_plan(plan: &ExamPlan) -> Vec<PlanWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for subject in &plan.subjects {
        if !seen.insert(&subject.id) {
            warnings.push(PlanWarning {
                subject_id: Some(subject.id.clone()),
                message: format!("duplicate subject ID: {}", subject.id),
            });
        }
        if subject.name.trim().is_empty() {
            warnings.push(PlanWarning {
                subject_id: Some(subject.id.clone()),
                message: "subject name is empty".into(),
            });
        }
        if subject.max_score == 0 {
            warnings.push(PlanWarning {
                subject_id: Some(subject.id.clone()),
                message: "max_score is 0".into(),
            });
        }
    }

    let mut seen_questions = HashSet::new();
    for entry in &plan.bank {
        let q = &entry.question;
        if !seen_questions.insert(&q.id) {
            warnings.push(PlanWarning {
                subject_id: Some(q.subject_id.clone()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
        if !plan.subjects.iter().any(|s| s.id == q.subject_id) {
            warnings.push(PlanWarning {
                subject_id: Some(q.subject_id.clone()),
                message: format!("question '{}' references unknown subject", q.id),
            });
        }
        if q.options.is_empty() {
            warnings.push(PlanWarning {
                subject_id: Some(q.subject_id.clone()),
                message: format!("question '{}' has no options", q.id),
            });
        }
    }

    if !plan.bank.is_empty() {
        for subject in &plan.subjects {
            if plan.bank_for(&subject.id).next().is_none() {
                warnings.push(PlanWarning {
                    subject_id: Some(subject.id.clone()),
                    message: "no bank questions for subject".into(),
                });
            }
        }
    }

    warnings
}
