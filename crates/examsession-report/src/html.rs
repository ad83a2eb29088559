//! HTML results page.
//!
//! Produces a self-contained HTML file with all CSS inlined.

use std::path::Path;

use anyhow::Result;

use examsession_core::model::format_clock;
use examsession_core::outcome::ExamOutcome;

use crate::review::build_review;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate the results page for a completed session.
pub fn generate_html(outcome: &ExamOutcome) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>Exam results: {}</title>\n",
        html_escape(&outcome.user_id)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    let elapsed = (outcome.finished_at - outcome.started_at)
        .num_seconds()
        .max(0) as u64;
    html.push_str("<header>\n");
    html.push_str("<h1>Exam results</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">User <strong>{}</strong> | finished by {} | time used {} | {}</p>\n",
        html_escape(&outcome.user_id),
        outcome.trigger,
        format_clock(elapsed),
        outcome.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary
    let totals = &outcome.totals;
    html.push_str("<section class=\"dashboard\">\n<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Subject</th><th>Score</th><th>Correct</th></tr></thead>\n<tbody>\n");
    for r in &outcome.results {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{} / {}</td><td>{} / {}</td></tr>\n",
            html_escape(&r.subject_name),
            r.score,
            r.max_score,
            r.correct_answers,
            r.total_questions
        ));
    }
    html.push_str(&format!(
        "<tr class=\"total\"><td>Total</td><td>{} / {}</td><td>{} / {}</td></tr>\n",
        totals.score, totals.max_score, totals.correct_answers, totals.total_questions
    ));
    html.push_str("</tbody></table>\n</section>\n");

    // Per-question review
    html.push_str("<section class=\"review\">\n<h2>Review</h2>\n");
    for subject in build_review(outcome) {
        html.push_str(&format!(
            "<details open>\n<summary>{} ({} / {})</summary>\n",
            html_escape(&subject.subject_name),
            subject.score,
            subject.max_score
        ));
        html.push_str("<table>\n<thead><tr><th>#</th><th>Question</th><th>Your answer</th><th>Correct answer</th><th>Result</th></tr></thead>\n<tbody>\n");
        for (i, q) in subject.questions.iter().enumerate() {
            let label = q.verdict.label();
            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                label,
                i + 1,
                html_escape(&q.prompt),
                html_escape(q.selected_text.as_deref().unwrap_or("-")),
                html_escape(q.correct_text.as_deref().unwrap_or("-")),
                label
            ));
        }
        html.push_str("</tbody></table>\n</details>\n");
    }
    html.push_str("</section>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the results page to a file.
pub fn write_html_report(outcome: &ExamOutcome, path: &Path) -> Result<()> {
    let html = generate_html(outcome);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.correct { background: var(--pass); }
.incorrect { background: var(--fail); }
.total { font-weight: bold; }
summary { cursor: pointer; font-weight: bold; }
"#;
