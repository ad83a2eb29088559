//! The `examsession validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examsession_core::plan::{parse_plan, validate_plan};

pub fn execute(plan_path: PathBuf) -> Result<()> {
    let plan = parse_plan(&plan_path)?;

    let duration = plan
        .duration_secs
        .map(|d| format!(", {}", examsession_core::model::format_clock(d)))
        .unwrap_or_default();
    println!(
        "Exam plan: {} ({} subjects, {} bank questions{duration})",
        plan.name,
        plan.subjects.len(),
        plan.bank.len()
    );

    let warnings = validate_plan(&plan);
    for w in &warnings {
        let prefix = w
            .subject_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Plan valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
