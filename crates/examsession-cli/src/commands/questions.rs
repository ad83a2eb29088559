//! The `examsession questions` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examsession_core::traits::ContentService;
use examsession_providers::load_config_from;

pub async fn execute(subject: String, json: bool, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let service = config.http_service()?;

    let questions = service
        .get_questions(&subject)
        .await
        .with_context(|| format!("failed to fetch questions for '{subject}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&questions)?);
        return Ok(());
    }

    if questions.is_empty() {
        println!("Subject '{subject}' has no questions.");
        return Ok(());
    }

    println!("Subject: {subject} ({} questions)\n", questions.len());
    for (i, q) in questions.iter().enumerate() {
        println!("{:>3}. {} [{}]", i + 1, q.prompt, q.id);
        for (j, option) in q.options.iter().enumerate() {
            println!("       {}) {}", j + 1, option.text);
        }
    }

    Ok(())
}
