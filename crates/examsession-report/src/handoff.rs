//! Results handoff that persists each completed outcome to disk.

use std::path::PathBuf;

use anyhow::Result;

use examsession_core::outcome::ExamOutcome;
use examsession_core::traits::ResultsHandoff;

use crate::html::write_html_report;

/// Writes `outcome-<session id>.json` (and optionally an HTML page) into a directory.
pub struct JsonFileHandoff {
    dir: PathBuf,
    html: bool,
}

impl JsonFileHandoff {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            html: false,
        }
    }

    /// Also write the HTML results page next to the JSON file.
    pub fn with_html(mut self, enabled: bool) -> Self {
        self.html = enabled;
        self
    }

    /// Where the outcome of `outcome.session_id` is written.
    pub fn json_path(&self, outcome: &ExamOutcome) -> PathBuf {
        self.dir.join(format!("outcome-{}.json", outcome.session_id))
    }

    pub fn html_path(&self, outcome: &ExamOutcome) -> PathBuf {
        self.dir.join(format!("outcome-{}.html", outcome.session_id))
    }
}

impl ResultsHandoff for JsonFileHandoff {
    fn deliver(&self, outcome: &ExamOutcome) -> Result<()> {
        let path = self.json_path(outcome);
        outcome.save_json(&path)?;
        tracing::info!("outcome saved to {}", path.display());

        if self.html {
            let path = self.html_path(outcome);
            write_html_report(outcome, &path)?;
            tracing::info!("results page saved to {}", path.display());
        }
        Ok(())
    }
}
