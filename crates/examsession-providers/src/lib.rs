//! examsession-providers: content and scoring service integrations.
//!
//! Implements the `ContentService` and `ScoringService` traits over the
//! exam platform's HTTP API, plus in-memory mocks for tests and offline
//! runs.

pub mod config;
pub mod http;
pub mod mock;

pub use config::{load_config, load_config_from, ExamConfig};
pub use http::HttpExamService;
pub use mock::{MockContentService, MockScoringService};
