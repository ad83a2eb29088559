//! Consumers of a completed exam session: JSON persistence, the
//! per-question review and a self-contained HTML results page.

pub mod handoff;
pub mod html;
pub mod review;

pub use handoff::JsonFileHandoff;
pub use review::{build_review, QuestionReview, SubjectReview, Verdict};
