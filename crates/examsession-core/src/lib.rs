//! examsession-core: timed exam session engine.
//!
//! This crate defines the data model, the service traits the engine calls
//! into, and the session machinery: question loading, the navigation/timer
//! state machine, and all-or-nothing submission of per-subject answers.

pub mod controller;
pub mod countdown;
pub mod error;
pub mod loader;
pub mod model;
pub mod outcome;
pub mod plan;
pub mod session;
pub mod submission;
pub mod traits;
