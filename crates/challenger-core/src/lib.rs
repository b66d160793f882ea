//! challenger-core — Assessment sessions and recommendation scoring.
//!
//! This crate defines the data model, the collaborator traits, the
//! proficiency model, the recommendation scorer, and the single-session
//! manager that drives timed assessment attempts.

pub mod catalog;
pub mod error;
pub mod history;
pub mod model;
pub mod proficiency;
pub mod profile;
pub mod recommend;
pub mod report;
pub mod session;
pub mod traits;
